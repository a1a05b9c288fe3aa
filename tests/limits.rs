//! Depth, budget, cancellation and timeout limits across run trees.

use agents_router::{
    Agent, AgentsError, FunctionTool, Handoff, MockProvider, RunConfig, RunContext, Runner, Tool,
    ToolCall,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// `levels` agents, each delegating to the next through an agent tool.
fn delegation_chain(levels: usize) -> (Agent, Vec<Arc<MockProvider>>) {
    let leaf_backend = Arc::new(MockProvider::new("mock").with_message("leaf answer"));
    let mut agent = Agent::simple(format!("Level {}", levels - 1), "answer")
        .with_model_provider(leaf_backend.clone());
    let mut backends = vec![leaf_backend];
    for level in (0..levels - 1).rev() {
        let backend = Arc::new(
            MockProvider::new("mock")
                .with_tool_call("delegate", json!({"input": "go deeper"}))
                .with_message(format!("level {level} done")),
        );
        agent = Agent::simple(format!("Level {level}"), "delegate")
            .with_tool(agent.as_tool("delegate", "Delegate to the next level"))
            .with_model_provider(backend.clone());
        backends.insert(0, backend);
    }
    (agent, backends)
}

/// `levels` agents, each handing off to the next.
fn handoff_chain(levels: usize) -> (Agent, Vec<Arc<MockProvider>>) {
    let leaf_backend = Arc::new(MockProvider::new("mock").with_message("final stop"));
    let mut agent = Agent::simple(format!("Stage {}", levels - 1), "answer")
        .with_model_provider(leaf_backend.clone());
    let mut backends = vec![leaf_backend];
    for stage in (0..levels - 1).rev() {
        let next = Handoff::new(agent);
        let backend = Arc::new(MockProvider::new("mock").with_tool_call(next.name.clone(), json!({})));
        agent = Agent::simple(format!("Stage {stage}"), "pass it on")
            .with_handoff(next)
            .with_model_provider(backend.clone());
        backends.insert(0, backend);
    }
    (agent, backends)
}

#[tokio::test]
async fn nested_runs_within_max_depth_complete() {
    let (root, backends) = delegation_chain(3);
    let result = Runner::run(root, "start", RunConfig::default().with_max_depth(2))
        .await
        .unwrap();
    assert_eq!(result.final_output_text(), "level 0 done");
    assert!(backends.iter().all(|b| b.request_count() > 0));
}

#[tokio::test]
async fn nesting_one_past_max_depth_fails_the_whole_run() {
    let (root, backends) = delegation_chain(4);
    let err = Runner::run(root, "start", RunConfig::default().with_max_depth(2))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentsError::RecursionLimitExceeded { max_depth: 2 }), "{err:?}");
    // The run too deep never reaches its backend.
    assert_eq!(backends[3].request_count(), 0);
    // The levels above do not get a second turn to paper over it.
    assert_eq!(backends[0].request_count(), 1);
}

#[tokio::test]
async fn handoffs_count_toward_max_depth() {
    let (root, _) = handoff_chain(3);
    let result = Runner::run(root, "start", RunConfig::default().with_max_depth(2))
        .await
        .unwrap();
    assert_eq!(result.final_agent, "Stage 2");
    assert_eq!(result.handoff_count(), 2);

    let (root, backends) = handoff_chain(4);
    let err = Runner::run(root, "start", RunConfig::default().with_max_depth(2))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentsError::RecursionLimitExceeded { max_depth: 2 }));
    assert_eq!(backends[3].request_count(), 0);
}

#[tokio::test]
async fn handoffs_are_transitive() {
    let (root, _) = handoff_chain(3);
    let result = Runner::run(root, "start", RunConfig::default()).await.unwrap();
    let path: Vec<(String, String)> = result
        .handoffs()
        .into_iter()
        .map(|h| (h.from_agent.clone(), h.to_agent.clone()))
        .collect();
    assert_eq!(
        path,
        vec![
            ("Stage 0".to_string(), "Stage 1".to_string()),
            ("Stage 1".to_string(), "Stage 2".to_string()),
        ]
    );
    assert_eq!(result.final_output_text(), "final stop");
}

fn echo() -> Arc<dyn Tool> {
    Arc::new(FunctionTool::simple("echo", "Echoes its input", |s: String| s))
}

fn echo_calls(n: usize) -> Vec<ToolCall> {
    (0..n)
        .map(|i| ToolCall::new(format!("call_{i}"), "echo", json!({"input": i.to_string()})))
        .collect()
}

#[tokio::test]
async fn tool_budget_is_enforced_for_a_single_run() {
    let provider = Arc::new(
        MockProvider::new("mock")
            .with_tool_calls(echo_calls(3))
            .with_message("done"),
    );
    let agent = Agent::simple("Echoer", "echo")
        .with_tool(echo())
        .with_model_provider(provider.clone());

    let err = Runner::run(agent, "go", RunConfig::default().with_max_tool_calls(2))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentsError::ToolCallBudgetExceeded { max_tool_calls: 2 }));
    assert_eq!(provider.request_count(), 1);
}

#[tokio::test]
async fn tool_budget_is_shared_across_nested_runs() {
    let worker = Agent::simple("Worker", "echo things")
        .with_tool(echo())
        .with_model_provider(Arc::new(
            MockProvider::new("mock")
                .with_tool_calls(echo_calls(2))
                .with_message("worker done"),
        ));
    let orchestrator = Agent::simple("Orchestrator Agent", "delegate")
        .with_tool(worker.as_tool("worker", "Does the work"))
        .with_model_provider(Arc::new(
            MockProvider::new("mock")
                .with_tool_call("worker", json!({"input": "do it"}))
                .with_message("all done"),
        ));

    let err = Runner::run(orchestrator.clone(), "go", RunConfig::default().with_max_tool_calls(2))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentsError::ToolCallBudgetExceeded { max_tool_calls: 2 }));
}

#[tokio::test]
async fn reused_context_gets_a_fresh_budget_per_run() {
    struct Session {
        user: &'static str,
    }

    let provider = Arc::new(
        MockProvider::new("mock")
            .with_tool_call("echo", json!({"input": "first"}))
            .with_message("first done")
            .with_tool_call("echo", json!({"input": "second"}))
            .with_message("second done"),
    );
    let agent = Arc::new(
        Agent::simple("Echoer", "echo")
            .with_tool(echo())
            .with_model_provider(provider.clone()),
    );
    let context = RunContext::with_state(Session { user: "ada" });

    let mut traces = Vec::new();
    for expected in ["first done", "second done"] {
        let result = Runner::run_with_context(
            agent.clone(),
            "go",
            context.clone(),
            RunConfig::default().with_max_tool_calls(1),
        )
        .await
        .unwrap();
        assert_eq!(result.final_output_text(), expected);
        assert_eq!(result.usage.total.request_count, 2);
        traces.push(result.trace_id.clone());
    }
    assert_ne!(traces[0], traces[1]);
    assert_eq!(context.state::<Session>().map(|s| s.user), Some("ada"));
    assert_eq!(context.tool_calls_used(), 0);
    assert_eq!(provider.request_count(), 4);
}

#[tokio::test]
async fn cancelling_before_the_run_starts() {
    let provider = Arc::new(MockProvider::new("mock").with_message("hi"));
    let agent = Agent::simple("Assistant", "x").with_model_provider(provider.clone());
    let token = CancellationToken::new();
    token.cancel();

    let err = Runner::run(agent, "hello", RunConfig::default().with_cancellation_token(token))
        .await
        .unwrap_err();
    assert!(matches!(err, AgentsError::Cancelled));
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test]
async fn cancelling_reaches_nested_runs_in_flight() {
    let slow_backend = Arc::new(
        MockProvider::new("mock")
            .with_message("too late")
            .with_delay(Duration::from_secs(30)),
    );
    let slow = Agent::simple("Web Search Agent", "search").with_model_provider(slow_backend.clone());
    let orchestrator = Agent::simple("Orchestrator Agent", "delegate")
        .with_tool(slow.as_tool("web_search_agent", "Search the web"))
        .with_model_provider(Arc::new(
            MockProvider::new("mock").with_tool_call("web_search_agent", json!({"input": "news"})),
        ));

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let err = Runner::run(
        orchestrator,
        "latest news",
        RunConfig::default().with_cancellation_token(token),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AgentsError::Cancelled), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(slow_backend.request_count(), 1);
}

#[tokio::test]
async fn slow_backend_times_out_as_backend_failure() {
    let provider = Arc::new(
        MockProvider::new("mock")
            .with_message("late")
            .with_delay(Duration::from_millis(500)),
    );
    let agent = Agent::simple("Assistant", "x").with_model_provider(provider);
    let err = Runner::run(
        agent,
        "hello",
        RunConfig::default().with_model_timeout(Duration::from_millis(20)),
    )
    .await
    .unwrap_err();
    match err {
        AgentsError::BackendFailure { message } => assert!(message.contains("timed out")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn slow_tool_times_out_as_an_observation() {
    let slow: Arc<dyn Tool> = Arc::new(FunctionTool::new_async(
        "search_web",
        "Searches the web",
        json!({"type": "object"}),
        |_args| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(Value::String("results".into()))
        },
    ));
    let provider = Arc::new(
        MockProvider::new("mock")
            .with_tool_call("search_web", json!({}))
            .with_message("The search timed out, so I answered from memory."),
    );
    let agent = Agent::simple("Web Search Agent", "search")
        .with_tool(slow)
        .with_model_provider(provider.clone());

    let result = Runner::run(
        agent,
        "news",
        RunConfig::default().with_tool_timeout(Duration::from_millis(20)),
    )
    .await
    .unwrap();
    assert_eq!(
        result.final_output_text(),
        "The search timed out, so I answered from memory."
    );
    let observation = provider.requests()[1].messages.last().unwrap().content.clone();
    assert!(observation.starts_with("Error: tool 'search_web' timed out"));
}
