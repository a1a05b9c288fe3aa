use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use agents_router::{Agent, FunctionTool, MockProvider, RunConfig, Runner, ToolCall};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn slow_tool() -> Arc<FunctionTool> {
    Arc::new(FunctionTool::new_async(
        "slow",
        "Sleeps briefly",
        json!({"type":"object","properties":{"input":{"type":"string"}},"required":["input"]}),
        |_args| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(Value::String("ok".into()))
        },
    ))
}

// One turn requesting `n` tool calls, then a final message.
fn scripted(tool: &str, n: usize) -> Arc<MockProvider> {
    let calls = (0..n)
        .map(|i| ToolCall::new(format!("call_{i}"), tool, json!({"input": i.to_string()})))
        .collect();
    Arc::new(
        MockProvider::new("bench")
            .with_tool_calls(calls)
            .with_message("done"),
    )
}

fn bench_runner(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let agent = Arc::new(Agent::simple("Bench", "Use tools").with_tool(slow_tool()));

    // Sequential
    c.bench_function("runner_sequential_8tools", |b| {
        b.to_async(&rt).iter_batched(
            || {
                RunConfig::default()
                    .with_model_provider(Some(scripted("slow", 8)))
                    .with_parallel_tools(false)
            },
            |cfg| async {
                Runner::run(agent.clone(), "run", cfg).await.unwrap();
            },
            BatchSize::SmallInput,
        )
    });

    // Parallel
    c.bench_function("runner_parallel_8tools", |b| {
        b.to_async(&rt).iter_batched(
            || RunConfig::default().with_model_provider(Some(scripted("slow", 8))),
            |cfg| async {
                Runner::run(agent.clone(), "run", cfg).await.unwrap();
            },
            BatchSize::SmallInput,
        )
    });

    // Orchestrator fanning out to 4 nested agents, each calling the slow tool once.
    c.bench_function("orchestrator_fanout_4agents", |b| {
        b.to_async(&rt).iter_batched(
            || {
                let worker = Agent::simple("Worker", "Use tools")
                    .with_tool(slow_tool())
                    .with_model_provider(Arc::new(
                        MockProvider::new("bench")
                            .with_tool_call("slow", json!({"input": "x"}))
                            .with_tool_call("slow", json!({"input": "x"}))
                            .with_tool_call("slow", json!({"input": "x"}))
                            .with_tool_call("slow", json!({"input": "x"})),
                    ));
                Agent::simple("Orchestrator", "Fan out")
                    .with_tool(worker.as_tool("worker", "Does work"))
                    .with_model_provider(scripted("worker", 4))
            },
            |orchestrator| async move {
                Runner::run(orchestrator, "run", RunConfig::default())
                    .await
                    .unwrap();
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_runner);
criterion_main!(benches);
