//! # Runner (orientation)
//!
//! The `Runner` drives one run: it admits the input through the entry
//! agent's guardrails, then alternates between backend calls and tool
//! resolution until the active agent produces a final answer. Tool calls go
//! through the tower stack built in `service.rs`; handoffs swap the active
//! agent in place; agent tools and agent guardrails re-enter the runner as
//! nested runs through [`Runner::run_nested`].
//!
//! Every run carries a [`RunContext`]. Nested runs and handoffs each add one
//! to its depth, and a run deeper than [`RunConfig::max_depth`] fails with
//! [`AgentsError::RecursionLimitExceeded`] before it calls the backend.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing::{debug, info, warn, Instrument};

use crate::agent::Agent;
use crate::config::{SdkConfig, DEFAULT_MAX_DEPTH, DEFAULT_MAX_TURNS, DEFAULT_MODEL};
use crate::context::RunContext;
use crate::error::{AgentsError, Result};
use crate::guardrail::{GuardrailPolicy, GuardrailRunner};
use crate::handoff::{handoff_reason, Handoff};
use crate::items::{HandoffItem, Message, ModelResponse, Role, RunItem, ToolCall};
use crate::model::{ModelProvider, ModelRequest, OpenAIProvider};
use crate::result::RunResult;
use crate::schema::validate_arguments;
use crate::service::{build_tool_stack, into_agents_error, ToolRequest, ToolResponse};
use crate::usage::Usage;

fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        let mut out = s[..end].to_string();
        out.push('…');
        out
    } else {
        s.to_string()
    }
}

fn format_messages_for_log(messages: &[Message]) -> String {
    let mut lines = Vec::new();
    for (idx, m) in messages.iter().enumerate() {
        match m.role {
            Role::User => {
                lines.push(format!(
                    "{:02} USER     | {}",
                    idx,
                    truncate_for_log(&m.content, 160)
                ));
            }
            Role::System => {
                lines.push(format!(
                    "{:02} SYSTEM   | {}",
                    idx,
                    truncate_for_log(&m.content, 160)
                ));
            }
            Role::Assistant => {
                if let Some(tool_calls) = &m.tool_calls {
                    let calls: Vec<String> = tool_calls
                        .iter()
                        .map(|tc| format!("id={}, name={}", tc.id, tc.name))
                        .collect();
                    lines.push(format!(
                        "{:02} ASSIST   | tool_calls=[{}] content=\"{}\"",
                        idx,
                        calls.join(", "),
                        truncate_for_log(&m.content, 120)
                    ));
                } else {
                    lines.push(format!(
                        "{:02} ASSIST   | {}",
                        idx,
                        truncate_for_log(&m.content, 160)
                    ));
                }
            }
            Role::Tool => {
                let tcid = m
                    .tool_call_id
                    .as_deref()
                    .unwrap_or("<missing tool_call_id>");
                lines.push(format!(
                    "{:02} TOOL     | tool_call_id={} payload={}",
                    idx,
                    tcid,
                    truncate_for_log(&m.content, 120)
                ));
            }
        }
    }
    lines.join("\n")
}

/// What a run starts from: a fresh request, or the message history of an
/// earlier run (see [`RunResult::to_input_list`]) extended by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RunInput {
    Text(String),
    Messages(Vec<Message>),
}

impl RunInput {
    /// The text guardrails judge: the request itself, or the latest user
    /// message of a history.
    pub fn guardrail_text(&self) -> String {
        match self {
            RunInput::Text(text) => text.clone(),
            RunInput::Messages(messages) => messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default(),
        }
    }

    /// The transcript a run starts from. System messages are dropped since
    /// each agent supplies its own.
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            RunInput::Text(text) => vec![Message::user(text)],
            RunInput::Messages(messages) => messages
                .into_iter()
                .filter(|m| m.role != Role::System)
                .collect(),
        }
    }
}

impl From<&str> for RunInput {
    fn from(text: &str) -> Self {
        RunInput::Text(text.to_string())
    }
}

impl From<String> for RunInput {
    fn from(text: String) -> Self {
        RunInput::Text(text)
    }
}

impl From<Vec<Message>> for RunInput {
    fn from(messages: Vec<Message>) -> Self {
        RunInput::Messages(messages)
    }
}

/// Configuration for a run.
///
/// The same configuration applies to every nested run and handoff below
/// the root.
///
/// ## Example
///
/// ```rust
/// use agents_router::runner::RunConfig;
/// use agents_router::MockProvider;
/// use std::{sync::Arc, time::Duration};
///
/// let config = RunConfig::default()
///     .with_model_provider(Some(Arc::new(MockProvider::new("mock"))))
///     .with_max_depth(3)
///     .with_max_tool_calls(20)
///     .with_tool_timeout(Duration::from_secs(10));
/// assert_eq!(config.max_depth, 3);
/// ```
#[derive(Clone)]
pub struct RunConfig {
    /// Backend for agents that do not carry their own. When neither is set
    /// an `OpenAIProvider` for the agent's model is used.
    pub model_provider: Option<Arc<dyn ModelProvider>>,

    /// Model for the fallback `OpenAIProvider` when the agent still uses the
    /// crate default model.
    pub default_model: Option<String>,

    /// Maximum backend calls per run. An agent's own `max_turns` takes
    /// precedence while it is active.
    pub max_turns: Option<usize>,

    /// Maximum depth of nested runs and handoffs below the root.
    pub max_depth: usize,

    /// Tool calls allowed across the whole run tree.
    pub max_tool_calls: Option<usize>,

    /// Whether to execute tool calls in parallel within a single turn.
    /// Defaults to true.
    pub parallel_tools: bool,

    /// Optional maximum number of concurrent tool calls when `parallel_tools` is true.
    pub max_concurrency: Option<usize>,

    pub model_timeout: Option<Duration>,

    pub tool_timeout: Option<Duration>,

    pub guardrail_policy: GuardrailPolicy,

    /// Token the caller keeps to cancel the run from outside.
    pub cancellation_token: Option<CancellationToken>,
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("model_provider", &self.model_provider.is_some())
            .field("default_model", &self.default_model)
            .field("max_turns", &self.max_turns)
            .field("max_depth", &self.max_depth)
            .field("max_tool_calls", &self.max_tool_calls)
            .field("parallel_tools", &self.parallel_tools)
            .field("max_concurrency", &self.max_concurrency)
            .field("model_timeout", &self.model_timeout)
            .field("tool_timeout", &self.tool_timeout)
            .field("guardrail_policy", &self.guardrail_policy)
            .finish()
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model_provider: None,
            default_model: None,
            max_turns: Some(DEFAULT_MAX_TURNS),
            max_depth: DEFAULT_MAX_DEPTH,
            max_tool_calls: None,
            parallel_tools: true,
            max_concurrency: None,
            model_timeout: None,
            tool_timeout: None,
            guardrail_policy: GuardrailPolicy::default(),
            cancellation_token: None,
        }
    }
}

impl RunConfig {
    /// Starts from process-wide defaults.
    pub fn from_sdk_config(sdk: &SdkConfig) -> Self {
        Self {
            default_model: Some(sdk.default_model.clone()),
            max_turns: Some(sdk.max_turns),
            max_depth: sdk.max_depth,
            max_tool_calls: sdk.max_tool_calls,
            parallel_tools: sdk.parallel_tools,
            max_concurrency: sdk.max_concurrency,
            model_timeout: sdk.model_timeout,
            tool_timeout: sdk.tool_timeout,
            ..Self::default()
        }
    }

    /// Convenience: set a model provider.
    pub fn with_model_provider(mut self, provider: Option<Arc<dyn ModelProvider>>) -> Self {
        self.model_provider = provider;
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_tool_calls(mut self, max_tool_calls: usize) -> Self {
        self.max_tool_calls = Some(max_tool_calls);
        self
    }

    /// Toggle parallel execution of tool calls within a single turn.
    pub fn with_parallel_tools(mut self, enabled: bool) -> Self {
        self.parallel_tools = enabled;
        self
    }

    /// Set maximum number of concurrent tool calls when running in parallel.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = Some(timeout);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    pub fn with_guardrail_policy(mut self, policy: GuardrailPolicy) -> Self {
        self.guardrail_policy = policy;
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }
}

/// How the runner proceeds after one backend response.
#[derive(Debug)]
pub(crate) enum NextStep {
    /// The active agent answered.
    Final(String),
    /// The backend asked to transfer control. `index` is the handoff call
    /// within `calls`; every other call in the batch is skipped.
    Handoff {
        content: String,
        calls: Vec<ToolCall>,
        index: usize,
        handoff: Handoff,
    },
    /// Tool calls to resolve before the next backend call.
    Tools { content: String, calls: Vec<ToolCall> },
}

impl NextStep {
    pub(crate) fn classify(agent: &Agent, response: ModelResponse) -> Result<Self> {
        if response.has_tool_calls() {
            let content = response.content.unwrap_or_default();
            let handoff = response
                .tool_calls
                .iter()
                .enumerate()
                .find_map(|(i, call)| agent.find_handoff(&call.name).map(|h| (i, h.clone())));
            return Ok(match handoff {
                Some((index, handoff)) => NextStep::Handoff {
                    content,
                    calls: response.tool_calls,
                    index,
                    handoff,
                },
                None => NextStep::Tools {
                    content,
                    calls: response.tool_calls,
                },
            });
        }
        match response.content {
            Some(content) if !content.is_empty() => Ok(NextStep::Final(content)),
            _ => Err(AgentsError::ModelBehavior {
                message: format!(
                    "response for agent '{}' carried neither content nor tool calls",
                    agent.name()
                ),
            }),
        }
    }
}

/// The main runner for executing agents.
///
/// - **[`run`]** executes a run and returns its result.
/// - **[`run_with_context`]** does the same with caller state attached.
/// - **[`run_sync`]** blocks the current thread until the run finishes.
///
/// The runner is stateless and can be used to execute multiple runs
/// concurrently.
///
/// ## Example: Running an Agent
///
/// ```rust
/// use agents_router::{Agent, MockProvider, Runner, runner::RunConfig};
/// use std::sync::Arc;
///
/// # async fn run_agent() -> agents_router::Result<()> {
/// let provider = Arc::new(MockProvider::new("mock").with_message("Code within the code"));
/// let agent = Agent::simple("Assistant", "You only respond in haikus.");
///
/// let result = Runner::run(
///     agent,
///     "Tell me about recursion in programming.",
///     RunConfig::default().with_model_provider(Some(provider)),
/// ).await?;
///
/// assert_eq!(result.final_output_text(), "Code within the code");
/// # Ok(())
/// # }
/// ```
///
/// [`run`]: Self::run
/// [`run_with_context`]: Self::run_with_context
/// [`run_sync`]: Self::run_sync
pub struct Runner;

impl Runner {
    /// Executes a run from a fresh context.
    pub async fn run(
        agent: impl Into<Arc<Agent>>,
        input: impl Into<RunInput>,
        config: RunConfig,
    ) -> Result<RunResult> {
        Self::run_with_context(agent, input, RunContext::new(), config).await
    }

    /// Executes a run whose guardrails and tools see the state carried by
    /// `context`. The context can be reused across runs: each run gets its
    /// own trace id, tool-call budget and usage.
    pub async fn run_with_context(
        agent: impl Into<Arc<Agent>>,
        input: impl Into<RunInput>,
        context: RunContext,
        config: RunConfig,
    ) -> Result<RunResult> {
        let mut ctx = context.for_new_run();
        if let Some(token) = config.cancellation_token.clone() {
            ctx = ctx.with_cancellation_token(token);
        }
        let ctx = ctx.with_run_config(Arc::new(config));
        Self::run_nested(agent.into(), input.into(), ctx).await
    }

    /// Executes a run and blocks until the result is available.
    ///
    /// Creates its own Tokio runtime, so it must not be called from inside
    /// one.
    pub fn run_sync(
        agent: impl Into<Arc<Agent>>,
        input: impl Into<RunInput>,
        config: RunConfig,
    ) -> Result<RunResult> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| AgentsError::configuration(format!("failed to start runtime: {e}")))?;
        runtime.block_on(Self::run(agent, input, config))
    }

    /// Executes a run under an existing context. Tools and guardrails that
    /// run agents of their own call this with [`RunContext::nested`].
    pub fn run_nested(
        agent: Arc<Agent>,
        input: RunInput,
        ctx: RunContext,
    ) -> BoxFuture<'static, Result<RunResult>> {
        let span = tracing::info_span!(
            "agent",
            agent = %agent.name(),
            depth = ctx.depth(),
            trace_id = %ctx.trace_id(),
        );
        Self::run_loop(agent, input, ctx).instrument(span).boxed()
    }

    async fn run_loop(agent: Arc<Agent>, input: RunInput, ctx: RunContext) -> Result<RunResult> {
        let config = ctx.run_config();
        if ctx.depth() > config.max_depth {
            warn!(depth = ctx.depth(), "recursion limit exceeded");
            return Err(AgentsError::RecursionLimitExceeded {
                max_depth: config.max_depth,
            });
        }
        if ctx.is_cancelled() {
            return Err(AgentsError::Cancelled);
        }
        if ctx.depth() == 0 {
            agent.validate_tree()?;
        } else {
            agent.validate()?;
        }

        let guardrail_input = input.guardrail_text();
        Self::admit(&agent, &ctx, &guardrail_input, config.guardrail_policy).await?;
        info!("Starting agent run");

        let original_input = input.into_messages();
        let mut transcript = original_input.clone();
        let mut items = Vec::new();
        let mut active = agent;
        let mut ctx = ctx;
        let mut turn_count = 0;

        loop {
            turn_count += 1;
            let max_turns = active
                .config
                .max_turns
                .or(config.max_turns)
                .unwrap_or(DEFAULT_MAX_TURNS);
            if turn_count > max_turns {
                return Err(AgentsError::MaxTurnsExceeded { max_turns });
            }
            debug!(turn = turn_count, agent = %active.name(), "Starting turn");

            let provider = Self::resolve_provider(&active, &config);
            let request = Self::build_request(&active, &transcript);
            debug!(
                target: "runner::messages",
                "\n=== Sending to provider (model: {}) ===\n{}\n=== end ===",
                provider.model_name(),
                format_messages_for_log(&request.messages)
            );

            let (response, usage) =
                Self::call_model(provider.as_ref(), request, &ctx, config.model_timeout).await?;
            ctx.record_usage(provider.model_name(), active.name(), usage);

            match NextStep::classify(&active, response)? {
                NextStep::Final(content) => {
                    let final_output = Self::final_output(&active, &content)?;
                    transcript.push(Message::assistant(content.clone()));
                    items.push(RunItem::assistant_message(active.name(), content));
                    info!(final_agent = %active.name(), turns = turn_count, "Agent run completed");
                    return Ok(RunResult {
                        final_output,
                        items,
                        final_agent: active.name().to_string(),
                        last_agent: active,
                        usage: ctx.usage(),
                        trace_id: ctx.trace_id().to_string(),
                        input: original_input,
                        messages: transcript,
                    });
                }
                NextStep::Handoff {
                    content,
                    calls,
                    index,
                    handoff,
                } => {
                    let target = handoff.agent().clone();
                    transcript.push(Message::assistant_with_tool_calls(
                        content.clone(),
                        calls.clone(),
                    ));
                    if !content.is_empty() {
                        items.push(RunItem::assistant_message(active.name(), content));
                    }
                    items.push(RunItem::Handoff(HandoffItem {
                        id: calls[index].id.clone(),
                        from_agent: active.name().to_string(),
                        to_agent: target.name().to_string(),
                        reason: handoff_reason(&calls[index].arguments),
                        created_at: chrono::Utc::now(),
                    }));
                    for (i, call) in calls.iter().enumerate() {
                        if i == index {
                            transcript.push(Message::tool(
                                format!("Transferred to {}", target.name()),
                                call.id.clone(),
                            ));
                        } else {
                            let skipped = format!(
                                "Skipped: control was handed off to {} before '{}' ran",
                                target.name(),
                                call.name
                            );
                            transcript.push(Message::tool(skipped.clone(), call.id.clone()));
                            items.push(RunItem::tool_output(active.name(), &call.id, skipped, None));
                        }
                    }
                    info!(from = %active.name(), to = %target.name(), "Handing off");

                    ctx = ctx.handed_off();
                    if ctx.depth() > config.max_depth {
                        warn!(depth = ctx.depth(), "recursion limit exceeded on handoff");
                        return Err(AgentsError::RecursionLimitExceeded {
                            max_depth: config.max_depth,
                        });
                    }
                    target.validate()?;
                    if handoff.reevaluate_guardrails {
                        Self::admit(&target, &ctx, &guardrail_input, config.guardrail_policy)
                            .await?;
                    }
                    active = target;
                }
                NextStep::Tools { content, calls } => {
                    transcript.push(Message::assistant_with_tool_calls(
                        content.clone(),
                        calls.clone(),
                    ));
                    if !content.is_empty() {
                        items.push(RunItem::assistant_message(active.name(), content));
                    }
                    ctx.reserve_tool_calls(calls.len(), config.max_tool_calls)?;
                    for call in &calls {
                        items.push(RunItem::tool_call(active.name(), call));
                    }

                    let responses = Self::run_tools(&active, &ctx, &calls, &config).await?;
                    for (call, response) in calls.iter().zip(responses) {
                        transcript.push(Message::tool(response.output.clone(), call.id.clone()));
                        items.push(RunItem::tool_output(
                            active.name(),
                            &call.id,
                            response.output,
                            response.error,
                        ));
                    }
                }
            }
        }
    }

    async fn admit(
        agent: &Agent,
        ctx: &RunContext,
        input: &str,
        policy: GuardrailPolicy,
    ) -> Result<()> {
        if agent.input_guardrails().is_empty() {
            return Ok(());
        }
        let token = ctx.cancellation_token().clone();
        let verdict = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(AgentsError::Cancelled),
            verdict = GuardrailRunner::evaluate(agent.input_guardrails(), ctx, agent, input, policy) => verdict?,
        };
        verdict.into_result()
    }

    fn resolve_provider(agent: &Agent, config: &RunConfig) -> Arc<dyn ModelProvider> {
        agent
            .config
            .model_provider
            .clone()
            .or_else(|| config.model_provider.clone())
            .unwrap_or_else(|| {
                let model = match &config.default_model {
                    Some(model) if agent.config.model == DEFAULT_MODEL => model.clone(),
                    _ => agent.config.model.clone(),
                };
                Arc::new(OpenAIProvider::new(model))
            })
    }

    fn build_request(agent: &Agent, transcript: &[Message]) -> ModelRequest {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(agent.build_system_message());
        messages.extend(transcript.iter().cloned());
        ModelRequest {
            agent: agent.name().to_string(),
            messages,
            tools: agent.tools().iter().map(|t| t.describe()).collect(),
            handoffs: agent.handoffs().iter().map(Handoff::describe).collect(),
            output_schema: agent.config.output_schema.clone(),
            temperature: agent.config.temperature,
            max_tokens: agent.config.max_tokens,
        }
    }

    async fn call_model(
        provider: &dyn ModelProvider,
        request: ModelRequest,
        ctx: &RunContext,
        model_timeout: Option<Duration>,
    ) -> Result<(ModelResponse, Usage)> {
        let call = async {
            match model_timeout {
                Some(limit) => tokio::time::timeout(limit, provider.complete(request))
                    .await
                    .map_err(|_| {
                        AgentsError::backend(format!("model call timed out after {:?}", limit))
                    })?,
                None => provider.complete(request).await,
            }
        };
        tokio::select! {
            biased;
            _ = ctx.cancellation_token().cancelled() => Err(AgentsError::Cancelled),
            res = call => res,
        }
    }

    fn final_output(agent: &Agent, content: &str) -> Result<Value> {
        let Some(schema) = &agent.config.output_schema else {
            return Ok(Value::String(content.to_string()));
        };
        let parsed: Value =
            serde_json::from_str(content.trim()).map_err(|e| AgentsError::StructuredOutput {
                message: format!("agent '{}' returned invalid JSON: {}", agent.name(), e),
            })?;
        validate_arguments(schema, &parsed).map_err(|message| AgentsError::StructuredOutput {
            message: format!("agent '{}' output does not match its schema: {}", agent.name(), message),
        })?;
        Ok(parsed)
    }

    /// Runs one turn's tool calls. Responses come back in request order
    /// whether or not the calls ran concurrently.
    async fn run_tools(
        agent: &Agent,
        ctx: &RunContext,
        calls: &[ToolCall],
        config: &RunConfig,
    ) -> Result<Vec<ToolResponse>> {
        if config.parallel_tools && calls.len() > 1 {
            let semaphore = config
                .max_concurrency
                .map(|limit| Arc::new(Semaphore::new(limit.max(1))));
            let futures = calls.iter().map(|call| {
                let semaphore = semaphore.clone();
                async move {
                    let _permit = match &semaphore {
                        Some(s) => Some(s.acquire().await.map_err(|e| AgentsError::ToolExecution {
                            tool: call.name.clone(),
                            message: e.to_string(),
                        })?),
                        None => None,
                    };
                    Self::invoke_tool(agent, ctx, call, config.tool_timeout).await
                }
            });
            join_all(futures).await.into_iter().collect()
        } else {
            let mut responses = Vec::with_capacity(calls.len());
            for call in calls {
                responses.push(Self::invoke_tool(agent, ctx, call, config.tool_timeout).await?);
            }
            Ok(responses)
        }
    }

    async fn invoke_tool(
        agent: &Agent,
        ctx: &RunContext,
        call: &ToolCall,
        tool_timeout: Option<Duration>,
    ) -> Result<ToolResponse> {
        let Some(tool) = agent.find_tool(&call.name) else {
            warn!(tool = %call.name, agent = %agent.name(), "model requested an unknown tool");
            let err = AgentsError::InvalidToolCall {
                tool: call.name.clone(),
                message: "no such tool".to_string(),
            };
            return Ok(ToolResponse::error(call.id.clone(), err.to_string()));
        };
        let request = ToolRequest {
            ctx: ctx.clone(),
            agent: agent.name().to_string(),
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
        };
        match build_tool_stack(tool.clone(), tool_timeout).oneshot(request).await {
            Ok(response) => Ok(response),
            Err(err) => match into_agents_error(err, &call.name) {
                err @ AgentsError::InvalidToolCall { .. } => {
                    warn!(tool = %call.name, error = %err, "rejected tool call");
                    Ok(ToolResponse::error(call.id.clone(), err.to_string()))
                }
                err => Err(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MockProvider;
    use crate::tool::{FunctionTool, Tool};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn mock_config(provider: MockProvider) -> (Arc<MockProvider>, RunConfig) {
        let provider = Arc::new(provider);
        let config = RunConfig::default().with_model_provider(Some(provider.clone()));
        (provider, config)
    }

    #[test]
    fn test_run_input_conversions() {
        let text = RunInput::from("What is 3 times 4?");
        assert_eq!(text.guardrail_text(), "What is 3 times 4?");
        assert_eq!(text.into_messages(), vec![Message::user("What is 3 times 4?")]);

        let history = RunInput::from(vec![
            Message::system("old instructions"),
            Message::user("first"),
            Message::assistant("answer"),
            Message::user("second"),
        ]);
        assert_eq!(history.guardrail_text(), "second");
        let messages = history.into_messages();
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m.role != Role::System));
    }

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();
        assert_eq!(config.max_turns, Some(10));
        assert_eq!(config.max_depth, 5);
        assert!(config.parallel_tools);
        assert_eq!(config.guardrail_policy, GuardrailPolicy::FirstTriggered);
    }

    #[test]
    fn test_config_from_sdk() {
        let sdk = crate::config::ConfigBuilder::new()
            .max_depth(2)
            .max_tool_calls(4)
            .build();
        let config = RunConfig::from_sdk_config(&sdk);
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.max_tool_calls, Some(4));
        assert_eq!(config.default_model.as_deref(), Some("gpt-4o-mini"));
    }

    #[tokio::test]
    async fn test_invalid_handoff_target_fails_before_first_call() {
        let echo: Arc<dyn Tool> = Arc::new(FunctionTool::simple("echo", "Echo", |s: String| s));
        let tutor = Agent::simple("Math Tutor", "math")
            .with_tool(echo.clone())
            .with_tool(echo);
        let (provider, config) = mock_config(MockProvider::new("mock").with_message("hi"));
        let triage = Agent::simple("Triage Agent", "route").with_handoff(Handoff::new(tutor));

        let err = Runner::run(triage, "2x = 8", config).await.unwrap_err();
        assert!(matches!(err, AgentsError::Configuration { .. }));
        assert_eq!(provider.request_count(), 0);
    }

    #[test]
    fn test_default_model_reaches_fallback_provider() {
        let sdk = crate::config::ConfigBuilder::new().model("gpt-4.1").build();
        let config = RunConfig::from_sdk_config(&sdk);

        let plain = Agent::simple("Assistant", "x");
        let pinned = Agent::simple("Assistant", "x").with_model("o3-mini");
        assert_eq!(Runner::resolve_provider(&plain, &config).model_name(), "gpt-4.1");
        assert_eq!(Runner::resolve_provider(&pinned, &config).model_name(), "o3-mini");
        assert_eq!(
            Runner::resolve_provider(&plain, &RunConfig::default()).model_name(),
            "gpt-4o-mini"
        );
    }

    #[test]
    fn test_classify_handoff_wins() {
        let agent = Agent::simple("Triage Agent", "route")
            .with_handoff(Handoff::new(Agent::simple("Math Tutor", "math")));
        let response = ModelResponse::new_tool_calls(vec![
            ToolCall::new("c1", "lookup", json!({})),
            ToolCall::new("c2", "transfer_to_math_tutor", json!({})),
        ]);
        match NextStep::classify(&agent, response).unwrap() {
            NextStep::Handoff { index, handoff, .. } => {
                assert_eq!(index, 1);
                assert_eq!(handoff.agent().name(), "Math Tutor");
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn test_classify_empty_response() {
        let agent = Agent::simple("A", "x");
        let mut response = ModelResponse::new_message("");
        response.content = None;
        assert!(matches!(
            NextStep::classify(&agent, response),
            Err(AgentsError::ModelBehavior { .. })
        ));
    }

    #[test]
    fn test_format_messages_for_log() {
        let log = format_messages_for_log(&[
            Message::user("hi"),
            Message::tool("12", "call_1"),
        ]);
        assert!(log.contains("00 USER     | hi"));
        assert!(log.contains("01 TOOL     | tool_call_id=call_1 payload=12"));
        assert_eq!(truncate_for_log("héllo", 2), "h…");
    }

    #[tokio::test]
    async fn test_simple_run() {
        let (provider, config) = mock_config(MockProvider::new("mock").with_message("Hello!"));
        let agent = Agent::simple("Assistant", "Be helpful");
        let result = Runner::run(agent, "Hi", config).await.unwrap();

        assert_eq!(result.final_output, json!("Hello!"));
        assert_eq!(result.final_agent, "Assistant");
        assert_eq!(result.usage.total.request_count, 1);
        let request = &provider.requests()[0];
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.last_user_message(), Some("Hi"));
    }

    #[tokio::test]
    async fn test_tool_call_then_answer() {
        let multiply: Arc<dyn Tool> = Arc::new(FunctionTool::new(
            "multiply",
            "Multiplies x and y",
            json!({
                "type": "object",
                "properties": {"x": {"type": "number"}, "y": {"type": "number"}},
                "required": ["x", "y"]
            }),
            |args| Ok(json!(args["x"].as_f64().unwrap_or(0.0) * args["y"].as_f64().unwrap_or(0.0))),
        ));
        let (provider, config) = mock_config(
            MockProvider::new("mock")
                .with_tool_call("multiply", json!({"x": 3, "y": 4}))
                .with_message("3 times 4 is 12"),
        );
        let agent = Agent::simple("Math Agent", "Use tools").with_tool(multiply);
        let result = Runner::run(agent, "What is 3 times 4?", config).await.unwrap();

        assert_eq!(result.final_output_text(), "3 times 4 is 12");
        assert_eq!(result.tool_call_count(), 1);
        let second = &provider.requests()[1];
        let observation = second.messages.last().unwrap();
        assert_eq!(observation.role, Role::Tool);
        assert_eq!(observation.content, "12.0");
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_observation() {
        let (provider, config) = mock_config(
            MockProvider::new("mock")
                .with_tool_call("does_not_exist", json!({}))
                .with_message("sorry"),
        );
        let result = Runner::run(Agent::simple("A", "x"), "go", config).await.unwrap();
        assert_eq!(result.final_output_text(), "sorry");
        let observation = provider.requests()[1].messages.last().unwrap().clone();
        assert!(observation.content.starts_with("Error: Invalid call to tool 'does_not_exist'"));
    }

    #[tokio::test]
    async fn test_max_turns() {
        let looping: Arc<dyn Tool> =
            Arc::new(FunctionTool::simple("echo", "Echo", |s: String| s));
        let mut provider = MockProvider::new("mock");
        for _ in 0..5 {
            provider = provider.with_tool_call("echo", json!({"input": "again"}));
        }
        let (_, config) = mock_config(provider);
        let agent = Agent::simple("Loop", "x").with_tool(looping);
        let err = Runner::run(agent, "go", config.with_max_turns(3)).await.unwrap_err();
        assert!(matches!(err, AgentsError::MaxTurnsExceeded { max_turns: 3 }));
    }

    #[tokio::test]
    async fn test_structured_output_mismatch() {
        let (_, config) = mock_config(MockProvider::new("mock").with_message("not json"));
        let agent = Agent::simple("Classifier", "x").with_output_schema(json!({
            "type": "object",
            "properties": {"is_homework": {"type": "boolean"}},
            "required": ["is_homework"]
        }));
        let err = Runner::run(agent, "go", config).await.unwrap_err();
        assert!(matches!(err, AgentsError::StructuredOutput { .. }));
    }

    #[test]
    fn test_run_sync() {
        let provider: Arc<dyn ModelProvider> =
            Arc::new(MockProvider::new("mock").with_message("Code within the code"));
        let agent = Agent::simple("Assistant", "You only respond in haikus.");
        let result = Runner::run_sync(
            agent,
            "Tell me about recursion in programming.",
            RunConfig::default().with_model_provider(Some(provider)),
        )
        .unwrap();
        assert_eq!(result.final_output_text(), "Code within the code");
    }
}
