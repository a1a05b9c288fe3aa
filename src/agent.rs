//! # Agent (orientation)
//!
//! An `Agent` is a named participant in a run: instructions for the
//! reasoning backend, the tools it may call, the peers it may hand off to,
//! and the input guardrails that gate it. Agents are immutable once built
//! and shared as `Arc<Agent>` by handoffs, agent tools and registries.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde_json::Value;

use crate::context::RunContext;
use crate::error::{AgentsError, Result};
use crate::guardrail::InputGuardrail;
use crate::handoff::Handoff;
use crate::items::Message;
use crate::model::ModelProvider;
use crate::runner::{RunInput, Runner};
use crate::tool::{Tool, ToolResult};

/// Defines the complete configuration for an [`Agent`].
#[derive(Clone)]
pub struct AgentConfig {
    /// Unique within a registry; used in logs and transcript attribution.
    pub name: String,

    /// The system instructions passed to the reasoning backend.
    pub instructions: String,

    /// Shown to other agents when this agent is a handoff target.
    pub handoff_description: Option<String>,

    /// Ordered tools; names must be unique within the agent.
    pub tools: Vec<Arc<dyn Tool>>,

    /// Peers this agent may transfer control to.
    pub handoffs: Vec<Handoff>,

    /// Checked before this agent runs as the entry agent of a run.
    pub input_guardrails: Vec<Arc<dyn InputGuardrail>>,

    /// Model used when no provider is configured explicitly.
    pub model: String,

    /// Overrides the run's turn limit for this agent.
    pub max_turns: Option<usize>,

    pub temperature: Option<f32>,

    pub max_tokens: Option<u32>,

    /// JSON schema the final answer must satisfy. The final output is then
    /// the parsed JSON document instead of text.
    pub output_schema: Option<Value>,

    /// Backend for this agent only; takes precedence over the run's provider.
    pub model_provider: Option<Arc<dyn ModelProvider>>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Assistant".to_string(),
            instructions: "You are a helpful assistant.".to_string(),
            handoff_description: None,
            tools: vec![],
            handoffs: vec![],
            input_guardrails: vec![],
            model: crate::config::DEFAULT_MODEL.to_string(),
            max_turns: None,
            temperature: None,
            max_tokens: None,
            output_schema: None,
            model_provider: None,
        }
    }
}

/// A configured agent.
///
/// ## Example
///
/// ```rust
/// use agents_router::{Agent, tool::FunctionTool};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let multiply = Arc::new(FunctionTool::new(
///     "multiply",
///     "Multiplies `x` and `y` to provide a precise answer.",
///     json!({
///         "type": "object",
///         "properties": {"x": {"type": "number"}, "y": {"type": "number"}},
///         "required": ["x", "y"]
///     }),
///     |args| Ok(json!(args["x"].as_f64().unwrap_or(0.0) * args["y"].as_f64().unwrap_or(0.0))),
/// ));
///
/// let math_agent = Agent::simple("Math Agent", "Always use the provided tools.")
///     .with_model("gpt-4o-mini")
///     .with_tool(multiply);
///
/// assert_eq!(math_agent.config.model, "gpt-4o-mini");
/// assert!(math_agent.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct Agent {
    pub config: AgentConfig,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Creates an agent with just a name and instructions.
    pub fn simple(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self::new(AgentConfig {
            name: name.into(),
            instructions: instructions.into(),
            ..Default::default()
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.config.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.config.tools.extend(tools);
        self
    }

    pub fn with_handoff(mut self, handoff: Handoff) -> Self {
        self.config.handoffs.push(handoff);
        self
    }

    pub fn with_handoffs(mut self, handoffs: Vec<Handoff>) -> Self {
        self.config.handoffs.extend(handoffs);
        self
    }

    pub fn with_handoff_description(mut self, description: impl Into<String>) -> Self {
        self.config.handoff_description = Some(description.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.config.max_turns = Some(max_turns);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_input_guardrail(mut self, guardrail: Arc<dyn InputGuardrail>) -> Self {
        self.config.input_guardrails.push(guardrail);
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.config.output_schema = Some(schema);
        self
    }

    /// Requires the final answer to match the schema derived from `T`.
    pub fn with_output_type<T: JsonSchema>(self) -> Self {
        let schema = schemars::schema_for!(T);
        match serde_json::to_value(schema.schema) {
            Ok(schema) => self.with_output_schema(schema),
            Err(_) => self,
        }
    }

    pub fn with_model_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.config.model_provider = Some(provider);
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn instructions(&self) -> &str {
        &self.config.instructions
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.config.tools
    }

    pub fn handoffs(&self) -> &[Handoff] {
        &self.config.handoffs
    }

    pub fn input_guardrails(&self) -> &[Arc<dyn InputGuardrail>] {
        &self.config.input_guardrails
    }

    pub fn has_tools(&self) -> bool {
        !self.config.tools.is_empty()
    }

    pub fn has_handoffs(&self) -> bool {
        !self.config.handoffs.is_empty()
    }

    pub fn find_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.config.tools.iter().find(|t| t.name() == name)
    }

    pub fn find_handoff(&self, name: &str) -> Option<&Handoff> {
        self.config.handoffs.iter().find(|h| h.name == name)
    }

    /// Checks that tool and handoff names form a closed, unambiguous lookup:
    /// no duplicate tool names, no duplicate handoff names, and no name used
    /// by both a tool and a handoff.
    pub fn validate(&self) -> Result<()> {
        if self.config.name.trim().is_empty() {
            return Err(AgentsError::configuration("agent name must not be empty"));
        }
        let mut tool_names = HashSet::new();
        for tool in &self.config.tools {
            if !tool_names.insert(tool.name()) {
                return Err(AgentsError::configuration(format!(
                    "agent '{}' declares tool '{}' more than once",
                    self.name(),
                    tool.name()
                )));
            }
        }
        let mut handoff_names = HashSet::new();
        for handoff in &self.config.handoffs {
            if tool_names.contains(handoff.name.as_str()) {
                return Err(AgentsError::configuration(format!(
                    "agent '{}' uses '{}' as both a tool and a handoff",
                    self.name(),
                    handoff.name
                )));
            }
            if !handoff_names.insert(handoff.name.as_str()) {
                return Err(AgentsError::configuration(format!(
                    "agent '{}' declares handoff '{}' more than once",
                    self.name(),
                    handoff.name
                )));
            }
        }
        Ok(())
    }

    /// Validates this agent and every agent reachable from it through
    /// handoffs and agent tools. Cycles are visited once.
    pub fn validate_tree(&self) -> Result<()> {
        let mut visited = HashSet::new();
        self.validate_reachable(&mut visited)
    }

    fn validate_reachable(&self, visited: &mut HashSet<*const Agent>) -> Result<()> {
        if !visited.insert(self as *const Agent) {
            return Ok(());
        }
        self.validate()?;
        for handoff in &self.config.handoffs {
            handoff.agent.validate_reachable(visited)?;
        }
        for tool in &self.config.tools {
            if let Some(agent) = tool.wrapped_agent() {
                agent.validate_reachable(visited)?;
            }
        }
        Ok(())
    }

    /// Exposes this agent as a tool. Calling the tool runs the agent to
    /// completion as a nested run and returns its final answer.
    pub fn as_tool(&self, name: impl Into<String>, description: impl Into<String>) -> Arc<dyn Tool> {
        Arc::new(AgentTool::new(self.clone(), name, description))
    }

    /// The system message sent ahead of the transcript: the instructions,
    /// followed by the available tools and handoff targets.
    pub fn build_system_message(&self) -> Message {
        let mut content = self.config.instructions.clone();

        if !self.config.tools.is_empty() {
            content.push_str("\n\nYou have access to the following tools:\n");
            for tool in &self.config.tools {
                content.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
            }
        }

        if !self.config.handoffs.is_empty() {
            content.push_str("\n\nYou can hand off to the following agents:\n");
            for handoff in &self.config.handoffs {
                content.push_str(&format!(
                    "- {} ({}): {}\n",
                    handoff.name,
                    handoff.agent.name(),
                    handoff.description
                ));
            }
        }

        Message::system(content)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.config.name)
            .field("model", &self.config.model)
            .field("tools_count", &self.config.tools.len())
            .field("handoffs_count", &self.config.handoffs.len())
            .field("guardrails_count", &self.config.input_guardrails.len())
            .finish()
    }
}

/// A tool backed by an agent.
///
/// The tool takes a single `input` string. Failures of the nested run that
/// the calling agent can route around (a guardrail rejection, a backend
/// failure, running out of turns) come back as `"Error: ..."` observations;
/// recursion-limit, budget and cancellation errors abort the whole run.
#[derive(Clone)]
pub struct AgentTool {
    name: String,
    description: String,
    agent: Arc<Agent>,
}

impl AgentTool {
    pub fn new(
        agent: impl Into<Arc<Agent>>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            agent: agent.into(),
        }
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }
}

impl std::fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTool")
            .field("name", &self.name)
            .field("agent", &self.agent.name())
            .finish()
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "input": {
                    "type": "string",
                    "description": format!("The request for the {} agent", self.agent.name())
                }
            },
            "required": ["input"]
        })
    }

    async fn execute(&self, ctx: &RunContext, arguments: Value) -> Result<ToolResult> {
        let input = match arguments.get("input") {
            Some(Value::String(s)) => s.clone(),
            _ => {
                return Err(AgentsError::InvalidToolCall {
                    tool: self.name.clone(),
                    message: "expected a string 'input' argument".to_string(),
                })
            }
        };
        match Runner::run_nested(self.agent.clone(), RunInput::Text(input), ctx.nested()).await {
            Ok(result) => Ok(ToolResult::success(result.final_output_text())),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                tracing::warn!(agent = %self.agent.name(), error = %err, "nested agent run failed");
                Ok(ToolResult::error(format!(
                    "agent '{}' failed: {}",
                    self.agent.name(),
                    err
                )))
            }
        }
    }

    fn wrapped_agent(&self) -> Option<&Arc<Agent>> {
        Some(&self.agent)
    }
}
