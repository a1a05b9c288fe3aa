//! Error types for the agents router

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type alias for the agents router
pub type Result<T> = std::result::Result<T, AgentsError>;

/// Details of an input guardrail that rejected a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailRejection {
    /// Name of the guardrail that tripped.
    pub guardrail: String,
    /// Name of the agent the guardrail was protecting.
    pub agent: String,
    /// Structured reasoning reported by the guardrail.
    pub diagnostic: Value,
}

/// Main error type for the agents router
#[derive(Debug, Error)]
pub enum AgentsError {
    /// An input guardrail rejected the request before the agent ran
    #[error("Input guardrail '{}' tripped for agent '{}'", .0.guardrail, .0.agent)]
    TripwireTriggered(GuardrailRejection),

    /// The reasoning backend could not be reached or returned an error
    #[error("Backend failure: {message}")]
    BackendFailure { message: String },

    /// Unknown tool or arguments that do not satisfy the tool's schema
    #[error("Invalid call to tool '{tool}': {message}")]
    InvalidToolCall { tool: String, message: String },

    /// The function or agent behind a tool failed
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// Nested runs or handoff chains went deeper than allowed
    #[error("Recursion limit exceeded: max depth {max_depth}")]
    RecursionLimitExceeded { max_depth: usize },

    /// The run tree requested more tool calls than allowed
    #[error("Tool call budget exceeded: max {max_tool_calls} tool calls per run")]
    ToolCallBudgetExceeded { max_tool_calls: usize },

    /// Maximum turns exceeded
    #[error("Maximum turns exceeded: {max_turns}")]
    MaxTurnsExceeded { max_turns: usize },

    /// The backend returned a response the runner cannot interpret
    #[error("Model behavior error: {message}")]
    ModelBehavior { message: String },

    /// Structured output could not be coerced into the expected shape
    #[error("Structured output error: {message}")]
    StructuredOutput { message: String },

    /// The run was cancelled by the caller
    #[error("Run cancelled")]
    Cancelled,

    /// Agents, tools or handoffs were wired together incorrectly
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentsError {
    /// Errors that break the run's own invariants and must abort the whole
    /// run tree instead of being fed back to the calling agent.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentsError::RecursionLimitExceeded { .. }
                | AgentsError::ToolCallBudgetExceeded { .. }
                | AgentsError::Cancelled
        )
    }

    /// Returns the guardrail rejection if this error is a tripwire.
    pub fn rejection(&self) -> Option<&GuardrailRejection> {
        match self {
            AgentsError::TripwireTriggered(rejection) => Some(rejection),
            _ => None,
        }
    }

    pub(crate) fn backend(message: impl Into<String>) -> Self {
        AgentsError::BackendFailure {
            message: message.into(),
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        AgentsError::Configuration {
            message: message.into(),
        }
    }
}

impl From<async_openai::error::OpenAIError> for AgentsError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        AgentsError::BackendFailure {
            message: err.to_string(),
        }
    }
}
