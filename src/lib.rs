//! # agents-router
//!
//! A multi-agent task-routing core. Requests are checked by input
//! guardrails before any expensive work runs, then routed to specialized
//! agents through handoffs, or fanned out to agents exposed as tools and
//! assembled into one answer by an orchestrator. The reasoning itself is
//! delegated to a [`ModelProvider`].
//!
//! ## Core Concepts
//!
//! - **Agent**: instructions plus the tools, handoffs and guardrails it may use
//! - **Tools**: functions or whole agents the backend can call; every call goes
//!   through a Tower service stack (cancellation, timeout, schema validation)
//! - **Handoffs**: transfer control of a run to another agent for good
//! - **Guardrails**: admit or reject the input before the entry agent runs
//! - **Runner**: the loop tying these together, with explicit depth, turn and
//!   tool-call limits
//!
//! ## Getting Started
//!
//! Set your OpenAI API key in the `OPENAI_API_KEY` environment variable, or
//! script the backend with [`MockProvider`] as below.
//!
//! ```rust
//! use agents_router::{Agent, Handoff, MockProvider, RunConfig, Runner};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> agents_router::Result<()> {
//! let math_tutor = Agent::simple(
//!     "Math Tutor",
//!     "You provide help with math problems. Explain your reasoning at each step.",
//! )
//! .with_handoff_description("Specialist agent for math questions");
//!
//! let triage = Agent::simple(
//!     "Triage Agent",
//!     "You determine which agent to use based on the user's homework question",
//! )
//! .with_handoff(Handoff::new(math_tutor));
//!
//! let provider = Arc::new(
//!     MockProvider::new("mock")
//!         .with_tool_call("transfer_to_math_tutor", json!({}))
//!         .with_message("2x = 8, so x = 4."),
//! );
//! let result = Runner::run(
//!     triage,
//!     "Solve 2x = 8",
//!     RunConfig::default().with_model_provider(Some(provider)),
//! )
//! .await?;
//!
//! assert_eq!(result.final_agent, "Math Tutor");
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod guardrail;
pub mod handoff;
pub mod items;
pub mod model;
pub mod registry;
pub mod result;
pub mod runner;
pub mod schema;
pub mod service;
pub mod tool;
pub mod usage;

// Public re-exports for convenience
pub use agent::{Agent, AgentConfig, AgentTool};
pub use config::SdkConfig;
pub use context::RunContext;
pub use error::{AgentsError, GuardrailRejection, Result};
pub use guardrail::{
    AgentGuardrail, FnGuardrail, GuardrailOutput, GuardrailPolicy, GuardrailRunner,
    GuardrailVerdict, InputGuardrail, MaxLengthGuardrail, PatternBlockGuardrail,
};
pub use handoff::Handoff;
pub use items::{Message, ModelResponse, Role, RunItem, ToolCall};
pub use model::{MockProvider, ModelProvider, ModelRequest, OpenAIProvider};
pub use registry::AgentRegistry;
pub use result::RunResult;
pub use runner::{RunConfig, RunInput, Runner};
pub use tool::{FunctionTool, Tool, ToolErrorPolicy, ToolResult, ToolSpec};
pub use usage::{Usage, UsageStats};

// Re-export async-openai types that users need
pub use async_openai::{config::OpenAIConfig, Client};
