//! # Agent handoffs
//!
//! A handoff permanently transfers control of a run from one agent to
//! another. The backend sees each [`Handoff`] as a callable tool named
//! `transfer_to_<agent>`; when it calls one, the runner switches the active
//! agent instead of executing anything, and every later tool call or handoff
//! is resolved against the new agent's configuration.
//!
//! ```rust
//! use agents_router::{Agent, Handoff};
//!
//! let history_tutor = Agent::simple(
//!     "History Tutor",
//!     "You provide assistance with historical queries.",
//! )
//! .with_handoff_description("Specialist agent for historical questions");
//!
//! let triage = Agent::simple(
//!     "Triage Agent",
//!     "You determine which agent to use based on the user's homework question",
//! )
//! .with_handoff(Handoff::new(history_tutor));
//!
//! assert_eq!(triage.handoffs()[0].name, "transfer_to_history_tutor");
//! ```

use std::sync::Arc;

use serde_json::Value;

use crate::agent::Agent;
use crate::tool::ToolSpec;

/// A potential handoff target of an agent.
#[derive(Clone)]
pub struct Handoff {
    /// Tool name the backend calls to take this handoff.
    pub name: String,

    /// Shown to the backend to help it decide when to hand off.
    pub description: String,

    pub agent: Arc<Agent>,

    /// Re-run the target's input guardrails when this handoff is taken.
    pub reevaluate_guardrails: bool,
}

impl Handoff {
    /// Creates a handoff named `transfer_to_<agent name>`, described by the
    /// target's `handoff_description` when it has one.
    pub fn new(agent: impl Into<Arc<Agent>>) -> Self {
        let agent = agent.into();
        let description = agent
            .config
            .handoff_description
            .clone()
            .unwrap_or_else(|| format!("Hand off to the {} agent.", agent.name()));
        Self {
            name: default_handoff_name(agent.name()),
            description,
            agent,
            reevaluate_guardrails: false,
        }
    }

    /// Creates a handoff with an explicit tool name and description.
    pub fn with_name(
        agent: impl Into<Arc<Agent>>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            agent: agent.into(),
            reevaluate_guardrails: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Gate the target with its own input guardrails when control moves to it.
    pub fn with_guardrail_reevaluation(mut self, enabled: bool) -> Self {
        self.reevaluate_guardrails = enabled;
        self
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    /// Tool-shaped description advertised to the backend.
    pub fn describe(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: handoff_parameters(),
        }
    }
}

impl std::fmt::Debug for Handoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handoff")
            .field("name", &self.name)
            .field("target", &self.agent.name())
            .field("reevaluate_guardrails", &self.reevaluate_guardrails)
            .finish()
    }
}

/// `"History Tutor"` becomes `"transfer_to_history_tutor"`.
pub fn default_handoff_name(agent_name: &str) -> String {
    let mut slug = String::with_capacity(agent_name.len());
    for c in agent_name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    format!("transfer_to_{}", slug.trim_end_matches('_'))
}

fn handoff_parameters() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "reason": {"type": "string", "description": "Why control is being handed off"}
        }
    })
}

/// The `reason` argument of a handoff call, if the backend gave one.
pub(crate) fn handoff_reason(arguments: &Value) -> Option<String> {
    arguments
        .get("reason")
        .and_then(Value::as_str)
        .map(str::to_string)
}
