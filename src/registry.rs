//! Named set of agents a caller can submit requests to.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::agent::Agent;
use crate::context::RunContext;
use crate::error::{AgentsError, Result};
use crate::result::RunResult;
use crate::runner::{RunConfig, RunInput, Runner};

/// Agents registered under unique names.
///
/// ```rust
/// use agents_router::{Agent, AgentRegistry};
///
/// let mut registry = AgentRegistry::new();
/// registry.register(Agent::simple("Triage Agent", "route")).unwrap();
/// assert!(registry.register(Agent::simple("Triage Agent", "again")).is_err());
/// assert_eq!(registry.names(), vec!["Triage Agent"]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct AgentRegistry {
    agents: BTreeMap<String, Arc<Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an agent. Fails if the name is taken or the tools and handoffs
    /// of any agent reachable from it do not form an unambiguous lookup.
    pub fn register(&mut self, agent: impl Into<Arc<Agent>>) -> Result<Arc<Agent>> {
        let agent = agent.into();
        agent.validate_tree()?;
        if self.agents.contains_key(agent.name()) {
            return Err(AgentsError::configuration(format!(
                "an agent named '{}' is already registered",
                agent.name()
            )));
        }
        self.agents.insert(agent.name().to_string(), agent.clone());
        Ok(agent)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Agent>> {
        self.agents.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Runs the named agent on `input`.
    pub async fn submit(
        &self,
        name: &str,
        input: impl Into<RunInput>,
        config: RunConfig,
    ) -> Result<RunResult> {
        self.submit_with_context(name, input, RunContext::new(), config)
            .await
    }

    pub async fn submit_with_context(
        &self,
        name: &str,
        input: impl Into<RunInput>,
        context: RunContext,
        config: RunConfig,
    ) -> Result<RunResult> {
        let agent = self.get(name).ok_or_else(|| {
            AgentsError::configuration(format!("no agent named '{}' is registered", name))
        })?;
        Runner::run_with_context(agent, input, context, config).await
    }
}
