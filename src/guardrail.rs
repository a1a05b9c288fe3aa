//! # Input guardrails
//!
//! Guardrails decide whether a request may reach an agent at all. They run
//! before the agent's first backend call and either admit the input or trip
//! a wire carrying a structured diagnostic. [`GuardrailRunner::evaluate`]
//! applies a list of guardrails under an explicit [`GuardrailPolicy`].
//!
//! The usual guardrail is itself an agent: [`AgentGuardrail`] runs a small
//! classification agent to completion, parses its structured answer into a
//! typed payload and applies a predicate to it.
//!
//! ```rust
//! use agents_router::{Agent, AgentGuardrail};
//! use schemars::JsonSchema;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, JsonSchema)]
//! struct HomeworkOutput {
//!     is_homework: bool,
//!     reasoning: String,
//! }
//!
//! let classifier = Agent::simple("Guardrail check", "Check if the user is asking about homework.")
//!     .with_output_type::<HomeworkOutput>();
//! let guardrail = AgentGuardrail::new("homework", classifier, |out: &HomeworkOutput| out.is_homework);
//! # let _ = guardrail;
//! ```

use std::cmp::Reverse;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::agent::Agent;
use crate::context::RunContext;
use crate::error::{AgentsError, GuardrailRejection, Result};
use crate::runner::{RunInput, Runner};

/// What a single guardrail concluded about an input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailOutput {
    /// `true` rejects the input.
    pub tripwire_triggered: bool,
    /// Structured reasoning, reported back to the caller on rejection.
    pub output_info: Value,
}

impl GuardrailOutput {
    pub fn admit(output_info: Value) -> Self {
        Self {
            tripwire_triggered: false,
            output_info,
        }
    }

    pub fn reject(output_info: Value) -> Self {
        Self {
            tripwire_triggered: true,
            output_info,
        }
    }
}

/// Trait for guardrails that validate input before an agent runs.
#[async_trait]
pub trait InputGuardrail: Send + Sync {
    fn name(&self) -> &str;

    /// Higher priorities run first under [`GuardrailPolicy::FirstTriggered`].
    fn priority(&self) -> i32 {
        0
    }

    async fn check(&self, ctx: &RunContext, agent: &Agent, input: &str) -> Result<GuardrailOutput>;
}

/// How a list of guardrails is combined into one verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardrailPolicy {
    /// Run sequentially by descending priority (declaration order among
    /// equals) and stop at the first rejection.
    #[default]
    FirstTriggered,
    /// Run every guardrail concurrently; the first rejection in declaration
    /// order is reported.
    RunAll,
}

/// Combined outcome of a guardrail evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardrailVerdict {
    Admitted,
    Rejected(GuardrailRejection),
}

impl GuardrailVerdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, GuardrailVerdict::Admitted)
    }

    /// `Err(TripwireTriggered)` on rejection.
    pub fn into_result(self) -> Result<()> {
        match self {
            GuardrailVerdict::Admitted => Ok(()),
            GuardrailVerdict::Rejected(rejection) => {
                Err(AgentsError::TripwireTriggered(rejection))
            }
        }
    }
}

/// Evaluates guardrails for a candidate agent.
pub struct GuardrailRunner;

impl GuardrailRunner {
    pub async fn evaluate(
        guardrails: &[Arc<dyn InputGuardrail>],
        ctx: &RunContext,
        agent: &Agent,
        input: &str,
        policy: GuardrailPolicy,
    ) -> Result<GuardrailVerdict> {
        match policy {
            GuardrailPolicy::FirstTriggered => {
                let mut ordered = guardrails.to_vec();
                ordered.sort_by_key(|g| Reverse(g.priority()));
                for guard in ordered {
                    let output = guard.check(ctx, agent, input).await?;
                    debug!(guardrail = %guard.name(), tripped = output.tripwire_triggered, "guardrail checked");
                    if output.tripwire_triggered {
                        return Ok(Self::rejected(&*guard, agent, output));
                    }
                }
                Ok(GuardrailVerdict::Admitted)
            }
            GuardrailPolicy::RunAll => {
                let outcomes =
                    join_all(guardrails.iter().map(|g| g.check(ctx, agent, input))).await;
                for (guard, outcome) in guardrails.iter().zip(outcomes) {
                    let output = outcome?;
                    debug!(guardrail = %guard.name(), tripped = output.tripwire_triggered, "guardrail checked");
                    if output.tripwire_triggered {
                        return Ok(Self::rejected(&**guard, agent, output));
                    }
                }
                Ok(GuardrailVerdict::Admitted)
            }
        }
    }

    fn rejected(
        guard: &dyn InputGuardrail,
        agent: &Agent,
        output: GuardrailOutput,
    ) -> GuardrailVerdict {
        info!(guardrail = %guard.name(), agent = %agent.name(), "input guardrail tripped");
        GuardrailVerdict::Rejected(GuardrailRejection {
            guardrail: guard.name().to_string(),
            agent: agent.name().to_string(),
            diagnostic: output.output_info,
        })
    }
}

type AdmitFn<T> = dyn Fn(&T) -> bool + Send + Sync;

/// A guardrail backed by a classification agent.
///
/// The classifier runs as a nested run of the guarded one. Its final output
/// is parsed into `T`; a parse failure is [`AgentsError::StructuredOutput`]
/// and a failed classification call is [`AgentsError::BackendFailure`].
/// `admit` decides on the parsed payload, which becomes the diagnostic.
pub struct AgentGuardrail<T> {
    name: String,
    classifier: Arc<Agent>,
    admit: Arc<AdmitFn<T>>,
    priority: i32,
    _payload: PhantomData<fn() -> T>,
}

impl<T> AgentGuardrail<T>
where
    T: DeserializeOwned + Serialize + Send + Sync + 'static,
{
    pub fn new<F>(name: impl Into<String>, classifier: impl Into<Arc<Agent>>, admit: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            classifier: classifier.into(),
            admit: Arc::new(admit),
            priority: 0,
            _payload: PhantomData,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait]
impl<T> InputGuardrail for AgentGuardrail<T>
where
    T: DeserializeOwned + Serialize + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn check(&self, ctx: &RunContext, _agent: &Agent, input: &str) -> Result<GuardrailOutput> {
        let result = Runner::run_nested(
            self.classifier.clone(),
            RunInput::from(input),
            ctx.nested(),
        )
        .await
        .map_err(|err| match err {
            AgentsError::BackendFailure { .. } | AgentsError::StructuredOutput { .. } => err,
            err if err.is_fatal() => err,
            err => AgentsError::BackendFailure {
                message: format!("guardrail '{}' classification failed: {}", self.name, err),
            },
        })?;
        let payload: T = result.final_output_as()?;
        let admitted = (self.admit)(&payload);
        let info = serde_json::to_value(&payload)?;
        Ok(if admitted {
            GuardrailOutput::admit(info)
        } else {
            GuardrailOutput::reject(info)
        })
    }
}

type CheckFn = dyn Fn(&str) -> GuardrailOutput + Send + Sync;

/// A deterministic guardrail from a plain function of the input.
pub struct FnGuardrail {
    name: String,
    priority: i32,
    check: Arc<CheckFn>,
}

impl FnGuardrail {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&str) -> GuardrailOutput + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            priority: 0,
            check: Arc::new(check),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait]
impl InputGuardrail for FnGuardrail {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn check(&self, _ctx: &RunContext, _agent: &Agent, input: &str) -> Result<GuardrailOutput> {
        Ok((self.check)(input))
    }
}

/// Rejects inputs longer than a maximum number of characters.
#[derive(Debug, Clone)]
pub struct MaxLengthGuardrail {
    name: String,
    max_length: usize,
}

impl MaxLengthGuardrail {
    pub fn new(max_length: usize) -> Self {
        Self {
            name: format!("MaxLength_{}", max_length),
            max_length,
        }
    }
}

#[async_trait]
impl InputGuardrail for MaxLengthGuardrail {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, _ctx: &RunContext, _agent: &Agent, input: &str) -> Result<GuardrailOutput> {
        let length = input.chars().count();
        let info = serde_json::json!({"length": length, "max_length": self.max_length});
        Ok(if length > self.max_length {
            GuardrailOutput::reject(info)
        } else {
            GuardrailOutput::admit(info)
        })
    }
}

/// Rejects inputs containing any of a list of patterns, case-insensitively.
#[derive(Debug, Clone)]
pub struct PatternBlockGuardrail {
    name: String,
    patterns: Vec<String>,
}

impl PatternBlockGuardrail {
    pub fn new(name: impl Into<String>, patterns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            patterns,
        }
    }
}

#[async_trait]
impl InputGuardrail for PatternBlockGuardrail {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, _ctx: &RunContext, _agent: &Agent, input: &str) -> Result<GuardrailOutput> {
        let input_lower = input.to_lowercase();
        let blocked = self
            .patterns
            .iter()
            .find(|p| input_lower.contains(&p.to_lowercase()));
        Ok(match blocked {
            Some(pattern) => GuardrailOutput::reject(serde_json::json!({"blocked_pattern": pattern})),
            None => GuardrailOutput::admit(Value::Null),
        })
    }
}
