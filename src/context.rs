//! # Run context
//!
//! A [`RunContext`] travels with every run: it carries the caller's opaque
//! state (never inspected by the runner) together with the scope the runner
//! needs to enforce its limits across nested runs. Guardrails and tools
//! receive it by reference; nested runs receive [`RunContext::nested`], which
//! shares the caller state, trace id and tool-call counter, increments the
//! depth, and derives a child cancellation token so that cancelling a run
//! cancels everything it spawned.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::error::{AgentsError, Result};
use crate::runner::RunConfig;
use crate::usage::{Usage, UsageStats};

/// Per-run state threaded through guardrails, tools and nested runs.
#[derive(Clone)]
pub struct RunContext {
    user: Option<Arc<dyn Any + Send + Sync>>,
    trace_id: String,
    depth: usize,
    cancel: CancellationToken,
    tool_calls: Arc<AtomicUsize>,
    usage: Arc<Mutex<UsageStats>>,
    config: Option<Arc<RunConfig>>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    /// Creates a root context with no caller state.
    pub fn new() -> Self {
        Self {
            user: None,
            trace_id: uuid::Uuid::new_v4().to_string(),
            depth: 0,
            cancel: CancellationToken::new(),
            tool_calls: Arc::new(AtomicUsize::new(0)),
            usage: Arc::new(Mutex::new(UsageStats::new())),
            config: None,
        }
    }

    /// Creates a root context carrying caller-supplied state.
    pub fn with_state<T: Any + Send + Sync>(state: T) -> Self {
        Self::new().with_shared_state(Arc::new(state))
    }

    /// Attaches already-shared caller state.
    pub fn with_shared_state(mut self, state: Arc<dyn Any + Send + Sync>) -> Self {
        self.user = Some(state);
        self
    }

    /// Uses the given token for cancellation instead of a fresh one.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the caller state if it is of type `T`.
    pub fn state<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.user.as_deref().and_then(|s| s.downcast_ref::<T>())
    }

    /// Identifier shared by every run in the tree.
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Nesting depth: 0 for the root run, +1 per agent-as-tool level.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancels this run and every nested run spawned from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Root scope for a new top-level run: keeps the caller state and
    /// cancellation token, starts a new trace with its own tool-call budget
    /// and usage.
    pub(crate) fn for_new_run(&self) -> Self {
        Self {
            user: self.user.clone(),
            cancel: self.cancel.clone(),
            ..Self::new()
        }
    }

    /// Context for a run nested one level below this one.
    pub fn nested(&self) -> Self {
        Self {
            user: self.user.clone(),
            trace_id: self.trace_id.clone(),
            depth: self.depth + 1,
            cancel: self.cancel.child_token(),
            tool_calls: self.tool_calls.clone(),
            usage: self.usage.clone(),
            config: self.config.clone(),
        }
    }

    /// Same run, one agent further down a handoff chain.
    pub(crate) fn handed_off(&self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self.clone()
        }
    }

    pub(crate) fn with_run_config(mut self, config: Arc<RunConfig>) -> Self {
        self.config = Some(config);
        self
    }

    /// Limits and provider of the run this context belongs to.
    pub(crate) fn run_config(&self) -> Arc<RunConfig> {
        self.config.clone().unwrap_or_default()
    }

    /// Tool calls consumed so far by the whole run tree.
    pub fn tool_calls_used(&self) -> usize {
        self.tool_calls.load(Ordering::SeqCst)
    }

    /// Reserves `count` tool calls against the shared budget.
    pub(crate) fn reserve_tool_calls(&self, count: usize, max: Option<usize>) -> Result<()> {
        let before = self.tool_calls.fetch_add(count, Ordering::SeqCst);
        match max {
            Some(max_tool_calls) if before + count > max_tool_calls => {
                Err(AgentsError::ToolCallBudgetExceeded { max_tool_calls })
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn record_usage(&self, model: &str, agent: &str, usage: Usage) {
        if let Ok(mut stats) = self.usage.lock() {
            stats.record(model, agent, usage);
        }
    }

    /// Snapshot of the usage recorded by the whole run tree.
    pub fn usage(&self) -> UsageStats {
        self.usage
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("trace_id", &self.trace_id)
            .field("depth", &self.depth)
            .field("has_state", &self.user.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .field("tool_calls", &self.tool_calls_used())
            .finish()
    }
}
