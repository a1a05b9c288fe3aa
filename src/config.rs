//! Configuration defaults for runs
//!
//! [`SdkConfig`] holds the process-wide defaults a [`RunConfig`] starts from.
//! It can be built in code with [`ConfigBuilder`], deserialized with serde,
//! or read from `AGENTS_*` environment variables.
//!
//! [`RunConfig`]: crate::runner::RunConfig

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AgentsError, Result};

/// Model used by agents that do not name one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default per-run turn limit.
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Default limit on nested runs plus handoffs below the root.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Global defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdkConfig {
    /// Default model to use
    pub default_model: String,

    pub max_turns: usize,

    pub max_depth: usize,

    /// Tool calls allowed across a whole run tree; unlimited when `None`
    pub max_tool_calls: Option<usize>,

    /// Timeout for a single backend call
    pub model_timeout: Option<Duration>,

    /// Timeout for a single tool call
    pub tool_timeout: Option<Duration>,

    /// Run the tool calls of one turn concurrently
    pub parallel_tools: bool,

    pub max_concurrency: Option<usize>,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
            max_depth: DEFAULT_MAX_DEPTH,
            max_tool_calls: None,
            model_timeout: Some(Duration::from_secs(60)),
            tool_timeout: Some(Duration::from_secs(30)),
            parallel_tools: true,
            max_concurrency: None,
        }
    }
}

impl SdkConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads `AGENTS_DEFAULT_MODEL`, `AGENTS_MAX_TURNS`, `AGENTS_MAX_DEPTH`,
    /// `AGENTS_MAX_TOOL_CALLS`, `AGENTS_MODEL_TIMEOUT_SECS` and
    /// `AGENTS_TOOL_TIMEOUT_SECS`. Unset or unparsable values keep their
    /// defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let number = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(model) = lookup("AGENTS_DEFAULT_MODEL").filter(|m| !m.trim().is_empty()) {
            config.default_model = model;
        }
        if let Some(turns) = number("AGENTS_MAX_TURNS") {
            config.max_turns = turns as usize;
        }
        if let Some(depth) = number("AGENTS_MAX_DEPTH") {
            config.max_depth = depth as usize;
        }
        if let Some(calls) = number("AGENTS_MAX_TOOL_CALLS") {
            config.max_tool_calls = Some(calls as usize);
        }
        if let Some(secs) = number("AGENTS_MODEL_TIMEOUT_SECS") {
            config.model_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = number("AGENTS_TOOL_TIMEOUT_SECS") {
            config.tool_timeout = Some(Duration::from_secs(secs));
        }
        config
    }
}

/// Configuration builder
pub struct ConfigBuilder {
    config: SdkConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SdkConfig::default(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.default_model = model.into();
        self
    }

    pub fn max_turns(mut self, turns: usize) -> Self {
        self.config.max_turns = turns;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn max_tool_calls(mut self, calls: usize) -> Self {
        self.config.max_tool_calls = Some(calls);
        self
    }

    pub fn model_timeout(mut self, timeout: Duration) -> Self {
        self.config.model_timeout = Some(timeout);
        self
    }

    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.config.tool_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> SdkConfig {
        self.config
    }
}

/// Reads a secret the process cannot run without.
pub fn required_env(name: &str) -> Result<String> {
    required_from(name, std::env::var(name).ok())
}

fn required_from(name: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AgentsError::configuration(format!(
            "Missing required environment variable: {name}. Create a .env file in your \
             project root with this key, or set it in your shell."
        ))),
    }
}
