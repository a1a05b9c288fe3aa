//! # Token usage accounting
//!
//! Every backend call reports a [`Usage`]. The runner records it into the
//! run tree's shared [`UsageStats`], so an orchestrator's result also
//! accounts for the tokens its agent tools spent in nested runs.
//!
//! ```rust
//! use agents_router::usage::{Usage, UsageStats};
//!
//! let mut stats = UsageStats::new();
//! stats.record("gpt-4.1", "Orchestrator Agent", Usage::new(1200, 300));
//! stats.record("gpt-4.1-mini", "Web Search Agent", Usage::new(500, 150));
//!
//! assert_eq!(stats.total.total_tokens, 2150);
//! assert_eq!(stats.total.request_count, 2);
//! ```

use std::collections::BTreeMap;
use std::ops::Add;

use serde::{Deserialize, Serialize};

/// Token usage for one or more backend calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
    /// Number of backend requests folded into this value.
    pub request_count: usize,
}

impl Usage {
    /// Usage of a single request.
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            request_count: 1,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn add_usage(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.request_count += other.request_count;
    }
}

impl Add for Usage {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self.add_usage(&other);
        self
    }
}

/// Usage aggregated across a run tree, broken down by model and by agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageStats {
    pub total: Usage,
    pub by_model: BTreeMap<String, Usage>,
    pub by_agent: BTreeMap<String, Usage>,
}

impl UsageStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, model: &str, agent: &str, usage: Usage) {
        self.total.add_usage(&usage);
        self.by_model
            .entry(model.to_string())
            .or_default()
            .add_usage(&usage);
        self.by_agent
            .entry(agent.to_string())
            .or_default()
            .add_usage(&usage);
    }

    /// Human-readable report, one line per agent.
    pub fn summary(&self) -> String {
        let mut report = format!(
            "Usage: {} tokens over {} requests\n",
            self.total.total_tokens, self.total.request_count
        );
        for (agent, usage) in &self.by_agent {
            report.push_str(&format!(
                "  {}: {} tokens, {} requests\n",
                agent, usage.total_tokens, usage.request_count
            ));
        }
        report
    }
}
