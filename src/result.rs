//! Result types for agent execution

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::agent::Agent;
use crate::error::{AgentsError, Result};
use crate::items::{HandoffItem, Message, RunItem};
use crate::tool::value_to_text;
use crate::usage::UsageStats;

/// The result of a completed run.
///
/// A rejected or failed run never produces a `RunResult`; it surfaces as an
/// [`AgentsError`] instead.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Text, or the parsed JSON document when the final agent declares an
    /// output schema.
    pub final_output: Value,
    /// Transcript entries in the order they were decided.
    pub items: Vec<RunItem>,
    /// Name of the agent that produced the final output.
    pub final_agent: String,
    pub last_agent: Arc<Agent>,
    /// Usage of the whole run tree, nested runs included.
    pub usage: UsageStats,
    pub trace_id: String,
    /// The messages the run started from.
    pub input: Vec<Message>,
    /// Full conversation history, excluding system messages.
    pub messages: Vec<Message>,
}

impl RunResult {
    /// The final output as text. Structured outputs are rendered as JSON.
    pub fn final_output_text(&self) -> String {
        value_to_text(self.final_output.clone())
    }

    /// Parses the final output into `T`.
    ///
    /// Accepts both a structured output and a text output holding a JSON
    /// document.
    pub fn final_output_as<T: DeserializeOwned>(&self) -> Result<T> {
        let parsed = match &self.final_output {
            Value::String(text) => match serde_json::from_str::<T>(text.trim()) {
                Ok(parsed) => Ok(parsed),
                Err(_) => serde_json::from_value(self.final_output.clone()),
            },
            other => serde_json::from_value(other.clone()),
        };
        parsed.map_err(|e| AgentsError::StructuredOutput {
            message: format!(
                "final output of agent '{}' does not match the expected type: {}",
                self.final_agent, e
            ),
        })
    }

    /// The conversation so far, ready to be extended with a new user
    /// message and submitted as the input of the next run.
    pub fn to_input_list(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Number of tool calls the run executed.
    pub fn tool_call_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, RunItem::ToolCall(_)))
            .count()
    }

    pub fn handoffs(&self) -> Vec<&HandoffItem> {
        self.items
            .iter()
            .filter_map(|item| match item {
                RunItem::Handoff(h) => Some(h),
                _ => None,
            })
            .collect()
    }

    pub fn handoff_count(&self) -> usize {
        self.handoffs().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct HomeworkOutput {
        is_homework: bool,
        reasoning: String,
    }

    fn result(final_output: Value) -> RunResult {
        RunResult {
            final_output,
            items: vec![],
            final_agent: "Guardrail check".into(),
            last_agent: Arc::new(Agent::simple("Guardrail check", "x")),
            usage: UsageStats::new(),
            trace_id: "trace".into(),
            input: vec![Message::user("hi")],
            messages: vec![Message::user("hi"), Message::assistant("hello")],
        }
    }

    #[test]
    fn test_final_output_as_structured() {
        let r = result(json!({"is_homework": true, "reasoning": "algebra"}));
        let out: HomeworkOutput = r.final_output_as().unwrap();
        assert!(out.is_homework);
        assert_eq!(r.final_output_text(), r#"{"is_homework":true,"reasoning":"algebra"}"#);
    }

    #[test]
    fn test_final_output_as_from_text() {
        let r = result(json!(r#"{"is_homework": false, "reasoning": "trivia"}"#));
        let out: HomeworkOutput = r.final_output_as().unwrap();
        assert_eq!(
            out,
            HomeworkOutput {
                is_homework: false,
                reasoning: "trivia".into()
            }
        );
        let plain: String = r.final_output_as().unwrap();
        assert!(plain.contains("trivia"));
    }

    #[test]
    fn test_final_output_as_mismatch() {
        let r = result(json!("The capital of France is Paris"));
        let err = r.final_output_as::<HomeworkOutput>().unwrap_err();
        assert!(matches!(err, AgentsError::StructuredOutput { .. }));
    }

    #[test]
    fn test_to_input_list_continues_history() {
        let r = result(json!("hello"));
        let mut next = r.to_input_list();
        next.push(Message::user("and again"));
        assert_eq!(next.len(), 3);
        assert_eq!(r.tool_call_count(), 0);
        assert_eq!(r.handoff_count(), 0);
    }
}
