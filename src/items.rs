//! Items representing messages, tool calls, model responses and transcript entries
//!
//! This module defines the core data structures for agent communication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::with_role(Role::Assistant, content)
        }
    }

    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(Role::Tool, content)
        }
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Response from the reasoning backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub id: String,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ModelResponse {
    pub fn new_message(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: Some(content.into()),
            tool_calls: vec![],
            finish_reason: Some("stop".to_string()),
            created_at: Utc::now(),
        }
    }

    pub fn new_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: None,
            tool_calls,
            finish_reason: Some("tool_calls".to_string()),
            created_at: Utc::now(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// A single transcript entry recorded while the runner drives a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunItem {
    Message(MessageItem),
    ToolCall(ToolCallItem),
    ToolOutput(ToolOutputItem),
    Handoff(HandoffItem),
}

impl RunItem {
    /// The agent that was active when this entry was recorded.
    pub fn agent(&self) -> &str {
        match self {
            RunItem::Message(m) => &m.agent,
            RunItem::ToolCall(c) => &c.agent,
            RunItem::ToolOutput(o) => &o.agent,
            RunItem::Handoff(h) => &h.from_agent,
        }
    }

    pub(crate) fn assistant_message(agent: &str, content: impl Into<String>) -> Self {
        RunItem::Message(MessageItem {
            id: Uuid::new_v4().to_string(),
            agent: agent.to_string(),
            role: Role::Assistant,
            content: content.into(),
            created_at: Utc::now(),
        })
    }

    pub(crate) fn tool_call(agent: &str, call: &ToolCall) -> Self {
        RunItem::ToolCall(ToolCallItem {
            id: call.id.clone(),
            agent: agent.to_string(),
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
            created_at: Utc::now(),
        })
    }

    pub(crate) fn tool_output(
        agent: &str,
        tool_call_id: &str,
        output: impl Into<String>,
        error: Option<String>,
    ) -> Self {
        RunItem::ToolOutput(ToolOutputItem {
            id: Uuid::new_v4().to_string(),
            agent: agent.to_string(),
            tool_call_id: tool_call_id.to_string(),
            output: output.into(),
            error,
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageItem {
    pub id: String,
    pub agent: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallItem {
    /// The tool-call identifier assigned by the backend.
    pub id: String,
    pub agent: String,
    pub tool_name: String,
    pub arguments: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutputItem {
    pub id: String,
    pub agent: String,
    pub tool_call_id: String,
    /// The observation fed back to the model.
    pub output: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffItem {
    pub id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}
