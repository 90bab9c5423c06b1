//! Conversation message types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form key/value bag attached to sessions and messages
pub type Attributes = Map<String, Value>;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    ToolResult,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::ToolResult => "tool_result",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool invocation requested by an assistant turn
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

    /// Build a call with a generated id
    pub fn generated(name: impl Into<String>, arguments: Value) -> Self {
        Self::new(format!("call_{}", uuid::Uuid::new_v4().simple()), name, arguments)
    }
}

/// A single conversation turn.
///
/// Messages are immutable once created; the `with_*` helpers return new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        attributes: Attributes,
    },
    User {
        content: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        attributes: Attributes,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        attributes: Attributes,
    },
    ToolResult {
        content: String,
        tool_call_id: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        attributes: Attributes,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
            attributes: Attributes::new(),
        }
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls,
            attributes: Attributes::new(),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::ToolResult {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
            attributes: Attributes::new(),
        }
    }

    /// Return a copy of this message carrying `attributes`
    #[must_use]
    pub fn with_attributes(mut self, extra: Attributes) -> Self {
        let target = match &mut self {
            Message::System { attributes, .. }
            | Message::User { attributes, .. }
            | Message::Assistant { attributes, .. }
            | Message::ToolResult { attributes, .. } => attributes,
        };
        target.extend(extra);
        self
    }

    pub fn role(&self) -> Role {
        match self {
            Message::System { .. } => Role::System,
            Message::User { .. } => Role::User,
            Message::Assistant { .. } => Role::Assistant,
            Message::ToolResult { .. } => Role::ToolResult,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::System { content, .. }
            | Message::User { content, .. }
            | Message::Assistant { content, .. }
            | Message::ToolResult { content, .. } => content,
        }
    }

    pub fn attributes(&self) -> &Attributes {
        match self {
            Message::System { attributes, .. }
            | Message::User { attributes, .. }
            | Message::Assistant { attributes, .. }
            | Message::ToolResult { attributes, .. } => attributes,
        }
    }

    /// Tool calls carried by an assistant message (empty for other roles)
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Message::ToolResult { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }
}
