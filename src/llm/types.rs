//! Request/response types for the generation collaborator

use crate::session::{Message, Session, ToolCall};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tool definition offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Tool-choice policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
    Tool(String),
}

/// Options forwarded to the generation collaborator.
///
/// Everything is optional; providers apply their own defaults.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub provider: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub tool_choice: ToolChoice,
    /// Provider-specific passthrough options
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl std::fmt::Debug for GenerationOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationOptions")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("top_k", &self.top_k)
            .field("max_tokens", &self.max_tokens)
            .field("tools", &self.tools.len())
            .field("tool_choice", &self.tool_choice)
            .field("extra", &self.extra)
            .finish()
    }
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    #[must_use]
    pub fn top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    #[must_use]
    pub fn tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    #[must_use]
    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }

    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Generation request assembled from a session
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// System messages, in transcript order
    pub system: Vec<String>,
    /// Every non-system turn, in transcript order
    pub messages: Vec<Message>,
    pub options: GenerationOptions,
}

impl LlmRequest {
    pub fn from_session(session: &Session, options: &GenerationOptions) -> Self {
        let (system, messages): (Vec<&Message>, Vec<&Message>) = session
            .messages()
            .iter()
            .partition(|m| matches!(m, Message::System { .. }));

        Self {
            system: system.into_iter().map(|m| m.content().to_string()).collect(),
            messages: messages.into_iter().cloned().collect(),
            options: options.clone(),
        }
    }
}

/// Content block in a model response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
}

impl ContentBlock {
    pub fn text(s: impl Into<String>) -> Self {
        ContentBlock::Text { text: s.into() }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// Model response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub end_turn: bool,
    pub usage: Usage,
}

impl LlmResponse {
    /// Plain text response, used by scripted services
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            end_turn: true,
            usage: Usage::default(),
        }
    }

    /// Concatenated text blocks
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::ToolUse { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool use blocks converted into session tool calls
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some(ToolCall::new(id.clone(), name.clone(), input.clone()))
                }
                ContentBlock::Text { .. } => None,
            })
            .collect()
    }

    pub fn has_tool_use(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse { .. }))
    }
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn is_zero(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0
    }

    #[must_use]
    pub fn combine(self, other: Usage) -> Usage {
        Usage {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_splits_system_messages() {
        let session = Session::new()
            .add_message(Message::system("one"))
            .add_message(Message::user("hi"))
            .add_message(Message::system("two"))
            .add_message(Message::assistant("hello"));

        let request = LlmRequest::from_session(&session, &GenerationOptions::new().model("m"));
        assert_eq!(request.system, vec!["one".to_string(), "two".to_string()]);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.options.model.as_deref(), Some("m"));
    }

    #[test]
    fn response_helpers() {
        let response = LlmResponse {
            content: vec![
                ContentBlock::text("a"),
                ContentBlock::tool_use("t1", "lookup", json!({ "q": 1 })),
                ContentBlock::text("b"),
            ],
            end_turn: false,
            usage: Usage::default(),
        };
        assert_eq!(response.joined_text(), "ab");
        assert!(response.has_tool_use());
        assert_eq!(response.tool_calls()[0].name, "lookup");
    }

    #[test]
    fn debug_redacts_api_key() {
        let options = GenerationOptions::new().api_key("sk-secret").temperature(0.2);
        let rendered = format!("{options:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
