//! Immutable conversation state
//!
//! A `Session` is an append-only transcript plus an attribute bag. Every
//! update returns a new value; the receiver and its message buffer are never
//! touched, so a session observed by one branch can be shared freely with
//! concurrently running branches.

mod message;

pub use message::{Attributes, Message, Role, ToolCall};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Immutable conversation state: ordered messages and attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    messages: Arc<[Message]>,
    attributes: Arc<Attributes>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Empty session
    pub fn new() -> Self {
        Self {
            messages: Arc::from(Vec::new()),
            attributes: Arc::new(Attributes::new()),
        }
    }

    /// Empty transcript with seed attributes
    pub fn with_attributes(attributes: Attributes) -> Self {
        Self {
            messages: Arc::from(Vec::new()),
            attributes: Arc::new(attributes),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Latest message with the given role
    pub fn last_of(&self, role: Role) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role() == role)
    }

    /// New session with `message` appended
    #[must_use]
    pub fn add_message(&self, message: Message) -> Self {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.extend_from_slice(&self.messages);
        messages.push(message);
        Self {
            messages: Arc::from(messages),
            attributes: Arc::clone(&self.attributes),
        }
    }

    /// New session with every message of `extra` appended in order
    #[must_use]
    pub fn extend_messages<'a>(&self, extra: impl IntoIterator<Item = &'a Message>) -> Self {
        let mut messages = self.messages.to_vec();
        messages.extend(extra.into_iter().cloned());
        Self {
            messages: Arc::from(messages),
            attributes: Arc::clone(&self.attributes),
        }
    }

    /// New session whose attributes are the shallow merge of the current
    /// map and `partial`. Overlapping keys take the new value; nothing is
    /// removed.
    #[must_use]
    pub fn update_metadata(&self, partial: Attributes) -> Self {
        if partial.is_empty() {
            return self.clone();
        }
        let mut attributes = (*self.attributes).clone();
        attributes.extend(partial);
        Self {
            messages: Arc::clone(&self.messages),
            attributes: Arc::new(attributes),
        }
    }

    /// Convenience for a single-key metadata update
    #[must_use]
    pub fn set_attribute(&self, key: impl Into<String>, value: Value) -> Self {
        let mut partial = Attributes::new();
        partial.insert(key.into(), value);
        self.update_metadata(partial)
    }

    /// Whether both sessions share the same message buffer
    pub fn shares_messages_with(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.messages, &other.messages)
    }
}
