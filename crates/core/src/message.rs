//! Chat message value objects.
//!
//! These flow from the caller's history through knowledge augmentation into
//! the provider request body. The serialized form is the provider wire shape
//! (`{"role": "...", "content": "..."}`).

use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions and injected context
    System,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Rough token estimate (4 chars ≈ 1 token), counting Unicode scalar values.
pub fn estimate_tokens(prompt: &str, answer: &str) -> u32 {
    let chars = prompt.chars().count() + answer.chars().count();
    u32::try_from(chars / 4).unwrap_or(u32::MAX)
}
