//! Outbound stream events and the literal framing markers.
//!
//! Every request produces an ordered sequence of [`StreamEvent`]s ending in
//! exactly one terminal event (`finished == true`).

use serde::{Deserialize, Serialize};

/// Marks the start of the user-visible reasoning phase.
pub const THINKING_START: &str = "[THINKING_START]";
/// Marks the end of the reasoning phase.
pub const THINKING_END: &str = "[THINKING_END]";
/// Marks the start of the final answer.
pub const ANSWER_START: &str = "[ANSWER_START]";

pub const FINISH_STOP: &str = "stop";
pub const FINISH_ERROR: &str = "error";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEvent {
    pub stream_id: String,

    #[serde(rename = "modelType")]
    pub model: String,

    pub content: String,

    pub finished: bool,

    /// Present only when `finished`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    /// Present only on the terminal event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<u32>,
}

impl StreamEvent {
    /// A non-terminal content fragment.
    pub fn chunk(stream_id: &str, model: &str, content: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.to_string(),
            model: model.to_string(),
            content: content.into(),
            finished: false,
            finish_reason: None,
            token_usage: None,
        }
    }

    /// The terminal event: empty content, finish reason and usage attached.
    pub fn terminal(stream_id: &str, model: &str, finish_reason: &str, token_usage: u32) -> Self {
        Self {
            stream_id: stream_id.to_string(),
            model: model.to_string(),
            content: String::new(),
            finished: true,
            finish_reason: Some(finish_reason.to_string()),
            token_usage: Some(token_usage),
        }
    }

    pub fn is_marker(&self) -> bool {
        matches!(self.content.as_str(), THINKING_START | THINKING_END | ANSWER_START)
    }
}
