//! Provider trait: The abstraction over the upstream model endpoint.
//!
//! A Provider knows how to send a conversation to an LLM and get a response
//! back, either as a complete message or as a stream of content deltas.
//! It also serves embedding and rerank calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::{Message, Role, estimate_tokens};
use crate::request::ChatRequest;

/// Sampling defaults applied when a request leaves a field unset.
#[derive(Debug, Clone)]
pub struct SamplingDefaults {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub model: String,

    /// System prompt first, then history and context, then the user turn
    pub messages: Vec<Message>,

    /// Maximum tokens to generate (always > 0)
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    #[serde(default)]
    pub stream: bool,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    /// Build the upstream request for a chat turn.
    pub fn from_chat(request: &ChatRequest, defaults: &SamplingDefaults) -> Self {
        let mut messages = Vec::with_capacity(request.messages.len() + 2);
        if let Some(system) = request.system_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
            messages.push(Message::system(system));
        }
        messages.extend(request.messages.iter().cloned());
        messages.push(Message::user(request.message.clone()));

        Self {
            model: request.model.clone().unwrap_or_else(|| defaults.model.clone()),
            messages,
            max_tokens: request.max_tokens.filter(|n| *n > 0).unwrap_or(defaults.max_tokens),
            temperature: request.temperature.unwrap_or(defaults.temperature),
            top_p: request.top_p,
            frequency_penalty: request.frequency_penalty,
            presence_penalty: request.presence_penalty,
            stream: request.stream,
        }
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// The final user turn. Token estimates count this and the answer only,
    /// never the system prompt, history or knowledge context.
    pub fn user_text(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Usage derived from text length when the provider reports none.
    pub fn estimated(prompt: &str, completion: &str) -> Self {
        let prompt_tokens = estimate_tokens(prompt, "");
        let completion_tokens = estimate_tokens("", completion);
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: estimate_tokens(prompt, completion),
        }
    }
}

/// A single chunk in a streaming response.
///
/// Content chunks carry `content`; the final chunk has `done == true`, a
/// finish reason, and usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub done: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    pub fn delta(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            done: false,
            finish_reason: None,
            usage: None,
        }
    }

    pub fn finish(reason: impl Into<String>, usage: Usage) -> Self {
        Self {
            content: None,
            done: true,
            finish_reason: Some(reason.into()),
            usage: Some(usage),
        }
    }
}

/// Receiving half of a streaming call. Dropping it cancels the call.
pub type ChunkReceiver = mpsc::Receiver<Result<StreamChunk, ProviderError>>;

/// An embedding request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Model override; the provider's configured embedding model otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// The texts to embed.
    pub inputs: Vec<String>,
}

/// An embedding response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The embedding vectors, one per input text.
    pub embeddings: Vec<Vec<f32>>,

    /// Which model was used.
    pub model: String,

    /// Token usage.
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub query: String,
    pub documents: Vec<String>,
    pub top_n: usize,
}

/// One scored document, `index` pointing into the request's `documents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankResult {
    pub index: usize,
    pub score: f32,
}

/// The core Provider trait.
///
/// The multiplexer and the ReAct engine call `stream()` or `complete()`
/// without knowing which endpoint is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider.
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of response chunks.
    ///
    /// Default implementation calls `complete()` and wraps the result as a
    /// content chunk followed by the final chunk.
    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let prompt = request.user_text().to_string();
        let response = self.complete(request).await?;
        let (tx, rx) = mpsc::channel(2);
        let usage = response
            .usage
            .unwrap_or_else(|| Usage::estimated(&prompt, &response.content));
        let reason = response.finish_reason.unwrap_or_else(|| "stop".to_string());
        if !response.content.is_empty() {
            let _ = tx.send(Ok(StreamChunk::delta(response.content))).await;
        }
        let _ = tx.send(Ok(StreamChunk::finish(reason, usage))).await;
        Ok(rx)
    }

    /// Generate embeddings for the given texts.
    async fn embed(&self, _request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        Err(ProviderError::NotConfigured(format!(
            "Provider '{}' does not support embeddings",
            self.name()
        )))
    }

    /// Score documents against a query, best first.
    async fn rerank(&self, _request: RerankRequest) -> Result<Vec<RerankResult>, ProviderError> {
        Err(ProviderError::NotConfigured(format!(
            "Provider '{}' does not support rerank",
            self.name()
        )))
    }
}
