//! OpenAI-compatible provider implementation.
//!
//! Works with SiliconFlow, OpenAI, vLLM, Ollama, and any endpoint exposing
//! OpenAI-style chat completions, embeddings, and rerank.
//!
//! Supports:
//! - Chat completions (one-shot and streaming SSE)
//! - Embeddings
//! - Rerank

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use relayline_config::AppConfig;
use relayline_core::error::ProviderError;
use relayline_core::provider::*;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::sse::{SseDecoder, SseEvent};

/// Connect, read, and whole-request bounds applied to every call.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    /// Longest silence tolerated while waiting for headers or body bytes
    pub read: Duration,
    /// Whole-call bound for one-shot requests
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            read: Duration::from_secs(60),
            request: Duration::from_secs(120),
        }
    }
}

/// A secondary endpoint (embeddings or rerank).
#[derive(Debug, Clone)]
struct Endpoint {
    url: String,
    model: String,
    api_key: Option<String>,
}

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    chat_url: String,
    api_key: Option<String>,
    embedding: Option<Endpoint>,
    rerank: Option<Endpoint>,
    timeouts: Timeouts,
    channel_capacity: usize,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a provider posting chat completions to `chat_url`.
    pub fn new(
        name: impl Into<String>,
        chat_url: impl Into<String>,
        api_key: Option<String>,
        timeouts: Timeouts,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            chat_url: chat_url.into(),
            api_key,
            embedding: None,
            rerank: None,
            timeouts,
            channel_capacity: 64,
            client,
        })
    }

    /// Build the chat, embedding, and rerank endpoints from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let chat = &config.chat;
        let timeouts = Timeouts {
            connect: chat.connect_timeout(),
            read: chat.read_timeout(),
            request: chat.request_timeout(),
        };
        let provider = Self::new("openai-compat", chat.endpoint(), chat.api_key.clone(), timeouts)?
            .with_embedding(
                config.embedding.endpoint(chat),
                config.embedding.model.clone(),
                config.embedding.resolved_api_key(chat).map(String::from),
            )
            .with_rerank(
                config.rerank.endpoint(chat),
                config.rerank.model.clone(),
                config.rerank.resolved_api_key(chat).map(String::from),
            );
        Ok(provider)
    }

    pub fn with_embedding(
        mut self,
        url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        self.embedding = Some(Endpoint {
            url: url.into(),
            model: model.into(),
            api_key,
        });
        self
    }

    pub fn with_rerank(
        mut self,
        url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        self.rerank = Some(Endpoint {
            url: url.into(),
            model: model.into(),
            api_key,
        });
        self
    }

    fn post(&self, url: &str, api_key: Option<&str>) -> reqwest::RequestBuilder {
        let builder = self.client.post(url).header("Content-Type", "application/json");
        match api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Send a one-shot JSON request and decode the successful body.
    async fn post_json<B, R>(&self, url: &str, api_key: Option<&str>, body: &B) -> Result<R, ProviderError>
    where
        B: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let response = self
            .post(url, api_key)
            .timeout(self.timeouts.request)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_status(response).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Parse(format!("Failed to parse response: {e}"))
            })
    }
}

#[async_trait]
impl relayline_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let request = request.streaming(false);
        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let api_response: ApiResponse = self
            .post_json(&self.chat_url, self.api_key.as_deref(), &request)
            .await?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("No choices in response".into()))?;

        Ok(ProviderResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason,
            usage: api_response.usage.map(Usage::from),
            model: api_response.model.unwrap_or(request.model),
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let request = request.streaming(true);
        let prompt = request.user_text().to_string();
        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let send = self
            .post(&self.chat_url, self.api_key.as_deref())
            .header("Accept", "text/event-stream")
            .json(&request)
            .send();
        let response = tokio::time::timeout(self.timeouts.read, send)
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!(
                    "no response headers within {:?}",
                    self.timeouts.read
                ))
            })?
            .map_err(map_transport_error)?;
        let response = check_status(response).await?;

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let provider_name = self.name.clone();
        let read_timeout = self.timeouts.read;

        // Read the body on its own task; the response (and its connection)
        // is dropped on every return path.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::new();
            let mut collected = String::new();

            loop {
                let next = tokio::select! {
                    _ = tx.closed() => {
                        debug!(provider = %provider_name, "Stream receiver dropped, closing upstream");
                        return;
                    }
                    next = tokio::time::timeout(read_timeout, byte_stream.next()) => next,
                };

                let body_ended = matches!(next, Ok(None));
                let events = match next {
                    Err(_) => {
                        warn!(provider = %provider_name, timeout = ?read_timeout, "Stream read timed out");
                        let _ = tx
                            .send(Err(ProviderError::Timeout(format!(
                                "no data for {read_timeout:?}"
                            ))))
                            .await;
                        return;
                    }
                    Ok(Some(Err(e))) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                    Ok(Some(Ok(bytes))) => decoder.feed(&bytes),
                    Ok(None) => decoder.finish(),
                };

                let events = match events {
                    Ok(events) => events,
                    Err(e) => {
                        warn!(provider = %provider_name, error = %e, "Unparseable SSE payload");
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };

                for event in events {
                    let terminal = match event {
                        SseEvent::Delta(content) => {
                            trace!(provider = %provider_name, len = content.len(), "Content delta");
                            collected.push_str(&content);
                            if tx.send(Ok(StreamChunk::delta(content))).await.is_err() {
                                return; // receiver dropped
                            }
                            continue;
                        }
                        SseEvent::Finish { reason, total_tokens } => {
                            let usage = match total_tokens {
                                Some(total) => Usage {
                                    prompt_tokens: 0,
                                    completion_tokens: 0,
                                    total_tokens: total,
                                },
                                None => Usage::estimated(&prompt, &collected),
                            };
                            StreamChunk::finish(reason, usage)
                        }
                        SseEvent::Done => StreamChunk::finish("stop", Usage::estimated(&prompt, &collected)),
                    };
                    let _ = tx.send(Ok(terminal)).await;
                    return;
                }

                if body_ended {
                    let _ = tx
                        .send(Err(ProviderError::StreamInterrupted(
                            "body ended without finish_reason or [DONE]".into(),
                        )))
                        .await;
                    return;
                }
            }
        });

        Ok(rx)
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let endpoint = self.embedding.as_ref().ok_or_else(|| {
            ProviderError::NotConfigured(format!("Provider '{}' has no embedding endpoint", self.name))
        })?;
        let model = request.model.unwrap_or_else(|| endpoint.model.clone());
        let body = serde_json::json!({
            "model": model,
            "input": request.inputs,
        });

        debug!(
            provider = %self.name,
            model = %model,
            count = request.inputs.len(),
            "Sending embedding request"
        );

        let api_resp: EmbeddingApiResponse = self
            .post_json(&endpoint.url, endpoint.api_key.as_deref(), &body)
            .await?;

        Ok(EmbeddingResponse {
            embeddings: api_resp.data.into_iter().map(|d| d.embedding).collect(),
            model: api_resp.model.unwrap_or(model),
            usage: api_resp.usage.map(Usage::from),
        })
    }

    async fn rerank(&self, request: RerankRequest) -> Result<Vec<RerankResult>, ProviderError> {
        let endpoint = self.rerank.as_ref().ok_or_else(|| {
            ProviderError::NotConfigured(format!("Provider '{}' has no rerank endpoint", self.name))
        })?;
        let model = request.model.unwrap_or_else(|| endpoint.model.clone());
        let body = serde_json::json!({
            "model": model,
            "query": request.query,
            "documents": request.documents,
            "top_n": request.top_n,
        });

        debug!(
            provider = %self.name,
            model = %model,
            documents = request.documents.len(),
            "Sending rerank request"
        );

        let api_resp: RerankApiResponse = self
            .post_json(&endpoint.url, endpoint.api_key.as_deref(), &body)
            .await?;

        let mut results: Vec<RerankResult> = api_resp
            .results
            .into_iter()
            .filter(|r| r.index < request.documents.len())
            .map(|r| RerankResult { index: r.index, score: r.score })
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(request.top_n);
        Ok(results)
    }
}

/// Map a non-2xx status to the provider error taxonomy.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let code = status.as_u16();

    if code == 429 {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(5);
        return Err(ProviderError::RateLimited { retry_after_secs });
    }

    if code == 401 || code == 403 {
        return Err(ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ));
    }

    let error_body = response.text().await.unwrap_or_default();
    warn!(status = code, body = %error_body, "Provider returned error");
    Err(ProviderError::ApiError {
        status_code: code,
        message: error_body,
    })
}

fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else if e.is_connect() {
        ProviderError::Network(format!("connection failed: {e}"))
    } else {
        ProviderError::Network(e.to_string())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

// --- Embedding API types ---

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

// --- Rerank API types ---

#[derive(Debug, Deserialize)]
struct RerankApiResponse {
    #[serde(alias = "data")]
    results: Vec<RerankApiResult>,
}

#[derive(Debug, Deserialize)]
struct RerankApiResult {
    index: usize,
    #[serde(alias = "relevance_score")]
    score: f32,
}
