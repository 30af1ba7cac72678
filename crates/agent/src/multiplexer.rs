//! Streaming response multiplexer: the per-request orchestrator.
//!
//! [`StreamMultiplexer::start`] validates a request, spawns one task for it
//! and hands back the receiving half of a bounded channel. The task runs
//! optional knowledge augmentation, then either passes the provider's stream
//! through or frames a ReAct run:
//!
//! ```text
//! [THINKING_START] → raw turn … → [THINKING_END] → [ANSWER_START]
//!   → answer sentences … → terminal
//! ```
//!
//! Whatever happens inside the pipeline, including a panic, the caller gets
//! exactly one terminal event, and it is always last. Dropping the receiver
//! cancels the request.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use relayline_config::{AppConfig, ReasoningConfig, StreamingConfig};
use relayline_core::error::{Error, Result};
use relayline_core::event::{ANSWER_START, FINISH_ERROR, FINISH_STOP, StreamEvent, THINKING_END, THINKING_START};
use relayline_core::knowledge::KnowledgeSearch;
use relayline_core::message::estimate_tokens;
use relayline_core::provider::{Provider, ProviderRequest, SamplingDefaults};
use relayline_core::request::ChatRequest;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use crate::catalog::{AgentCatalog, AgentDefinition};
use crate::emitter::{Cancelled, EventEmitter};
use crate::knowledge::{KnowledgeAugmenter, citation_footer};
use crate::react::ReactEngine;

/// How the pipeline ended, before the terminal event is sent.
struct Completion {
    finish_reason: String,
    token_usage: u32,
}

impl Completion {
    fn stop(token_usage: u32) -> Self {
        Self {
            finish_reason: FINISH_STOP.to_string(),
            token_usage,
        }
    }

    fn error(token_usage: u32) -> Self {
        Self {
            finish_reason: FINISH_ERROR.to_string(),
            token_usage,
        }
    }
}

/// Random delay between answer chunks.
#[derive(Debug, Clone, Copy)]
struct Pacing {
    min_ms: u64,
    max_ms: u64,
}

impl Pacing {
    fn from_config(streaming: &StreamingConfig) -> Option<Self> {
        streaming.pacing_enabled.then_some(Self {
            min_ms: streaming.pacing_min_ms,
            max_ms: streaming.pacing_max_ms.max(streaming.pacing_min_ms),
        })
    }

    async fn pause(&self) {
        let ms = rand::rng().random_range(self.min_ms..=self.max_ms);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

pub struct StreamMultiplexer {
    pipeline: Pipeline,
    channel_capacity: usize,
}

/// Everything a request task needs. Cloned into each task; the heavy parts
/// are behind `Arc`.
#[derive(Clone)]
struct Pipeline {
    provider: Arc<dyn Provider>,
    catalog: Arc<AgentCatalog>,
    augmenter: Option<Arc<KnowledgeAugmenter>>,
    defaults: SamplingDefaults,
    reasoning: ReasoningConfig,
    pacing: Option<Pacing>,
}

impl StreamMultiplexer {
    /// Multiplexer over `provider` with the built-in agents and no knowledge
    /// search.
    pub fn new(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        Self {
            pipeline: Pipeline {
                provider,
                catalog: Arc::new(AgentCatalog::builtin()),
                augmenter: None,
                defaults: config.chat.sampling_defaults(),
                reasoning: config.reasoning.clone(),
                pacing: Pacing::from_config(&config.streaming),
            },
            channel_capacity: config.streaming.channel_capacity.max(1),
        }
    }

    /// Attach a knowledge search collaborator, configured by `config.knowledge`.
    pub fn with_knowledge(mut self, search: Arc<dyn KnowledgeSearch>, config: &AppConfig) -> Self {
        self.pipeline.augmenter = Some(Arc::new(KnowledgeAugmenter::new(
            search,
            config.knowledge.clone(),
        )));
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<AgentCatalog>) -> Self {
        self.pipeline.catalog = catalog;
        self
    }

    /// The agent ReAct requests run against.
    pub fn reasoning_agent(&self) -> Option<Arc<AgentDefinition>> {
        self.pipeline.catalog.get(&self.pipeline.reasoning.agent_id)
    }

    /// Validate `request` and start processing it on its own task.
    pub fn start(&self, request: ChatRequest) -> Result<mpsc::Receiver<StreamEvent>> {
        request.validate()?;
        let agent = if request.use_react {
            Some(self.reasoning_agent().ok_or_else(|| Error::Config {
                message: format!("unknown reasoning agent '{}'", self.pipeline.reasoning.agent_id),
            })?)
        } else {
            None
        };

        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.pipeline.defaults.model.clone());
        let stream_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let emitter = EventEmitter::new(tx, stream_id, model);

        info!(
            stream_id = %emitter.stream_id(),
            model = %emitter.model(),
            react = request.use_react,
            "Request started"
        );

        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            let worker_emitter = emitter.clone();
            let message = request.message.clone();
            let worker = tokio::spawn(async move { pipeline.run(request, agent, &worker_emitter).await });

            let completion = match worker.await {
                Ok(Ok(completion)) => completion,
                Ok(Err(Cancelled)) => {
                    debug!(stream_id = %emitter.stream_id(), "Request cancelled by caller");
                    return;
                }
                Err(e) => {
                    error!(stream_id = %emitter.stream_id(), error = %e, "Request pipeline panicked");
                    Completion::error(estimate_tokens(&message, ""))
                }
            };

            if emitter
                .terminal(&completion.finish_reason, completion.token_usage)
                .await
                .is_ok()
            {
                info!(
                    stream_id = %emitter.stream_id(),
                    finish_reason = %completion.finish_reason,
                    token_usage = completion.token_usage,
                    "Request finished"
                );
            }
        });

        Ok(rx)
    }

    /// [`start`](Self::start), wrapped as a `Stream`.
    pub fn stream(&self, request: ChatRequest) -> Result<ReceiverStream<StreamEvent>> {
        self.start(request).map(ReceiverStream::new)
    }
}

impl Pipeline {
    async fn run(
        &self,
        mut request: ChatRequest,
        agent: Option<Arc<AgentDefinition>>,
        emitter: &EventEmitter,
    ) -> std::result::Result<Completion, Cancelled> {
        if let Some(augmenter) = &self.augmenter {
            tokio::select! {
                biased;
                _ = emitter.cancelled() => return Err(Cancelled),
                _ = augmenter.augment(&mut request) => {}
            }
        }

        match agent {
            Some(agent) => self.reason(&request, agent, emitter).await,
            None => self.passthrough(&request, emitter).await,
        }
    }

    async fn passthrough(
        &self,
        request: &ChatRequest,
        emitter: &EventEmitter,
    ) -> std::result::Result<Completion, Cancelled> {
        let upstream = ProviderRequest::from_chat(request, &self.defaults).streaming(true);
        let opened = tokio::select! {
            biased;
            _ = emitter.cancelled() => return Err(Cancelled),
            opened = self.provider.stream(upstream) => opened,
        };
        let mut chunks = match opened {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(stream_id = %emitter.stream_id(), error = %e, "Upstream stream failed to open");
                return Ok(Completion::error(estimate_tokens(&request.message, "")));
            }
        };

        let mut answer = String::new();
        loop {
            // Dropping `chunks` on return closes the upstream connection.
            let item = tokio::select! {
                biased;
                _ = emitter.cancelled() => return Err(Cancelled),
                item = chunks.recv() => item,
            };

            match item {
                Some(Ok(chunk)) if chunk.done => {
                    if request.wants_citation_footer() {
                        emitter.chunk(citation_footer(&request.knowledge_snippets)).await?;
                    }
                    let usage = chunk
                        .usage
                        .map(|u| u.total_tokens)
                        .unwrap_or_else(|| estimate_tokens(&request.message, &answer));
                    return Ok(Completion {
                        finish_reason: chunk.finish_reason.unwrap_or_else(|| FINISH_STOP.to_string()),
                        token_usage: usage,
                    });
                }
                Some(Ok(chunk)) => {
                    if let Some(content) = chunk.content.filter(|c| !c.is_empty()) {
                        answer.push_str(&content);
                        emitter.chunk(content).await?;
                    }
                }
                Some(Err(e)) => {
                    warn!(stream_id = %emitter.stream_id(), error = %e, "Upstream stream failed");
                    return Ok(Completion::error(estimate_tokens(&request.message, &answer)));
                }
                None => {
                    warn!(stream_id = %emitter.stream_id(), "Upstream stream closed without a terminal chunk");
                    return Ok(Completion::error(estimate_tokens(&request.message, &answer)));
                }
            }
        }
    }

    async fn reason(
        &self,
        request: &ChatRequest,
        agent: Arc<AgentDefinition>,
        emitter: &EventEmitter,
    ) -> std::result::Result<Completion, Cancelled> {
        emitter.chunk(THINKING_START).await?;

        let engine = ReactEngine::new(self.provider.clone(), agent, self.defaults.clone())
            .with_max_iterations(self.reasoning.max_iterations);
        let run = engine.run(request, emitter).await?;
        debug!(
            stream_id = %emitter.stream_id(),
            outcome = ?run.outcome,
            iterations = run.iterations,
            "Reasoning finished"
        );

        emitter.chunk(THINKING_END).await?;
        emitter.chunk(ANSWER_START).await?;

        let mut answer = run.answer;
        if request.wants_citation_footer() {
            answer.push_str(&citation_footer(&request.knowledge_snippets));
        }

        for (i, fragment) in split_answer(&answer).into_iter().enumerate() {
            if i > 0 {
                if let Some(pacing) = &self.pacing {
                    pacing.pause().await;
                }
            }
            emitter.chunk(fragment).await?;
        }

        Ok(Completion::stop(estimate_tokens(&request.message, &answer)))
    }
}

/// Split an answer into sentence-sized chunks at `。`, `！`, `？` or newline.
///
/// Every fragment but the last keeps its terminator. Fragments with nothing
/// but whitespace before the terminator are dropped.
pub fn split_answer(answer: &str) -> Vec<String> {
    let mut fragments: Vec<String> = Vec::new();
    let mut current = String::new();

    for ch in answer.chars() {
        if matches!(ch, '。' | '！' | '？' | '\n') {
            if current.trim().is_empty() {
                current.clear();
            } else {
                current.push(ch);
                fragments.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }

    if !current.trim().is_empty() {
        fragments.push(current);
    } else if let Some(last) = fragments.last_mut() {
        // The answer ended on a terminator
        last.pop();
    }
    fragments
}
