//! Shared test doubles for the agent crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use relayline_core::error::{KnowledgeError, ProviderError};
use relayline_core::knowledge::{KnowledgeHit, KnowledgeQuery, KnowledgeSearch, KnowledgeSearchResponse};
use relayline_core::provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
use tokio::sync::mpsc;

/// One scripted reply to `complete`.
pub enum Reply {
    Text(String),
    Fail(ProviderError),
    /// Never resolves; used to exercise cancellation.
    Hang,
}

/// A provider that answers `complete` from a script and `stream` from a
/// fixed list of stream items. Panics when the script runs out.
///
/// A held-open stream keeps its sender alive after the last item and records
/// when the consumer drops the receiver.
pub struct ScriptedProvider {
    replies: Mutex<Vec<Reply>>,
    stream_items: Mutex<Option<Vec<Result<StreamChunk, ProviderError>>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    hold_open: bool,
    upstream_closed: Arc<AtomicBool>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Self {
        let mut replies = replies;
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            stream_items: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            hold_open: false,
            upstream_closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Reply::Text(t.to_string())).collect())
    }

    pub fn streaming(items: Vec<Result<StreamChunk, ProviderError>>) -> Self {
        let provider = Self::new(Vec::new());
        *provider.stream_items.lock().unwrap() = Some(items);
        provider
    }

    pub fn held_open(items: Vec<Result<StreamChunk, ProviderError>>) -> Self {
        Self {
            hold_open: true,
            ..Self::streaming(items)
        }
    }

    pub fn upstream_closed(&self) -> bool {
        self.upstream_closed.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop()
            .expect("ScriptedProvider: script exhausted");
        match reply {
            Reply::Text(content) => Ok(ProviderResponse {
                content,
                finish_reason: Some("stop".into()),
                usage: None,
                model,
            }),
            Reply::Fail(err) => Err(err),
            Reply::Hang => std::future::pending().await,
        }
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let items = self
            .stream_items
            .lock()
            .unwrap()
            .take()
            .expect("ScriptedProvider: no stream scripted");
        let (tx, rx) = mpsc::channel(items.len().max(1));
        let hold_open = self.hold_open;
        let closed = self.upstream_closed.clone();
        tokio::spawn(async move {
            for item in items {
                if tx.send(item).await.is_err() {
                    closed.store(true, Ordering::SeqCst);
                    return;
                }
            }
            if hold_open {
                tx.closed().await;
                closed.store(true, Ordering::SeqCst);
            }
        });
        Ok(rx)
    }
}

pub fn stop_chunk(total_tokens: u32) -> StreamChunk {
    StreamChunk::finish(
        "stop",
        Usage {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens,
        },
    )
}

/// Knowledge search double: fixed hits, a failure, or a delay.
pub struct ScriptedSearch {
    pub hits: Vec<KnowledgeHit>,
    pub fail: bool,
    pub delay: Option<Duration>,
    pub queries: Mutex<Vec<(String, Option<String>, KnowledgeQuery)>>,
}

impl ScriptedSearch {
    pub fn with_hits(hits: Vec<KnowledgeHit>) -> Self {
        Self {
            hits,
            fail: false,
            delay: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with_hits(Vec::new())
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::with_hits(vec![hit("Never", "too late")])
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl KnowledgeSearch for ScriptedSearch {
    async fn search(
        &self,
        knowledge_base_id: &str,
        user_id: Option<&str>,
        query: &KnowledgeQuery,
    ) -> Result<KnowledgeSearchResponse, KnowledgeError> {
        self.queries.lock().unwrap().push((
            knowledge_base_id.to_string(),
            user_id.map(str::to_string),
            query.clone(),
        ));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(KnowledgeError::Unavailable("connection refused".into()));
        }
        Ok(KnowledgeSearchResponse {
            total_count: self.hits.len() as u64,
            results: self.hits.clone(),
            ..KnowledgeSearchResponse::default()
        })
    }
}

pub fn hit(title: &str, content: &str) -> KnowledgeHit {
    KnowledgeHit {
        title: title.into(),
        content: content.into(),
        citation: Some(format!("{title}-1")),
        ..KnowledgeHit::default()
    }
}
