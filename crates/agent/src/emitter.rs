//! Per-request output handle.
//!
//! Wraps the sending half of the request's bounded channel together with the
//! stream id and model, so every event is stamped the same way. A dropped
//! receiver is the caller's cancellation signal.

use relayline_core::event::StreamEvent;
use tokio::sync::mpsc;

/// The caller dropped the output receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("output receiver dropped")]
pub struct Cancelled;

#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<StreamEvent>,
    stream_id: String,
    model: String,
}

impl EventEmitter {
    pub fn new(tx: mpsc::Sender<StreamEvent>, stream_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            tx,
            stream_id: stream_id.into(),
            model: model.into(),
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a non-terminal content chunk.
    pub async fn chunk(&self, content: impl Into<String>) -> Result<(), Cancelled> {
        self.tx
            .send(StreamEvent::chunk(&self.stream_id, &self.model, content))
            .await
            .map_err(|_| Cancelled)
    }

    pub async fn terminal(&self, finish_reason: &str, token_usage: u32) -> Result<(), Cancelled> {
        self.tx
            .send(StreamEvent::terminal(
                &self.stream_id,
                &self.model,
                finish_reason,
                token_usage,
            ))
            .await
            .map_err(|_| Cancelled)
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the receiver is dropped.
    pub async fn cancelled(&self) {
        self.tx.closed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_are_stamped() {
        let (tx, mut rx) = mpsc::channel(4);
        let emitter = EventEmitter::new(tx, "s-1", "m");
        emitter.chunk("Hi").await.unwrap();
        emitter.terminal("stop", 3).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!((first.stream_id.as_str(), first.model.as_str()), ("s-1", "m"));
        assert!(!first.finished);
        let last = rx.recv().await.unwrap();
        assert!(last.finished);
        assert_eq!(last.token_usage, Some(3));
    }

    #[tokio::test]
    async fn dropped_receiver_cancels() {
        let (tx, rx) = mpsc::channel(4);
        let emitter = EventEmitter::new(tx, "s", "m");
        assert!(!emitter.is_cancelled());
        drop(rx);
        assert!(emitter.is_cancelled());
        assert_eq!(emitter.chunk("x").await, Err(Cancelled));
        emitter.cancelled().await;
    }
}
