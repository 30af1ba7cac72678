//! Upstream connectors for Relayline.
//!
//! [`OpenAiCompatProvider`] implements `relayline_core::Provider` against any
//! OpenAI-compatible endpoint; [`HttpKnowledgeSearch`] implements the
//! knowledge search collaborator.

pub mod knowledge_client;
pub mod openai_compat;
pub mod sse;

pub use knowledge_client::HttpKnowledgeSearch;
pub use openai_compat::{OpenAiCompatProvider, Timeouts};
pub use sse::{SseDecoder, SseEvent};
