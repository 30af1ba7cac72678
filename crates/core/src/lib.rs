//! # Relayline Core
//!
//! Domain types, traits, and error definitions for the Relayline streaming
//! proxy. This crate has **no HTTP dependencies**: it defines the model that
//! the provider, tool, and agent crates implement against.
//!
//! Every external boundary (model provider, knowledge search, tools) is a
//! trait here, so tests can swap in scripted implementations.

pub mod error;
pub mod event;
pub mod knowledge;
pub mod message;
pub mod provider;
pub mod request;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, KnowledgeError, ProviderError, Result, ToolError};
pub use event::StreamEvent;
pub use knowledge::{KnowledgeHit, KnowledgeQuery, KnowledgeSearch, KnowledgeSearchResponse};
pub use message::{Message, Role, estimate_tokens};
pub use provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, SamplingDefaults, StreamChunk, Usage,
};
pub use request::{ChatRequest, KnowledgeConfig, KnowledgeSnippet};
pub use tool::{Tool, ToolDescriptor, ToolRegistry};
