//! The request pipeline: the heart of Relayline.
//!
//! Each request flows through:
//!
//! 1. **Knowledge augmentation** (optional): retrieved snippets are attached
//!    as context
//! 2. **Mode selection**: plain passthrough of the provider stream, or the
//!    ReAct loop
//! 3. **ReAct loop**: Thought → Action → Observation until `Final Answer:`
//!    or the iteration bound
//! 4. **Framing**: markers, answer sentences, and exactly one terminal event
//!
//! The loop's transcript lives per request; agent definitions and their
//! tool registries are immutable and shared.

pub mod catalog;
pub mod emitter;
pub mod knowledge;
pub mod multiplexer;
pub mod react;
pub mod transcript;

pub use catalog::{AgentCatalog, AgentDefinition, GENERAL_ASSISTANT};
pub use emitter::{Cancelled, EventEmitter};
pub use knowledge::{KnowledgeAugmenter, citation_footer};
pub use multiplexer::{StreamMultiplexer, split_answer};
pub use react::{ReactEngine, ReactOutcome, ReactRun};
pub use transcript::{ReasoningStep, Transcript};

#[cfg(test)]
pub(crate) mod test_helpers;
