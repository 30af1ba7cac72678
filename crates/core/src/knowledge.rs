//! Knowledge search collaborator boundary.
//!
//! The search service itself (vector storage, chunking, rerank models) lives
//! outside this workspace; only its request/response contract is modelled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::KnowledgeError;
use crate::request::KnowledgeSnippet;

/// Recall parameters sent with every search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeQuery {
    pub query: String,
    pub top_k: u32,
    pub similarity_threshold: f32,
    pub use_rerank: bool,
    pub rerank_top_k: u32,
    pub append_citations: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeSearchResponse {
    #[serde(default)]
    pub results: Vec<KnowledgeHit>,

    #[serde(default)]
    pub total_count: u64,

    /// Search latency reported by the collaborator, in milliseconds
    #[serde(default)]
    pub search_time: u64,

    #[serde(default)]
    pub rerank_applied: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeHit {
    #[serde(default)]
    pub document_id: Option<String>,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub chunk_index: Option<u32>,

    #[serde(default)]
    pub citation: Option<String>,

    #[serde(default)]
    pub similarity_score: Option<f32>,

    #[serde(default)]
    pub rerank_score: Option<f32>,
}

impl KnowledgeHit {
    /// Convert into a snippet. A missing citation becomes `title-(chunk+1)`.
    pub fn into_snippet(self) -> KnowledgeSnippet {
        let citation = match self.citation.filter(|c| !c.trim().is_empty()) {
            Some(c) => c,
            None => format!("{}-{}", self.title, self.chunk_index.unwrap_or(0).saturating_add(1)),
        };
        KnowledgeSnippet {
            title: self.title,
            citation,
            content: self.content,
        }
    }
}

/// Searches one knowledge base.
#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    async fn search(
        &self,
        knowledge_base_id: &str,
        user_id: Option<&str>,
        query: &KnowledgeQuery,
    ) -> Result<KnowledgeSearchResponse, KnowledgeError>;
}
