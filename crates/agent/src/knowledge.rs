//! Knowledge augmentation: retrieve snippets before the model runs.
//!
//! Best-effort by contract. A search that fails, times out, or finds nothing
//! leaves the request untouched apart from a warning in the log.

use std::sync::Arc;

use relayline_config::KnowledgeSettings;
use relayline_core::error::KnowledgeError;
use relayline_core::knowledge::{KnowledgeQuery, KnowledgeSearch};
use relayline_core::message::Message;
use relayline_core::request::{ChatRequest, KnowledgeSnippet};
use tracing::{debug, info, warn};

const CITATION_INSTRUCTION: &str = "Prefer the knowledge base excerpts provided above when answering. \
Cite them with their bracketed numbers, for example [1], wherever you rely on them.";

pub struct KnowledgeAugmenter {
    search: Arc<dyn KnowledgeSearch>,
    settings: KnowledgeSettings,
}

impl KnowledgeAugmenter {
    pub fn new(search: Arc<dyn KnowledgeSearch>, settings: KnowledgeSettings) -> Self {
        Self { search, settings }
    }

    /// Enrich `request` in place. Returns the number of snippets attached.
    pub async fn augment(&self, request: &mut ChatRequest) -> usize {
        if !self.settings.enabled {
            return 0;
        }
        let Some(knowledge) = request.knowledge.as_mut() else {
            return 0;
        };
        let Some(base_id) = knowledge.active_base().map(str::to_string) else {
            return 0;
        };

        let append_citations = knowledge
            .append_citations
            .unwrap_or(self.settings.append_citation_by_default);
        knowledge.append_citations = Some(append_citations);

        let query = KnowledgeQuery {
            query: request.message.clone(),
            top_k: knowledge.top_k.unwrap_or(self.settings.default_top_k),
            similarity_threshold: knowledge
                .similarity_threshold
                .unwrap_or(self.settings.default_similarity_threshold),
            use_rerank: knowledge.use_rerank.unwrap_or(false),
            rerank_top_k: knowledge.rerank_top_k.unwrap_or(self.settings.default_rerank_top_k),
            append_citations,
        };

        debug!(knowledge_base = %base_id, top_k = query.top_k, "Searching knowledge base");
        let search = self.search.search(&base_id, request.user_id.as_deref(), &query);
        let response = match tokio::time::timeout(self.settings.timeout(), search).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(knowledge_base = %base_id, error = %e, "Knowledge search failed, continuing without context");
                return 0;
            }
            Err(_) => {
                let e = KnowledgeError::Timeout {
                    timeout_ms: self.settings.timeout_ms,
                };
                warn!(knowledge_base = %base_id, error = %e, "Knowledge search failed, continuing without context");
                return 0;
            }
        };

        if response.results.is_empty() {
            warn!(knowledge_base = %base_id, "Knowledge search returned no results");
            return 0;
        }

        let snippets: Vec<KnowledgeSnippet> = response
            .results
            .into_iter()
            .map(|hit| hit.into_snippet())
            .collect();

        request.messages.push(Message::system(context_message(&snippets)));
        if append_citations {
            request.system_prompt = Some(match request.system_prompt.take() {
                Some(existing) if !existing.trim().is_empty() => {
                    format!("{existing}\n\n{CITATION_INSTRUCTION}")
                }
                _ => CITATION_INSTRUCTION.to_string(),
            });
        }

        let count = snippets.len();
        info!(
            knowledge_base = %base_id,
            snippets = count,
            search_ms = response.search_time,
            rerank = response.rerank_applied,
            "Request augmented with knowledge"
        );
        request.knowledge_snippets = snippets;
        count
    }
}

/// One system message enumerating snippets with `[n]` markers.
pub fn context_message(snippets: &[KnowledgeSnippet]) -> String {
    let mut out = String::from("Relevant knowledge base excerpts:\n");
    for (i, snippet) in snippets.iter().enumerate() {
        out.push_str(&format!("\n[{}] {}\n{}\n", i + 1, snippet.title, snippet.content));
    }
    out
}

/// `[n] title (citation)` per snippet, preceded by a blank line.
pub fn citation_footer(snippets: &[KnowledgeSnippet]) -> String {
    let mut out = String::from("\n\nReferences:");
    for (i, snippet) in snippets.iter().enumerate() {
        out.push_str(&format!("\n[{}] {} ({})", i + 1, snippet.title, snippet.citation));
    }
    out
}
