//! HTTP client for the knowledge search service.

use std::time::Duration;

use async_trait::async_trait;
use relayline_core::error::KnowledgeError;
use relayline_core::knowledge::{KnowledgeQuery, KnowledgeSearch, KnowledgeSearchResponse};
use serde::Deserialize;
use tracing::{debug, warn};

/// Calls `POST {base_url}/api/knowledge/bases/{id}/search`.
pub struct HttpKnowledgeSearch {
    base_url: String,
    client: reqwest::Client,
}

impl HttpKnowledgeSearch {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, KnowledgeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KnowledgeError::Unavailable(format!("HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// The id is a single percent-encoded path segment.
    fn search_url(&self, knowledge_base_id: &str) -> Result<reqwest::Url, KnowledgeError> {
        if matches!(knowledge_base_id.trim(), "" | "." | "..") {
            return Err(KnowledgeError::Rejected(format!(
                "invalid knowledge base id: {knowledge_base_id:?}"
            )));
        }
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| KnowledgeError::Unavailable(format!("bad base URL {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| KnowledgeError::Unavailable(format!("base URL {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "knowledge", "bases", knowledge_base_id, "search"]);
        Ok(url)
    }
}

/// The service's response envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<KnowledgeSearchResponse>,
}

#[async_trait]
impl KnowledgeSearch for HttpKnowledgeSearch {
    async fn search(
        &self,
        knowledge_base_id: &str,
        user_id: Option<&str>,
        query: &KnowledgeQuery,
    ) -> Result<KnowledgeSearchResponse, KnowledgeError> {
        let url = self.search_url(knowledge_base_id)?;
        debug!(kb = %knowledge_base_id, top_k = query.top_k, "Searching knowledge base");

        let mut builder = self.client.post(url).json(query);
        if let Some(user_id) = user_id {
            builder = builder.header("X-User-Id", user_id);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                KnowledgeError::Unavailable(format!("timed out: {e}"))
            } else {
                KnowledgeError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Knowledge search returned error");
            return Err(KnowledgeError::Rejected(format!("status {}: {body}", status.as_u16())));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| KnowledgeError::Decode(e.to_string()))?;

        if !envelope.success {
            return Err(KnowledgeError::Rejected(
                envelope.message.unwrap_or_else(|| "search unsuccessful".into()),
            ));
        }
        Ok(envelope.data.unwrap_or_default())
    }
}
