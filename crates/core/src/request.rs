//! The inbound chat request and its knowledge-recall settings.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::message::Message;

/// One caller request, alive for the duration of a single call.
///
/// `knowledge_snippets` is request-scoped state filled in by knowledge
/// augmentation; it is never read from the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user's message (required, non-empty)
    pub message: String,

    /// Prior conversation history, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,

    /// Model identifier; the configured default is used when absent
    #[serde(default, rename = "modelType", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    #[serde(default = "default_stream")]
    pub stream: bool,

    /// Run the ReAct loop instead of plain passthrough
    #[serde(default, rename = "useReAct")]
    pub use_react: bool,

    /// Forwarded to the knowledge search collaborator as `X-User-Id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge: Option<KnowledgeConfig>,

    #[serde(skip)]
    pub knowledge_snippets: Vec<KnowledgeSnippet>,
}

fn default_stream() -> bool {
    true
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            messages: Vec::new(),
            model: None,
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            stream: true,
            use_react: false,
            user_id: None,
            knowledge: None,
            knowledge_snippets: Vec::new(),
        }
    }

    pub fn with_react(mut self) -> Self {
        self.use_react = true;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_knowledge(mut self, knowledge: KnowledgeConfig) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    /// Reject requests the pipeline cannot serve.
    pub fn validate(&self) -> Result<()> {
        if self.message.trim().is_empty() {
            return Err(Error::InvalidRequest("message must not be empty".into()));
        }
        if self.max_tokens == Some(0) {
            return Err(Error::InvalidRequest("max_tokens must be greater than 0".into()));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(Error::InvalidRequest(format!(
                    "temperature must be between 0.0 and 2.0, got {t}"
                )));
            }
        }
        Ok(())
    }

    /// Whether a citation footer should follow the final answer.
    pub fn wants_citation_footer(&self) -> bool {
        !self.knowledge_snippets.is_empty()
            && self
                .knowledge
                .as_ref()
                .and_then(|k| k.append_citations)
                .unwrap_or(false)
    }
}

/// Per-request knowledge recall settings. Unset values fall back to the
/// configured defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_rerank: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_top_k: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append_citations: Option<bool>,
}

impl KnowledgeConfig {
    /// Enabled config targeting one knowledge base, everything else defaulted.
    pub fn for_base(knowledge_base_id: impl Into<String>) -> Self {
        Self {
            enabled: true,
            knowledge_base_id: Some(knowledge_base_id.into()),
            ..Self::default()
        }
    }

    /// The target base id, if augmentation should run at all.
    pub fn active_base(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.knowledge_base_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// A retrieved passage used as grounding context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSnippet {
    pub title: String,
    pub citation: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_wire_field_names() {
        let req: ChatRequest = serde_json::from_str(
            r#"{
                "message": "2+2",
                "modelType": "Qwen/Qwen3-8B",
                "useReAct": true,
                "knowledge": {"enabled": true, "knowledgeBaseId": "kb-1", "topK": 2}
            }"#,
        )
        .unwrap();
        assert!(req.use_react);
        assert!(req.stream);
        assert_eq!(req.model.as_deref(), Some("Qwen/Qwen3-8B"));
        let knowledge = req.knowledge.unwrap();
        assert_eq!(knowledge.active_base(), Some("kb-1"));
        assert_eq!(knowledge.top_k, Some(2));
        assert!(req.knowledge_snippets.is_empty());
    }

    #[test]
    fn empty_message_is_rejected() {
        let err = ChatRequest::new("   ").validate().unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn zero_max_tokens_is_rejected() {
        let mut req = ChatRequest::new("hi");
        req.max_tokens = Some(0);
        assert!(req.validate().is_err());
        req.max_tokens = Some(16);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn disabled_or_blank_base_is_inactive() {
        let mut cfg = KnowledgeConfig::for_base("  ");
        assert_eq!(cfg.active_base(), None);
        cfg.knowledge_base_id = Some("kb".into());
        cfg.enabled = false;
        assert_eq!(cfg.active_base(), None);
    }

    #[test]
    fn footer_needs_snippets_and_flag() {
        let mut req = ChatRequest::new("q").with_knowledge(KnowledgeConfig {
            append_citations: Some(true),
            ..KnowledgeConfig::for_base("kb")
        });
        assert!(!req.wants_citation_footer());
        req.knowledge_snippets.push(KnowledgeSnippet {
            title: "Guide".into(),
            citation: "Guide-1".into(),
            content: "text".into(),
        });
        assert!(req.wants_citation_footer());
    }
}
