//! Configuration loading, validation, and management for Relayline.
//!
//! Loads configuration from `~/.relayline/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use relayline_core::SamplingDefaults;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.relayline/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat completion endpoint
    #[serde(default)]
    pub chat: ChatConfig,

    /// Embedding endpoint
    #[serde(default)]
    pub embedding: EndpointConfig,

    /// Rerank endpoint
    #[serde(default = "EndpointConfig::rerank_default")]
    pub rerank: EndpointConfig,

    /// Knowledge search collaborator
    #[serde(default)]
    pub knowledge: KnowledgeSettings,

    /// ReAct loop settings
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Output channel and answer pacing
    #[serde(default)]
    pub streaming: StreamingConfig,
}

fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path appended to `base_url`
    #[serde(default = "default_chat_path")]
    pub interface_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum silence between two reads of the response body
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Whole-call bound for one-shot requests
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_chat_model() -> String {
    "Qwen/Qwen3-8B".into()
}
fn default_base_url() -> String {
    "https://api.siliconflow.cn".into()
}
fn default_chat_path() -> String {
    "/v1/chat/completions".into()
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_temperature() -> f32 {
    0.7
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_read_timeout() -> u64 {
    60
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            base_url: default_base_url(),
            interface_url: default_chat_path(),
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("interface_url", &self.interface_url)
            .field("api_key", &redact(&self.api_key))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl ChatConfig {
    /// Full chat completions URL.
    pub fn endpoint(&self) -> String {
        join_url(&self.base_url, &self.interface_url)
    }

    pub fn sampling_defaults(&self) -> SamplingDefaults {
        SamplingDefaults {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// A secondary endpoint (embeddings, rerank). Unset base URL and key fall
/// back to the chat endpoint's.
#[derive(Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_embedding_path")]
    pub interface_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_embedding_model() -> String {
    "BAAI/bge-m3".into()
}
fn default_embedding_path() -> String {
    "/v1/embeddings".into()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            base_url: None,
            interface_url: default_embedding_path(),
            api_key: None,
        }
    }
}

impl EndpointConfig {
    fn rerank_default() -> Self {
        Self {
            model: "BAAI/bge-reranker-v2-m3".into(),
            base_url: None,
            interface_url: "/v1/rerank".into(),
            api_key: None,
        }
    }

    /// Full URL, resolved against the chat endpoint's base when unset.
    pub fn endpoint(&self, chat: &ChatConfig) -> String {
        let base = self.base_url.as_deref().unwrap_or(&chat.base_url);
        join_url(base, &self.interface_url)
    }

    pub fn resolved_api_key<'a>(&'a self, chat: &'a ChatConfig) -> Option<&'a str> {
        self.api_key.as_deref().or(chat.api_key.as_deref())
    }
}

impl std::fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("interface_url", &self.interface_url)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

/// Knowledge search collaborator and recall defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSettings {
    /// Master switch; when off no request is augmented
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_knowledge_url")]
    pub base_url: String,

    #[serde(default = "default_top_k")]
    pub default_top_k: u32,

    #[serde(default = "default_similarity_threshold")]
    pub default_similarity_threshold: f32,

    #[serde(default = "default_rerank_top_k")]
    pub default_rerank_top_k: u32,

    #[serde(default = "default_true")]
    pub append_citation_by_default: bool,

    #[serde(default = "default_knowledge_timeout")]
    pub timeout_ms: u64,
}

fn default_knowledge_url() -> String {
    "http://localhost:8083".into()
}
fn default_top_k() -> u32 {
    4
}
fn default_similarity_threshold() -> f32 {
    0.6
}
fn default_rerank_top_k() -> u32 {
    3
}
fn default_knowledge_timeout() -> u64 {
    3000
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_knowledge_url(),
            default_top_k: default_top_k(),
            default_similarity_threshold: default_similarity_threshold(),
            default_rerank_top_k: default_rerank_top_k(),
            append_citation_by_default: true,
            timeout_ms: default_knowledge_timeout(),
        }
    }
}

impl KnowledgeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Agent used for ReAct requests
    #[serde(default = "default_agent_id")]
    pub agent_id: String,

    /// Iteration bound for the loop
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_agent_id() -> String {
    "general-assistant".into()
}
fn default_max_iterations() -> u32 {
    5
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            agent_id: default_agent_id(),
            max_iterations: default_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Bounded capacity of each request's output channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Random delay between answer chunks in ReAct mode
    #[serde(default)]
    pub pacing_enabled: bool,

    #[serde(default = "default_pacing_min")]
    pub pacing_min_ms: u64,

    #[serde(default = "default_pacing_max")]
    pub pacing_max_ms: u64,
}

fn default_channel_capacity() -> usize {
    128
}
fn default_pacing_min() -> u64 {
    100
}
fn default_pacing_max() -> u64 {
    300
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            pacing_enabled: false,
            pacing_min_ms: default_pacing_min(),
            pacing_max_ms: default_pacing_max(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.relayline/config.toml).
    ///
    /// Also checks environment variables for the chat API key:
    /// - `RELAYLINE_API_KEY` (highest priority)
    /// - `SILICONFLOW_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides and re-validate.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.chat.api_key.is_none() {
            self.chat.api_key = std::env::var("RELAYLINE_API_KEY")
                .ok()
                .or_else(|| std::env::var("SILICONFLOW_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }
        if let Ok(url) = std::env::var("RELAYLINE_BASE_URL") {
            self.chat.base_url = url;
        }
        if let Ok(model) = std::env::var("RELAYLINE_MODEL") {
            self.chat.model = model;
        }
        if let Ok(url) = std::env::var("RELAYLINE_KNOWLEDGE_URL") {
            self.knowledge.base_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".relayline")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.chat.temperature) {
            return Err(ConfigError::ValidationError(
                "chat.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.chat.max_tokens == 0 {
            return Err(ConfigError::ValidationError("chat.max_tokens must be > 0".into()));
        }
        if self.reasoning.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "reasoning.max_iterations must be > 0".into(),
            ));
        }
        if self.streaming.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "streaming.channel_capacity must be > 0".into(),
            ));
        }
        if self.streaming.pacing_min_ms > self.streaming.pacing_max_ms {
            return Err(ConfigError::ValidationError(
                "streaming.pacing_min_ms must not exceed pacing_max_ms".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.knowledge.default_similarity_threshold) {
            return Err(ConfigError::ValidationError(
                "knowledge.default_similarity_threshold must be between 0.0 and 1.0".into(),
            ));
        }
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.chat.api_key.is_some()
    }

    /// Copy with every API key replaced by a placeholder, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for key in [
            &mut copy.chat.api_key,
            &mut copy.embedding.api_key,
            &mut copy.rerank.api_key,
        ] {
            if key.is_some() {
                *key = Some("[REDACTED]".into());
            }
        }
        copy
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.trim_end_matches('/').to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for relayline_core::Error {
    fn from(err: ConfigError) -> Self {
        relayline_core::Error::Config {
            message: err.to_string(),
        }
    }
}
