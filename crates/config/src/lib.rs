//! Configuration loading, validation, and management for ChatRelay.
//!
//! Loads configuration from `~/.chatrelay/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.chatrelay/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default chat model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Conversation memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Retrieval-augmented generation configuration
    #[serde(default)]
    pub rag: RagConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("gateway", &self.gateway)
            .field("memory", &self.memory)
            .field("rag", &self.rag)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Fragments buffered between the model stream and the HTTP body
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,

    /// Origins allowed by CORS. Empty = same-origin only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_stream_buffer() -> usize {
    16
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            stream_buffer: default_stream_buffer(),
            cors_origins: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "window" (in-process message window) or "none"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Turns retained per conversation
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Conversations tracked before the least recently used is evicted
    #[serde(default = "default_max_conversations")]
    pub max_conversations: usize,
}

fn default_memory_backend() -> String {
    "window".into()
}
fn default_max_messages() -> usize {
    20
}
fn default_max_conversations() -> usize {
    1_000
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            max_messages: default_max_messages(),
            max_conversations: default_max_conversations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Documents retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum cosine similarity for a document to be used
    #[serde(default)]
    pub similarity_threshold: f32,

    /// Estimated-token budget for the retrieved context (0 = unlimited)
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Embedding model used for documents and queries
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// JSON-lines file backing the vector store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<String>,

    /// Custom prompt template; must contain `{context}` and `{input}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Estimated-token size of ingested chunks
    #[serde(default = "default_chunk_tokens")]
    pub chunk_tokens: usize,
}

fn default_top_k() -> usize {
    3
}
fn default_max_context_tokens() -> usize {
    3_000
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_chunk_tokens() -> usize {
    400
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: 0.0,
            max_context_tokens: default_max_context_tokens(),
            embedding_model: default_embedding_model(),
            store_path: None,
            template: None,
            chunk_tokens: default_chunk_tokens(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.chatrelay/config.toml).
    ///
    /// Also checks environment variables:
    /// - `CHATRELAY_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `CHATRELAY_PROVIDER`, `CHATRELAY_MODEL`, `CHATRELAY_PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides()?;
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

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(key) = std::env::var("CHATRELAY_API_KEY") {
            self.api_key = Some(key);
        } else if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY").ok();
        }

        if let Ok(provider) = std::env::var("CHATRELAY_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("CHATRELAY_MODEL") {
            self.default_model = model;
        }

        if let Ok(port) = std::env::var("CHATRELAY_PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("CHATRELAY_PORT is not a valid port: {port}"))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".chatrelay")
    }

    /// Path of the vector store file: configured, or `~/.chatrelay/vector_store.jsonl`.
    pub fn vector_store_path(&self) -> PathBuf {
        self.rag
            .store_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join("vector_store.jsonl"))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.gateway.stream_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.stream_buffer must be > 0".into(),
            ));
        }

        if !matches!(self.memory.backend.as_str(), "window" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "memory.backend must be \"window\" or \"none\", got \"{}\"",
                self.memory.backend
            )));
        }

        if self.memory.max_messages == 0 || self.memory.max_conversations == 0 {
            return Err(ConfigError::ValidationError(
                "memory.max_messages and memory.max_conversations must be > 0".into(),
            ));
        }

        if self.rag.top_k == 0 {
            return Err(ConfigError::ValidationError("rag.top_k must be > 0".into()));
        }

        if self.rag.chunk_tokens == 0 {
            return Err(ConfigError::ValidationError("rag.chunk_tokens must be > 0".into()));
        }

        if let Some(template) = &self.rag.template {
            for placeholder in ["{context}", "{input}"] {
                if !template.contains(placeholder) {
                    return Err(ConfigError::ValidationError(format!(
                        "rag.template is missing the {placeholder} placeholder"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some() || self.providers.values().any(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for the `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            gateway: GatewayConfig::default(),
            memory: MemoryConfig::default(),
            rag: RagConfig::default(),
            providers: HashMap::new(),
        }
    }
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
