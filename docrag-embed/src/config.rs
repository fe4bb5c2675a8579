//! Configuration for embedding providers

use crate::error::{EmbedError, Result};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default number of texts sent to the provider per request
pub const DEFAULT_BATCH_SIZE: usize = 2;
/// Default pause between two consecutive batch requests
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(2);
/// Default timeout for a single HTTP request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Which embedding service to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Generative Language API
    #[default]
    Gemini,
    /// Any service exposing the OpenAI `/embeddings` endpoint
    OpenAi,
}

impl ProviderKind {
    /// Model used when none is configured
    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "models/embedding-001",
            ProviderKind::OpenAi => "text-embedding-3-small",
        }
    }

    /// API root used when no base URL is configured
    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
        }
    }

    /// Environment variable conventionally holding the API key
    pub fn api_key_env(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::OpenAi => write!(f, "openai"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = EmbedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAi),
            other => Err(EmbedError::invalid_config(format!(
                "unknown embedding provider '{other}'. Use 'gemini' or 'openai'"
            ))),
        }
    }
}

/// Configuration for an embedding provider and its batching policy
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct EmbedConfig {
    /// Service to call
    #[builder(default)]
    pub provider: ProviderKind,
    /// Model identifier understood by the service
    #[builder(default = "self.provider.unwrap_or_default().default_model().to_string()")]
    pub model: String,
    /// Override for the API root, mostly for proxies and tests
    #[builder(default)]
    pub base_url: Option<String>,
    /// Secret sent with every request
    #[builder(default)]
    pub api_key: Option<String>,
    /// Maximum number of texts per request
    #[builder(default = "DEFAULT_BATCH_SIZE")]
    pub batch_size: usize,
    /// Pause between consecutive batch requests
    #[builder(default = "DEFAULT_BATCH_DELAY")]
    pub batch_delay: Duration,
    /// Timeout for each HTTP request
    #[builder(default = "DEFAULT_REQUEST_TIMEOUT")]
    pub request_timeout: Duration,
    /// Whether to L2-normalize returned vectors
    #[builder(default = "false")]
    pub normalize: bool,
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Default configuration for the given provider
    pub fn for_provider(provider: ProviderKind) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            base_url: None,
            api_key: None,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            normalize: false,
        }
    }

    /// Gemini configuration with the given key
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self::for_provider(ProviderKind::Gemini).with_api_key(api_key)
    }

    /// OpenAI configuration with the given key
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::for_provider(ProviderKind::OpenAi).with_api_key(api_key)
    }

    /// Set the API key (builder style)
    pub fn with_api_key(self, api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..self
        }
    }

    /// Set the model (builder style)
    pub fn with_model(self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self
        }
    }

    /// Set the base URL (builder style)
    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..self
        }
    }

    /// Set the batch size (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set the delay between batches (builder style)
    pub fn with_batch_delay(self, batch_delay: Duration) -> Self {
        Self {
            batch_delay,
            ..self
        }
    }

    /// Set whether to normalize embeddings (builder style)
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// API root with any trailing slash removed
    pub fn endpoint(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(self.provider.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }

    /// Check the settings that would otherwise fail on the first request
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be at least 1"));
        }
        if self.model.trim().is_empty() {
            return Err(EmbedError::invalid_config("model must not be empty"));
        }
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => {
                return Err(EmbedError::invalid_config(format!(
                    "missing API key for {} (set {})",
                    self.provider,
                    self.provider.api_key_env()
                )));
            }
        }
        tracing::debug!("Embedding config valid for {}/{}", self.provider, self.model);
        Ok(())
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self::for_provider(ProviderKind::default())
    }
}
