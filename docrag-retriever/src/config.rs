//! Application configuration
//!
//! Settings come from three layers, later ones winning: an optional TOML
//! file, environment variables, and command-line flags (applied by the
//! binary). Every field has a default, so an empty file is valid.
//!
//! ```toml
//! [database]
//! url = "docrag.db"
//!
//! [chunking]
//! chunk_size = 600
//! overlap = 60
//!
//! [embedding]
//! provider = "gemini"
//! batch_size = 2
//! batch_delay_secs = 2.0
//!
//! [chat]
//! model = "gpt-4o-mini"
//! temperature = 0.3
//! domain = "recipe"
//!
//! [retrieval]
//! top_k = 5
//! ```

use anyhow::{Context, Result};
use docrag_context::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, SplitterConfig};
use docrag_embed::{EmbedConfig, ProviderKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "docrag.toml";
pub const DATABASE_URL_ENV: &str = "DOCRAG_DATABASE_URL";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSection,
    pub chunking: ChunkingSection,
    pub embedding: EmbeddingSection,
    pub chat: ChatSection,
    pub retrieval: RetrievalSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// `sqlite:` URL, `:memory:` or a file path
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: "docrag.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSection {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingSection {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    pub provider: ProviderKind,
    /// Defaults to the provider's usual model
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub batch_size: usize,
    pub batch_delay_secs: f64,
    pub request_timeout_secs: u64,
    pub normalize: bool,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            base_url: None,
            api_key: None,
            batch_size: docrag_embed::config::DEFAULT_BATCH_SIZE,
            batch_delay_secs: docrag_embed::config::DEFAULT_BATCH_DELAY.as_secs_f64(),
            request_timeout_secs: docrag_embed::config::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            normalize: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSection {
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    /// Subject named in the prompt's instruction line
    pub domain: String,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            model: crate::answer::openai::DEFAULT_CHAT_MODEL.to_string(),
            base_url: None,
            api_key: None,
            temperature: crate::answer::openai::DEFAULT_TEMPERATURE,
            request_timeout_secs: 60,
            domain: crate::answer::DEFAULT_DOMAIN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    pub top_k: usize,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

impl AppConfig {
    /// Load from `path`, or from `docrag.toml` when present, then apply the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::load_from(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML file without looking at the environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Override settings from environment variables, read through `get`.
    pub fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(DATABASE_URL_ENV) {
            self.database.url = url;
        }
        if let Some(key) = non_empty(self.embedding.provider.api_key_env()) {
            self.embedding.api_key = Some(key);
        }
        if let Some(key) = non_empty(OPENAI_API_KEY_ENV) {
            self.chat.api_key = Some(key);
        }
    }

    pub fn splitter_config(&self) -> Result<SplitterConfig> {
        SplitterConfig::new(self.chunking.chunk_size, self.chunking.overlap)
            .context("Invalid [chunking] settings")
    }

    pub fn embed_config(&self) -> Result<EmbedConfig> {
        let section = &self.embedding;
        let batch_delay = Duration::try_from_secs_f64(section.batch_delay_secs.max(0.0))
            .context("Invalid [embedding] settings")?;
        let mut config = EmbedConfig::for_provider(section.provider)
            .with_batch_size(section.batch_size)
            .with_batch_delay(batch_delay)
            .with_normalize(section.normalize);
        config.request_timeout = Duration::from_secs(section.request_timeout_secs);
        config.api_key = section.api_key.clone();
        if let Some(model) = &section.model {
            config = config.with_model(model.clone());
        }
        if let Some(base_url) = &section.base_url {
            config = config.with_base_url(base_url.clone());
        }
        Ok(config)
    }
}
