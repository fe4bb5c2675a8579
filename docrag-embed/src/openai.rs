//! OpenAI-compatible `/embeddings` provider

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, check_status, finish_embeddings, http_client};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Embedding provider for OpenAI and services that mimic its API
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: EmbedConfig,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    /// Create a provider from configuration. No request is made.
    pub fn new(config: EmbedConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(&config)?,
            config,
        })
    }

    fn url(&self) -> String {
        format!("{}/embeddings", self.config.endpoint())
    }
}

/// Entries may arrive out of order; `index` puts them back.
fn parse_response(body: &str) -> Result<Vec<Vec<f32>>> {
    let mut parsed: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| EmbedError::malformed(format!("embeddings: {e}")))?;
    if parsed.data.iter().all(|d| d.index.is_some()) {
        parsed.data.sort_by_key(|d| d.index);
    }
    Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let mut result = self.embed_texts(&[text.to_string()]).await?;
        Ok(result.embeddings.remove(0))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::default());
        }
        tracing::debug!("Requesting {} OpenAI embeddings", texts.len());
        let mut request = self.client.post(self.url()).json(&EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        });
        if let Some(key) = self.config.api_key.as_deref() {
            request = request.bearer_auth(key);
        }
        let response = check_status(request.send().await?).await?;
        let body = response.text().await?;
        finish_embeddings(texts.len(), parse_response(&body)?, self.config.normalize)
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
