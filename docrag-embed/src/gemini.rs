//! Google Generative Language API embedding provider

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, check_status, finish_embeddings, http_client};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Embedding provider backed by the Gemini `embedContent` endpoints
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    config: EmbedConfig,
    model: String,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

impl GeminiProvider {
    /// Create a provider from configuration. No request is made.
    pub fn new(config: EmbedConfig) -> Result<Self> {
        let model = qualified_model(&config.model);
        Ok(Self {
            client: http_client(&config)?,
            config,
            model,
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}:{}", self.config.endpoint(), self.model, method)
    }

    fn request<'a>(&'a self, text: &'a str) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: &self.model,
            content: Content {
                parts: vec![Part { text }],
            },
        }
    }

    async fn post<B: Serialize + ?Sized>(&self, method: &str, body: &B) -> Result<String> {
        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        let response = self
            .client
            .post(self.url(method))
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.text().await?)
    }
}

/// Gemini addresses models as `models/<name>`
fn qualified_model(model: &str) -> String {
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

fn parse_batch_response(body: &str) -> Result<Vec<Vec<f32>>> {
    let parsed: BatchEmbedResponse = serde_json::from_str(body)
        .map_err(|e| EmbedError::malformed(format!("batchEmbedContents: {e}")))?;
    Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
}

fn parse_single_response(body: &str) -> Result<Vec<f32>> {
    let parsed: EmbedContentResponse = serde_json::from_str(body)
        .map_err(|e| EmbedError::malformed(format!("embedContent: {e}")))?;
    Ok(parsed.embedding.values)
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let body = self.post("embedContent", &self.request(text)).await?;
        let vector = parse_single_response(&body)?;
        let mut result = finish_embeddings(1, vec![vector], self.config.normalize)?;
        Ok(result.embeddings.remove(0))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::default());
        }
        tracing::debug!("Requesting {} Gemini embeddings", texts.len());
        let request = BatchEmbedRequest {
            requests: texts.iter().map(|t| self.request(t)).collect(),
        };
        let body = self.post("batchEmbedContents", &request).await?;
        finish_embeddings(texts.len(), parse_batch_response(&body)?, self.config.normalize)
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
