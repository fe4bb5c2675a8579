//! Embedding provider trait and shared helpers

use crate::config::{EmbedConfig, ProviderKind};
use crate::error::{EmbedError, Result};
use crate::gemini::GeminiProvider;
use crate::openai::OpenAiProvider;
use async_trait::async_trait;
use std::sync::Arc;

/// Result of embedding generation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text, in input order
    pub embeddings: Vec<Vec<f32>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result.
    ///
    /// The dimension is inferred from the first vector and is 0 when the
    /// result is empty.
    pub fn new(embeddings: Vec<Vec<f32>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    /// Append the vectors of another result, keeping order.
    pub fn extend(&mut self, other: EmbeddingResult) {
        if self.embeddings.is_empty() {
            self.dimension = other.dimension;
        }
        self.embeddings.extend(other.embeddings);
    }
}

/// Trait for embedding providers that can generate embeddings from text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts in one request.
    ///
    /// The returned vectors are aligned with `texts`.
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;

    /// Get the model this provider sends requests for
    fn model_name(&self) -> &str;
}

/// Build the provider selected by `config`
pub fn create_provider(config: &EmbedConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    config.validate()?;
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(config.clone())?),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(config.clone())?),
    };
    tracing::info!(
        "Created {} embedding provider for model {}",
        provider.provider_name(),
        provider.model_name()
    );
    Ok(provider)
}

/// Scale `vector` to unit length in place. Zero vectors are left untouched.
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Check that a response matches its request and apply normalization
pub(crate) fn finish_embeddings(
    expected: usize,
    mut embeddings: Vec<Vec<f32>>,
    normalize_vectors: bool,
) -> Result<EmbeddingResult> {
    if embeddings.len() != expected {
        return Err(EmbedError::CountMismatch {
            expected,
            actual: embeddings.len(),
        });
    }
    if let Some(first) = embeddings.first() {
        let dimension = first.len();
        if dimension == 0 {
            return Err(EmbedError::malformed("service returned an empty vector"));
        }
        if embeddings.iter().any(|e| e.len() != dimension) {
            return Err(EmbedError::malformed(
                "service returned vectors of different dimensions",
            ));
        }
    }
    if normalize_vectors {
        embeddings.iter_mut().for_each(|e| normalize(e));
    }
    Ok(EmbeddingResult::new(embeddings))
}

/// Build the shared HTTP client for a provider
pub(crate) fn http_client(config: &EmbedConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?)
}

/// Turn a non-success response into [`EmbedError::Api`]
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!("Embedding request failed with status {}", status);
    Err(EmbedError::Api {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_result() {
        let result = EmbeddingResult::new(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        assert_eq!(result.len(), 2);
        assert_eq!(result.dimension, 3);
        assert!(!result.is_empty());

        let empty = EmbeddingResult::new(vec![]);
        assert!(empty.is_empty());
        assert_eq!(empty.dimension, 0);
    }

    #[test]
    fn test_extend_keeps_order() {
        let mut result = EmbeddingResult::default();
        result.extend(EmbeddingResult::new(vec![vec![1.0, 0.0]]));
        result.extend(EmbeddingResult::new(vec![vec![0.0, 1.0], vec![1.0, 1.0]]));
        assert_eq!(result.len(), 3);
        assert_eq!(result.dimension, 2);
        assert_eq!(result.embeddings[1], vec![0.0, 1.0]);
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_finish_embeddings_checks_count() {
        let err = finish_embeddings(3, vec![vec![1.0], vec![2.0]], false).unwrap_err();
        assert!(matches!(
            err,
            EmbedError::CountMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_finish_embeddings_checks_dimensions() {
        assert!(finish_embeddings(2, vec![vec![1.0, 2.0], vec![1.0]], false).is_err());
        assert!(finish_embeddings(1, vec![vec![]], false).is_err());

        let result = finish_embeddings(1, vec![vec![0.0, 2.0]], true).unwrap();
        assert_eq!(result.embeddings[0], vec![0.0, 1.0]);
    }

    #[test]
    fn test_create_provider_requires_key() {
        let err = create_provider(&EmbedConfig::default()).err().unwrap();
        assert!(matches!(err, EmbedError::InvalidConfig { .. }));

        let provider = create_provider(&EmbedConfig::openai("sk-test")).unwrap();
        assert_eq!(provider.provider_name(), "openai");
        assert_eq!(provider.model_name(), "text-embedding-3-small");
    }
}
