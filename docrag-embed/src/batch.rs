//! Rate-limited batching on top of an [`EmbeddingProvider`]

use crate::config::{DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE, EmbedConfig};
use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult};
use std::sync::Arc;
use std::time::Duration;

/// What a batch run produced.
///
/// `result` always holds the vectors of every batch that succeeded, aligned
/// with the leading texts of the input. When a batch fails the run stops and
/// the error is kept in `failure`.
#[derive(Debug)]
pub struct BatchOutcome {
    pub result: EmbeddingResult,
    pub failure: Option<EmbedError>,
    /// Number of texts that were submitted
    pub requested: usize,
}

impl BatchOutcome {
    /// Every input text received a vector
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.result.len() == self.requested
    }

    /// Number of input texts without a vector
    pub fn missing(&self) -> usize {
        self.requested.saturating_sub(self.result.len())
    }
}

/// Sends texts to a provider in fixed-size groups with a pause in between
#[derive(Clone)]
pub struct BatchEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    batch_delay: Duration,
}

impl std::fmt::Debug for BatchEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEmbedder")
            .field("provider", &self.provider.provider_name())
            .field("model", &self.provider.model_name())
            .field("batch_size", &self.batch_size)
            .field("batch_delay", &self.batch_delay)
            .finish()
    }
}

impl BatchEmbedder {
    /// Wrap a provider with the default policy (2 texts, 2 seconds apart)
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }

    /// Wrap a provider using the batching settings of `config`
    pub fn from_config(provider: Arc<dyn EmbeddingProvider>, config: &EmbedConfig) -> Self {
        Self::new(provider)
            .with_batch_size(config.batch_size)
            .with_batch_delay(config.batch_delay)
    }

    /// Set the batch size. Zero is treated as one.
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            ..self
        }
    }

    pub fn with_batch_delay(self, batch_delay: Duration) -> Self {
        Self {
            batch_delay,
            ..self
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embed `texts` batch by batch.
    ///
    /// Never returns an error directly: a failing batch ends the run and is
    /// reported through [`BatchOutcome::failure`] alongside the vectors of the
    /// batches before it. A batch whose dimension differs from earlier ones is
    /// treated as a failure.
    pub async fn embed_batch(&self, texts: &[String]) -> BatchOutcome {
        let mut result = EmbeddingResult::default();
        let total_batches = texts.len().div_ceil(self.batch_size);

        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            tracing::info!(
                "Processing batch {}/{} ({} texts)",
                i + 1,
                total_batches,
                batch.len()
            );

            let embedded = match self.provider.embed_texts(batch).await {
                Ok(embedded) => embedded,
                Err(e) => {
                    tracing::error!("Embedding batch {}/{} failed: {}", i + 1, total_batches, e);
                    return BatchOutcome {
                        result,
                        failure: Some(e),
                        requested: texts.len(),
                    };
                }
            };

            if !result.is_empty() && embedded.dimension != result.dimension {
                let message = format!(
                    "batch {} returned dimension {}, expected {}",
                    i + 1,
                    embedded.dimension,
                    result.dimension
                );
                tracing::error!("{}", message);
                return BatchOutcome {
                    result,
                    failure: Some(EmbedError::malformed(message)),
                    requested: texts.len(),
                };
            }
            result.extend(embedded);

            if i + 1 < total_batches && !self.batch_delay.is_zero() {
                tracing::debug!("Waiting {:?} before next batch", self.batch_delay);
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        BatchOutcome {
            result,
            failure: None,
            requested: texts.len(),
        }
    }

    /// Embed a single query with the same provider and model as the documents
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        tracing::debug!("Embedding query ({} chars)", text.chars().count());
        self.provider.embed_text(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::time::Instant;
    use tracing_test::traced_test;

    /// Returns `[len, index]` vectors and records the size of every call
    struct MockProvider {
        calls: Mutex<Vec<usize>>,
        fail_on_call: Option<usize>,
        dimension_per_call: Option<Vec<usize>>,
    }

    impl MockProvider {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on_call: None,
                dimension_per_call: None,
            }
        }

        fn failing_on(call: usize) -> Self {
            Self {
                fail_on_call: Some(call),
                ..Self::new()
            }
        }

        fn calls(&self) -> Vec<usize> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockProvider {
        async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
            if self.fail_on_call == Some(0) {
                return Err(EmbedError::Api {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            Ok(vec![text.len() as f32, 1.0])
        }

        async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(texts.len());
                calls.len() - 1
            };
            if self.fail_on_call == Some(call) {
                return Err(EmbedError::Api {
                    status: 429,
                    body: "quota exceeded".to_string(),
                });
            }
            let dimension = self
                .dimension_per_call
                .as_ref()
                .map(|d| d[call])
                .unwrap_or(2);
            Ok(EmbeddingResult::new(
                texts
                    .iter()
                    .map(|t| {
                        let mut v = vec![0.0; dimension];
                        v[0] = t.len() as f32;
                        v
                    })
                    .collect(),
            ))
        }

        fn provider_name(&self) -> &str {
            "mock"
        }

        fn model_name(&self) -> &str {
            "mock-model"
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (1..=n).map(|i| "x".repeat(i)).collect()
    }

    #[tokio::test]
    async fn test_batches_of_two_keep_order() {
        let provider = Arc::new(MockProvider::new());
        let embedder = BatchEmbedder::new(provider.clone()).with_batch_delay(Duration::ZERO);

        let outcome = embedder.embed_batch(&texts(5)).await;

        assert_eq!(provider.calls(), vec![2, 2, 1]);
        assert!(outcome.is_complete());
        assert_eq!(outcome.missing(), 0);
        let firsts: Vec<f32> = outcome.result.embeddings.iter().map(|v| v[0]).collect();
        assert_eq!(firsts, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_partial_failure_keeps_earlier_batches() {
        let provider = Arc::new(MockProvider::failing_on(1));
        let embedder = BatchEmbedder::new(provider.clone()).with_batch_delay(Duration::ZERO);

        let outcome = embedder.embed_batch(&texts(5)).await;

        assert_eq!(provider.calls(), vec![2, 2]);
        assert!(!outcome.is_complete());
        assert_eq!(outcome.result.len(), 2);
        assert_eq!(outcome.missing(), 3);
        assert!(matches!(
            outcome.failure,
            Some(EmbedError::Api { status: 429, .. })
        ));
        assert!(logs_contain("Embedding batch 2/3 failed"));
    }

    #[tokio::test]
    async fn test_dimension_change_stops_run() {
        let provider = Arc::new(MockProvider {
            dimension_per_call: Some(vec![2, 3, 2]),
            ..MockProvider::new()
        });
        let embedder = BatchEmbedder::new(provider).with_batch_delay(Duration::ZERO);

        let outcome = embedder.embed_batch(&texts(5)).await;

        assert_eq!(outcome.result.len(), 2);
        assert!(matches!(
            outcome.failure,
            Some(EmbedError::MalformedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let provider = Arc::new(MockProvider::new());
        let embedder = BatchEmbedder::new(provider.clone());

        let outcome = embedder.embed_batch(&[]).await;

        assert!(provider.calls().is_empty());
        assert!(outcome.is_complete());
        assert!(outcome.result.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_batches_only() {
        let provider = Arc::new(MockProvider::new());
        let embedder = BatchEmbedder::new(provider).with_batch_delay(Duration::from_secs(2));

        let start = Instant::now();
        let outcome = embedder.embed_batch(&texts(6)).await;

        assert!(outcome.is_complete());
        // three batches, two pauses
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_batch_has_no_delay() {
        let provider = Arc::new(MockProvider::new());
        let embedder = BatchEmbedder::new(provider);

        let start = Instant::now();
        embedder.embed_batch(&texts(2)).await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_embed_query() {
        let embedder = BatchEmbedder::new(Arc::new(MockProvider::new()));
        assert_eq!(embedder.embed_query("abc").await.unwrap(), vec![3.0, 1.0]);

        let failing = BatchEmbedder::new(Arc::new(MockProvider::failing_on(0)));
        let err = failing.embed_query("abc").await.unwrap_err();
        assert!(matches!(err, EmbedError::Api { status: 503, .. }));
    }

    #[test]
    fn test_from_config() {
        let provider = Arc::new(MockProvider::new());
        let config = EmbedConfig::gemini("key").with_batch_size(0);
        let embedder = BatchEmbedder::from_config(provider, &config);
        assert_eq!(embedder.batch_size(), 1);
    }
}
