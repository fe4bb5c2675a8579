//! Ingest and query pipelines
//!
//! Both pipelines wire the components together and absorb their failures
//! into a report, so the entry point always gets something to print.
//!
//! ```text
//! ingest: file → pages → chunks → embeddings → store
//! query:  question → embedding → top-k chunks → answer
//! ```

use crate::answer::{Answerer, NO_RELEVANT_INFORMATION};
use crate::ingest::load_document;
use crate::retrieval::{Retriever, ScoredChunk};
use crate::storage::{ChunkStore, EmbeddedChunk};
use docrag_context::TextSplitter;
use docrag_embed::{BatchEmbedder, EmbedError};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// How an ingestion run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum IngestStatus {
    /// Every chunk was embedded and stored.
    Completed,
    /// Embedding stopped early; the chunks embedded before that were stored.
    Partial,
    /// The document had no pages or no text.
    NothingToIndex,
    /// Nothing was stored.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub source_file: String,
    pub split_strategy: String,
    pub pages: usize,
    pub chunks: usize,
    pub embedded: usize,
    pub stored: usize,
    pub status: IngestStatus,
    /// Error that cut embedding short, for partial runs
    pub warning: Option<String>,
}

impl IngestReport {
    fn new(source_file: String, split_strategy: String) -> Self {
        Self {
            source_file,
            split_strategy,
            pages: 0,
            chunks: 0,
            embedded: 0,
            stored: 0,
            status: IngestStatus::NothingToIndex,
            warning: None,
        }
    }
}

/// Load, chunk, embed and store one document.
#[derive(Clone)]
pub struct IngestPipeline {
    splitter: Arc<TextSplitter>,
    embedder: BatchEmbedder,
    store: Arc<dyn ChunkStore>,
}

impl IngestPipeline {
    pub fn new(splitter: TextSplitter, embedder: BatchEmbedder, store: Arc<dyn ChunkStore>) -> Self {
        Self {
            splitter: Arc::new(splitter),
            embedder,
            store,
        }
    }

    /// Index the document at `path` under its file name.
    pub async fn ingest(&self, path: &Path) -> IngestReport {
        let source_file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut report = IngestReport::new(source_file, self.splitter.strategy_label());
        tracing::info!("Processing document: {}", path.display());

        let pages = load_document(path).await;
        report.pages = pages.len();
        if pages.is_empty() {
            tracing::warn!("No pages loaded from {}", path.display());
            return report;
        }

        let texts: Vec<String> = pages
            .iter()
            .flat_map(|page| self.splitter.split(&page.text))
            .map(|chunk| chunk.text.to_string())
            .collect();
        report.chunks = texts.len();
        tracing::info!("Created {} chunks from {} pages", texts.len(), pages.len());
        if texts.is_empty() {
            return report;
        }

        let outcome = self.embedder.embed_batch(&texts).await;
        report.embedded = outcome.result.len();
        let complete = outcome.is_complete();
        if let Some(e) = &outcome.failure {
            report.warning = Some(describe_embed_failure(e));
        }
        if outcome.result.is_empty() {
            let message = report
                .warning
                .clone()
                .unwrap_or_else(|| "no embeddings were produced".to_string());
            tracing::error!("Embedding failed for {}: {}", report.source_file, message);
            report.status = IngestStatus::Failed(message);
            return report;
        }
        if !complete {
            tracing::warn!(
                "Only {} of {} chunks were embedded; storing those",
                report.embedded,
                report.chunks
            );
        }

        // Pair each vector with its chunk; chunks without a vector are dropped.
        let chunks: Vec<EmbeddedChunk> = texts
            .into_iter()
            .zip(outcome.result.embeddings)
            .map(|(text, embedding)| EmbeddedChunk { text, embedding })
            .collect();

        match self
            .store
            .insert_many(&chunks, &report.source_file, &report.split_strategy)
            .await
        {
            Ok(ids) => {
                report.stored = ids.len();
                report.status = if complete {
                    IngestStatus::Completed
                } else {
                    IngestStatus::Partial
                };
                tracing::info!("Document processing complete: {}", report.source_file);
            }
            Err(e) => {
                tracing::error!("Error storing chunks: {:#}", e);
                report.status = IngestStatus::Failed(format!("{e:#}"));
            }
        }
        report
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryReport {
    pub question: String,
    pub results: Vec<ScoredChunk>,
    pub answer: String,
    /// Why retrieval produced nothing, when it failed
    pub failure: Option<String>,
}

/// Embed a question, retrieve its top chunks and answer it.
#[derive(Clone)]
pub struct QueryPipeline {
    embedder: BatchEmbedder,
    retriever: Retriever,
    answerer: Answerer,
}

impl QueryPipeline {
    pub fn new(embedder: BatchEmbedder, retriever: Retriever, answerer: Answerer) -> Self {
        Self {
            embedder,
            retriever,
            answerer,
        }
    }

    pub async fn ask(&self, question: &str, top_k: usize) -> QueryReport {
        let question = question.trim();
        tracing::info!("Searching for: '{}'", question);

        match self.retrieve(question, top_k).await {
            Ok(results) => {
                tracing::info!("Found {} relevant chunks", results.len());
                let answer = self.answerer.generate(question, &results).await;
                QueryReport {
                    question: question.to_string(),
                    results,
                    answer,
                    failure: None,
                }
            }
            Err(message) => {
                tracing::error!("{}", message);
                QueryReport {
                    question: question.to_string(),
                    results: Vec::new(),
                    answer: NO_RELEVANT_INFORMATION.to_string(),
                    failure: Some(message),
                }
            }
        }
    }

    async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<ScoredChunk>, String> {
        if question.is_empty() {
            return Err("Question is empty".to_string());
        }
        let query_vector = self
            .embedder
            .embed_query(question)
            .await
            .map_err(|e| format!("Error embedding query: {}", describe_embed_failure(&e)))?;
        self.retriever
            .search(&query_vector, top_k)
            .await
            .map_err(|e| format!("Error searching database: {e:#}"))
    }
}

/// Tell an unreachable service apart from one that answered with an error.
fn describe_embed_failure(e: &EmbedError) -> String {
    if e.is_connectivity() {
        format!("Could not reach the embedding service: {e}")
    } else {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::{ANSWER_ERROR, ChatProvider};
    use crate::storage::sqlite_store::SqliteStore;
    use async_trait::async_trait;
    use docrag_context::SplitterConfig;
    use docrag_embed::{EmbedError, EmbeddingProvider, EmbeddingResult};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const TOPICS: [&str; 4] = ["rice", "pasta", "egg", "bread"];

    /// Counts topic words; fails every call from `fail_from` on.
    struct TopicEmbedder {
        calls: AtomicUsize,
        fail_from: Option<usize>,
    }

    impl TopicEmbedder {
        fn new(fail_from: Option<usize>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail_from,
            })
        }

        fn vector(text: &str) -> Vec<f32> {
            let lower = text.to_lowercase();
            TOPICS
                .iter()
                .map(|t| lower.matches(t).count() as f32)
                .collect()
        }
    }

    #[async_trait]
    impl EmbeddingProvider for TopicEmbedder {
        async fn embed_text(&self, text: &str) -> docrag_embed::Result<Vec<f32>> {
            if self.fail_from == Some(0) {
                return Err(EmbedError::malformed("query refused"));
            }
            Ok(Self::vector(text))
        }

        async fn embed_texts(&self, texts: &[String]) -> docrag_embed::Result<EmbeddingResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_from.is_some_and(|n| call >= n) {
                return Err(EmbedError::Api {
                    status: 429,
                    body: "quota".to_string(),
                });
            }
            Ok(EmbeddingResult::new(
                texts.iter().map(|t| Self::vector(t)).collect(),
            ))
        }

        fn provider_name(&self) -> &str {
            "topic"
        }

        fn model_name(&self) -> &str {
            "topic-counter"
        }
    }

    struct EchoChat {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatProvider for EchoChat {
        async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("answer".to_string())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn splitter(chunk_size: usize, overlap: usize) -> TextSplitter {
        TextSplitter::new(SplitterConfig::new(chunk_size, overlap).unwrap()).unwrap()
    }

    fn embedder(provider: Arc<TopicEmbedder>) -> BatchEmbedder {
        BatchEmbedder::new(provider).with_batch_delay(Duration::ZERO)
    }

    async fn write_doc(dir: &Path, name: &str, text: &str) -> anyhow::Result<std::path::PathBuf> {
        let path = dir.join(name);
        tokio::fs::write(&path, text).await?;
        Ok(path)
    }

    const DOC: &str = "Rice needs rinsing before cooking rice.\n\n\
                       Pasta goes into salted boiling water.\n\n\
                       An egg fried rice uses cold rice and one egg.\n\n\
                       Bread dough rises for an hour.";

    #[tokio::test]
    async fn test_ingest_stores_every_chunk() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = write_doc(temp_dir.path(), "recipes.txt", DOC).await?;
        let store = Arc::new(SqliteStore::open_memory().await?);
        let pipeline = IngestPipeline::new(
            splitter(60, 10),
            embedder(TopicEmbedder::new(None)),
            store.clone(),
        );

        let report = pipeline.ingest(&path).await;

        assert_eq!(report.status, IngestStatus::Completed);
        assert_eq!(report.source_file, "recipes.txt");
        assert_eq!(report.split_strategy, "fixed_size_60_10");
        assert_eq!(report.pages, 1);
        assert!(report.chunks > 1);
        assert_eq!(report.embedded, report.chunks);
        assert_eq!(report.stored, report.chunks);

        let records = store.query_all().await?;
        assert_eq!(records.len(), report.chunks);
        assert!(records.iter().all(|r| r.split_strategy == "fixed_size_60_10"));
        assert!(records.iter().all(|r| r.embedding.len() == TOPICS.len()));
        Ok(())
    }

    #[tokio::test]
    async fn test_partial_embedding_stores_prefix() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = write_doc(temp_dir.path(), "recipes.txt", DOC).await?;
        let store = Arc::new(SqliteStore::open_memory().await?);
        let pipeline = IngestPipeline::new(
            splitter(60, 10),
            embedder(TopicEmbedder::new(Some(1))),
            store.clone(),
        );

        let report = pipeline.ingest(&path).await;

        assert_eq!(report.status, IngestStatus::Partial);
        assert_eq!(report.embedded, 2);
        assert_eq!(report.stored, 2);
        assert!(report.warning.as_deref().unwrap_or_default().contains("429"));
        assert_eq!(store.query_all().await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_embedding_stores_nothing() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = write_doc(temp_dir.path(), "recipes.txt", DOC).await?;
        let store = Arc::new(SqliteStore::open_memory().await?);
        let pipeline = IngestPipeline::new(
            splitter(60, 10),
            embedder(TopicEmbedder::new(Some(0))),
            store.clone(),
        );

        let report = pipeline.ingest(&path).await;

        assert!(matches!(report.status, IngestStatus::Failed(_)));
        assert_eq!(report.stored, 0);
        assert!(store.query_all().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_nothing_to_index() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let blank = write_doc(temp_dir.path(), "blank.txt", "   \n\n  ").await?;
        let store = Arc::new(SqliteStore::open_memory().await?);
        let provider = TopicEmbedder::new(None);
        let pipeline = IngestPipeline::new(splitter(60, 10), embedder(provider.clone()), store);

        let report = pipeline.ingest(&blank).await;
        assert_eq!(report.status, IngestStatus::NothingToIndex);
        assert_eq!(report.pages, 1);
        assert_eq!(report.chunks, 0);

        let missing = pipeline.ingest(&temp_dir.path().join("missing.pdf")).await;
        assert_eq!(missing.status, IngestStatus::NothingToIndex);
        assert_eq!(missing.pages, 0);

        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_ask_ranks_and_answers() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = write_doc(temp_dir.path(), "recipes.txt", DOC).await?;
        let store = Arc::new(SqliteStore::open_memory().await?);
        let provider = TopicEmbedder::new(None);
        IngestPipeline::new(splitter(60, 10), embedder(provider.clone()), store.clone())
            .ingest(&path)
            .await;

        let chat = Arc::new(EchoChat {
            prompts: Mutex::new(Vec::new()),
        });
        let pipeline = QueryPipeline::new(
            embedder(provider),
            Retriever::new(store),
            Answerer::new(chat.clone()),
        );

        let report = pipeline.ask("How do I make pasta?", 2).await;

        assert!(report.failure.is_none());
        assert_eq!(report.results.len(), 2);
        assert!(report.results[0].record.text.contains("Pasta"));
        assert_eq!(report.answer, "answer");
        let prompts = chat.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("User Query: How do I make pasta?"));
        Ok(())
    }

    #[tokio::test]
    async fn test_ask_on_empty_store() -> anyhow::Result<()> {
        let store = Arc::new(SqliteStore::open_memory().await?);
        let chat = Arc::new(EchoChat {
            prompts: Mutex::new(Vec::new()),
        });
        let pipeline = QueryPipeline::new(
            embedder(TopicEmbedder::new(None)),
            Retriever::new(store),
            Answerer::new(chat.clone()),
        );

        let report = pipeline.ask("rice?", 3).await;

        assert!(report.results.is_empty());
        assert!(report.failure.is_none());
        assert_eq!(report.answer, NO_RELEVANT_INFORMATION);
        assert!(chat.prompts.lock().unwrap().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_ask_reports_embedding_failure() -> anyhow::Result<()> {
        let store = Arc::new(SqliteStore::open_memory().await?);
        let chat = Arc::new(EchoChat {
            prompts: Mutex::new(Vec::new()),
        });
        let pipeline = QueryPipeline::new(
            embedder(TopicEmbedder::new(Some(0))),
            Retriever::new(store),
            Answerer::new(chat),
        );

        let report = pipeline.ask("rice?", 3).await;
        assert!(report.results.is_empty());
        assert_eq!(report.answer, NO_RELEVANT_INFORMATION);
        assert_ne!(report.answer, ANSWER_ERROR);
        assert!(report.failure.unwrap().contains("query refused"));

        let blank = pipeline.ask("   ", 3).await;
        assert_eq!(blank.failure.as_deref(), Some("Question is empty"));
        Ok(())
    }

    /// Fails every call with the transport error of a refused connection.
    struct UnreachableEmbedder;

    impl UnreachableEmbedder {
        async fn refused() -> EmbedError {
            match reqwest::Client::new().get("http://127.0.0.1:1/").send().await {
                Err(e) => EmbedError::from(e),
                Ok(_) => EmbedError::malformed("port 1 unexpectedly answered"),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for UnreachableEmbedder {
        async fn embed_text(&self, _text: &str) -> docrag_embed::Result<Vec<f32>> {
            Err(Self::refused().await)
        }

        async fn embed_texts(&self, _texts: &[String]) -> docrag_embed::Result<EmbeddingResult> {
            Err(Self::refused().await)
        }

        fn provider_name(&self) -> &str {
            "unreachable"
        }

        fn model_name(&self) -> &str {
            "none"
        }
    }

    #[tokio::test]
    async fn test_unreachable_service_is_reported_as_connectivity() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = write_doc(temp_dir.path(), "recipes.txt", DOC).await?;
        let store = Arc::new(SqliteStore::open_memory().await?);
        let embedder =
            BatchEmbedder::new(Arc::new(UnreachableEmbedder)).with_batch_delay(Duration::ZERO);

        let report = IngestPipeline::new(splitter(60, 10), embedder.clone(), store.clone())
            .ingest(&path)
            .await;
        match &report.status {
            IngestStatus::Failed(message) => {
                assert!(message.starts_with("Could not reach the embedding service"))
            }
            other => panic!("unexpected status {other:?}"),
        }
        assert!(store.query_all().await?.is_empty());

        let chat = Arc::new(EchoChat {
            prompts: Mutex::new(Vec::new()),
        });
        let query = QueryPipeline::new(embedder, Retriever::new(store), Answerer::new(chat));
        let answer = query.ask("rice?", 3).await;
        assert_eq!(answer.answer, NO_RELEVANT_INFORMATION);
        assert!(
            answer
                .failure
                .unwrap()
                .contains("Could not reach the embedding service")
        );
        Ok(())
    }

    #[test]
    fn test_service_errors_are_not_connectivity() {
        let e = EmbedError::Api {
            status: 429,
            body: "quota".to_string(),
        };
        assert_eq!(describe_embed_failure(&e), "Embedding service returned 429: quota");
    }
}
