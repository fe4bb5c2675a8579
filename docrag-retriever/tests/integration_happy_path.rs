//! Ingest a document into an on-disk database, reopen it and ask a question.

use anyhow::Result;
use async_trait::async_trait;
use docrag_context::{SplitterConfig, TextSplitter};
use docrag_embed::{BatchEmbedder, EmbeddingProvider, EmbeddingResult};
use docrag_retriever::answer::{Answerer, ChatProvider};
use docrag_retriever::pipeline::{IngestPipeline, IngestStatus, QueryPipeline};
use docrag_retriever::retrieval::Retriever;
use docrag_retriever::storage::ChunkStore;
use docrag_retriever::storage::sqlite_store::SqliteStore;
use std::sync::Arc;
use std::time::Duration;

/// Embeds text as letter frequencies over a..e.
struct LetterEmbedder;

impl LetterEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        ('a'..='e')
            .map(|c| text.chars().filter(|t| *t == c).count() as f32)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    async fn embed_text(&self, text: &str) -> docrag_embed::Result<Vec<f32>> {
        Ok(Self::vector(text))
    }

    async fn embed_texts(&self, texts: &[String]) -> docrag_embed::Result<EmbeddingResult> {
        Ok(EmbeddingResult::new(
            texts.iter().map(|t| Self::vector(t)).collect(),
        ))
    }

    fn provider_name(&self) -> &str {
        "letters"
    }

    fn model_name(&self) -> &str {
        "letters-a-e"
    }
}

/// Answers with the first line of the first context block.
struct FirstContextChat;

#[async_trait]
impl ChatProvider for FirstContextChat {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let first = prompt
            .split("Context 1:\n")
            .nth(1)
            .and_then(|rest| rest.lines().next())
            .unwrap_or_default();
        Ok(format!("From context: {first}"))
    }

    fn model_name(&self) -> &str {
        "first-context"
    }
}

fn embedder() -> BatchEmbedder {
    BatchEmbedder::new(Arc::new(LetterEmbedder)).with_batch_delay(Duration::ZERO)
}

#[tokio::test]
async fn test_ingest_reopen_and_query() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let db = temp_dir.path().join("docrag.db").to_string_lossy().into_owned();

    // 600 'a's then 540 'b's: two windows of 600 with 60 shared characters
    let document = format!("{}{}", "a".repeat(600), "b".repeat(540));
    let doc_path = temp_dir.path().join("letters.txt");
    tokio::fs::write(&doc_path, &document).await?;

    {
        let store = Arc::new(SqliteStore::open(&db).await?);
        let splitter = TextSplitter::new(SplitterConfig::default())?;
        let report = IngestPipeline::new(splitter, embedder(), store)
            .ingest(&doc_path)
            .await;

        assert_eq!(report.status, IngestStatus::Completed);
        assert_eq!(report.chunks, 2);
        assert_eq!(report.stored, 2);
        assert_eq!(report.split_strategy, "fixed_size_600_60");
    }

    let store = Arc::new(SqliteStore::open(&db).await?);
    let records = store.query_all().await?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].text, document[..600]);
    assert_eq!(records[1].text, document[540..]);
    assert!(records.iter().all(|r| r.source_file == "letters.txt"));
    assert_eq!(records[0].embedding, vec![600.0, 0.0, 0.0, 0.0, 0.0]);

    let pipeline = QueryPipeline::new(
        embedder(),
        Retriever::new(store),
        Answerer::new(Arc::new(FirstContextChat)),
    );
    let report = pipeline.ask("bbb", 1).await;

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].record.id, records[1].id);
    assert!(report.answer.starts_with("From context: aaaa"));
    Ok(())
}

#[tokio::test]
async fn test_reingest_after_delete() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let doc_path = temp_dir.path().join("notes.md");
    tokio::fs::write(&doc_path, "A bad cab.\n\nDecade ace.").await?;

    let store = Arc::new(SqliteStore::open_memory().await?);
    let pipeline = IngestPipeline::new(
        TextSplitter::new(SplitterConfig::new(12, 2)?)?,
        embedder(),
        store.clone(),
    );

    let first = pipeline.ingest(&doc_path).await;
    assert_eq!(first.status, IngestStatus::Completed);
    // no deduplication: a second run stores the chunks again
    let second = pipeline.ingest(&doc_path).await;
    assert_eq!(store.query_all().await?.len(), first.stored + second.stored);

    assert_eq!(
        store.delete_by_source("notes.md").await?,
        (first.stored + second.stored) as u64
    );
    assert!(store.query_all().await?.is_empty());
    Ok(())
}
