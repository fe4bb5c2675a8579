//! Brute-force top-k search over every stored chunk

use super::similarity::cosine_similarity;
use crate::storage::{ChunkRecord, ChunkStore};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

/// A stored chunk together with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub record: ChunkRecord,
    pub score: f32,
}

/// Ranks stored chunks against a query vector.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn ChunkStore>,
}

impl Retriever {
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        Self { store }
    }

    /// The `top_k` records most similar to `query`, best first.
    ///
    /// Ties keep the order of the scan (ascending id). Records whose
    /// dimension differs from the query are skipped.
    pub async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let records = self.store.query_all().await?;
        let total = records.len();
        Ok(rank(query, records, top_k, total))
    }
}

fn rank(query: &[f32], records: Vec<ChunkRecord>, top_k: usize, total: usize) -> Vec<ScoredChunk> {
    let mut skipped = 0usize;
    let mut scored: Vec<ScoredChunk> = records
        .into_iter()
        .filter_map(|record| match cosine_similarity(query, &record.embedding) {
            Some(score) => Some(ScoredChunk { record, score }),
            None => {
                skipped += 1;
                None
            }
        })
        .collect();

    if skipped > 0 {
        tracing::warn!(
            "Skipped {} of {} chunks whose dimension differs from the query ({})",
            skipped,
            total,
            query.len()
        );
    }

    // sort_by is stable, so equal scores stay in id order
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);

    tracing::debug!("Ranked {} chunks, returning {}", total - skipped, scored.len());
    scored
}
