//! SQLite implementation of [`ChunkStore`]
//!
//! Writes go through one explicit transaction per call; reads are plain
//! queries on the pool. Delete operations are delegated to the
//! [`SchemaManager`] so both entry points share the same statements.

use super::schema::SchemaManager;
use super::{
    ChunkId, ChunkRecord, ChunkStore, Destructive, EmbeddedChunk, SourceCount, decode_embedding,
    encode_embedding,
};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const SELECT_COLUMNS: &str =
    "SELECT id, chunk_content, embedding, source_file, chunking_method, created_at FROM document_chunks";

/// SQLite-backed chunk store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    schema: SchemaManager,
}

impl SqliteStore {
    /// Wrap a pool. The table is created if it does not exist yet.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        let schema = SchemaManager::new(pool.clone());
        schema.ensure_table().await?;
        Ok(Self { pool, schema })
    }

    /// Open `database` (see [`super::connect`]) and wrap it.
    pub async fn open(database: &str) -> Result<Self> {
        Self::new(super::connect(database).await?).await
    }

    /// Store on a fresh in-memory database, mostly for tests.
    pub async fn open_memory() -> Result<Self> {
        Self::new(super::open_memory().await?).await
    }

    pub fn schema(&self) -> &SchemaManager {
        &self.schema
    }

    fn row_to_record(row: &SqliteRow) -> Result<ChunkRecord> {
        let id: i64 = row.get("id");
        let bytes: Vec<u8> = row.get("embedding");
        let embedding =
            decode_embedding(&bytes).with_context(|| format!("Corrupt embedding in chunk {id}"))?;
        Ok(ChunkRecord {
            id,
            text: row.get("chunk_content"),
            embedding,
            source_file: row.get("source_file"),
            split_strategy: row.get("chunking_method"),
            created_at: row.try_get("created_at")?,
        })
    }

    fn rows_to_records(rows: &[SqliteRow]) -> Result<Vec<ChunkRecord>> {
        rows.iter().map(Self::row_to_record).collect()
    }
}

/// Check a batch before it reaches the database and return its dimension.
fn validate_batch(chunks: &[EmbeddedChunk]) -> Result<usize> {
    let Some(first) = chunks.first() else {
        return Ok(0);
    };
    let dimension = first.embedding.len();
    for (i, chunk) in chunks.iter().enumerate() {
        if chunk.text.is_empty() {
            bail!("Chunk {i} has empty text");
        }
        if chunk.embedding.is_empty() {
            bail!("Chunk {i} has an empty embedding");
        }
        if chunk.embedding.len() != dimension {
            bail!(
                "Chunk {i} has dimension {}, expected {dimension}",
                chunk.embedding.len()
            );
        }
    }
    Ok(dimension)
}

#[async_trait]
impl ChunkStore for SqliteStore {
    async fn insert_many(
        &self,
        chunks: &[EmbeddedChunk],
        source_file: &str,
        split_strategy: &str,
    ) -> Result<Vec<ChunkId>> {
        let dimension = validate_batch(chunks)?;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;

        let stored_bytes: Option<i64> =
            sqlx::query_scalar("SELECT length(embedding) FROM document_chunks LIMIT 1")
                .fetch_optional(&mut *tx)
                .await?;
        if let Some(bytes) = stored_bytes {
            let stored_dimension = bytes as usize / 4;
            if stored_dimension != dimension {
                bail!(
                    "Embedding dimension {dimension} does not match stored dimension {stored_dimension}"
                );
            }
        }

        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let result = sqlx::query(
                r#"
                INSERT INTO document_chunks (chunk_content, embedding, source_file, chunking_method)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&chunk.text)
            .bind(encode_embedding(&chunk.embedding))
            .bind(source_file)
            .bind(split_strategy)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert chunk from '{source_file}'"))?;
            ids.push(result.last_insert_rowid());
        }

        tx.commit().await?;
        tracing::info!(
            "Stored {} chunks from {} ({})",
            ids.len(),
            source_file,
            split_strategy
        );
        Ok(ids)
    }

    async fn query_all(&self) -> Result<Vec<ChunkRecord>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .context("Failed to read chunks")?;
        Self::rows_to_records(&rows)
    }

    async fn query_by_source(&self, source_file: &str) -> Result<Vec<ChunkRecord>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} WHERE source_file = ?1 ORDER BY id"))
            .bind(source_file)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to read chunks of '{source_file}'"))?;
        Self::rows_to_records(&rows)
    }

    async fn sample(&self, source_file: Option<&str>, limit: usize) -> Result<Vec<ChunkRecord>> {
        let rows = match source_file {
            Some(source) => {
                sqlx::query(&format!(
                    "{SELECT_COLUMNS} WHERE source_file = ?1 ORDER BY id LIMIT ?2"
                ))
                .bind(source)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY id LIMIT ?1"))
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .context("Failed to sample chunks")?;
        Self::rows_to_records(&rows)
    }

    async fn counts_by_source(&self) -> Result<Vec<SourceCount>> {
        let rows = sqlx::query(
            "SELECT source_file, COUNT(*) AS chunks FROM document_chunks GROUP BY source_file ORDER BY source_file",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to count chunks per source")?;

        Ok(rows
            .iter()
            .map(|row| {
                let chunks: i64 = row.get("chunks");
                SourceCount {
                    source_file: row.get("source_file"),
                    chunks: chunks as u64,
                }
            })
            .collect())
    }

    async fn delete_by_source(&self, source_file: &str) -> Result<u64> {
        self.schema.delete_by_source(source_file).await
    }

    async fn delete_all(&self, confirmed: bool) -> Result<Destructive> {
        self.schema.delete_all(confirmed).await
    }
}
