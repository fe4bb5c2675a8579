//! Storage layer for docrag-retriever
//!
//! Chunks and their embeddings live in a single SQLite table,
//! `document_chunks`. The table is created and inspected through
//! [`schema::SchemaManager`]; rows are written and read through the
//! [`ChunkStore`] trait, implemented by [`sqlite_store::SqliteStore`].
//!
//! ## Key Components
//!
//! - **SchemaManager**: table lifecycle, introspection and bulk deletes
//! - **ChunkStore**: insert and read operations on chunk records
//! - **Data Types**: [`ChunkRecord`], [`EmbeddedChunk`], [`SourceCount`]
//!
//! ## Embedding encoding
//!
//! Embeddings are stored as BLOBs of little-endian `f32` values, so the
//! dimension of a row is its BLOB length divided by four.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;
use std::time::Duration;

pub mod schema;
pub mod sqlite_store;

/// Name of the table holding chunk records.
pub const TABLE_NAME: &str = "document_chunks";

/// Database ID for a chunk record.
pub type ChunkId = i64;

/// A persisted chunk with its embedding and provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkRecord {
    pub id: ChunkId,
    pub text: String,
    pub embedding: Vec<f32>,
    pub source_file: String,
    pub split_strategy: String,
    pub created_at: NaiveDateTime,
}

impl ChunkRecord {
    /// First `max_chars` characters of the text on a single line.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self
            .text
            .chars()
            .take(max_chars)
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .collect();
        if self.text.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview
    }
}

/// Chunk text paired with its embedding, ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub text: String,
    pub embedding: Vec<f32>,
}

impl EmbeddedChunk {
    pub fn new(text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            embedding,
        }
    }
}

/// Number of stored chunks for one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCount {
    pub source_file: String,
    pub chunks: u64,
}

/// Result of an operation that requires operator confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Destructive {
    /// The operation ran and affected this many rows.
    Done { rows: u64 },
    /// Confirmation was not given; nothing was touched.
    Declined,
}

/// Read and write operations on chunk records.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Insert one record per chunk in a single transaction and return the
    /// assigned ids in input order. Any failure rolls back the whole call.
    async fn insert_many(
        &self,
        chunks: &[EmbeddedChunk],
        source_file: &str,
        split_strategy: &str,
    ) -> Result<Vec<ChunkId>>;

    /// Every record, ordered by id.
    async fn query_all(&self) -> Result<Vec<ChunkRecord>>;

    /// Records for one source file, ordered by id.
    async fn query_by_source(&self, source_file: &str) -> Result<Vec<ChunkRecord>>;

    /// Up to `limit` records, optionally restricted to one source file.
    async fn sample(&self, source_file: Option<&str>, limit: usize) -> Result<Vec<ChunkRecord>>;

    /// Record counts grouped by source file, ordered by file name.
    async fn counts_by_source(&self) -> Result<Vec<SourceCount>>;

    /// Delete the records of one source file and return how many were removed.
    async fn delete_by_source(&self, source_file: &str) -> Result<u64>;

    /// Delete every record when `confirmed` is true.
    async fn delete_all(&self, confirmed: bool) -> Result<Destructive>;
}

/// Open a connection pool for `database`.
///
/// Accepts `sqlite:` URLs, `:memory:` and plain file paths. File databases
/// are created when missing and run in WAL mode.
pub async fn connect(database: &str) -> Result<SqlitePool> {
    if database == ":memory:" || database == "sqlite::memory:" {
        return open_memory().await;
    }

    let options = if database.starts_with("sqlite:") {
        SqliteConnectOptions::from_str(database)
            .with_context(|| format!("Invalid database URL '{database}'"))?
    } else {
        SqliteConnectOptions::new().filename(database)
    };

    let pool = SqlitePool::connect_with(
        options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true),
    )
    .await
    .with_context(|| format!("Failed to open database '{database}'"))?;

    tracing::debug!("Opened database {}", database);
    Ok(pool)
}

/// Open a private in-memory database, mostly for tests.
pub async fn open_memory() -> Result<SqlitePool> {
    // A single long-lived connection keeps the in-memory database alive.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .context("Failed to open in-memory database")?;
    Ok(pool)
}

/// Encode an embedding as little-endian `f32` bytes.
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let words: Vec<u32> = embedding.iter().map(|x| x.to_bits().to_le()).collect();
    bytemuck::cast_slice::<u32, u8>(&words).to_vec()
}

/// Decode a BLOB written by [`encode_embedding`].
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        bail!(
            "Embedding blob of {} bytes is not a sequence of f32 values",
            bytes.len()
        );
    }
    // Blobs fetched from SQLite carry no alignment guarantee.
    Ok(bytes
        .chunks_exact(4)
        .map(|word| f32::from_bits(u32::from_le(bytemuck::pod_read_unaligned(word))))
        .collect())
}
