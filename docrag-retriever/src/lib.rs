//! docrag-retriever: document question answering over a SQLite chunk store
//!
//! Documents are split into overlapping chunks, embedded through a hosted
//! embedding service and stored with their vectors in SQLite. Questions are
//! embedded the same way, matched against every stored chunk by cosine
//! similarity, and the best chunks are handed to a chat model as context.
//!
//! ## Key Modules
//!
//! - **[`storage`]**: table management and the chunk store
//! - **[`retrieval`]**: cosine similarity and top-k search
//! - **[`answer`]**: prompt construction and chat completion
//! - **[`ingest`]**: page text extraction from PDFs and text files
//! - **[`pipeline`]**: ingest and query flows with their reports
//! - **[`config`]**: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docrag_context::{SplitterConfig, TextSplitter};
//! use docrag_embed::{BatchEmbedder, EmbedConfig, create_provider};
//! use docrag_retriever::pipeline::IngestPipeline;
//! use docrag_retriever::storage::sqlite_store::SqliteStore;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = Arc::new(SqliteStore::open("docrag.db").await?);
//! let config = EmbedConfig::gemini(std::env::var("GEMINI_API_KEY")?);
//! let embedder = BatchEmbedder::from_config(create_provider(&config)?, &config);
//! let splitter = TextSplitter::new(SplitterConfig::default())?;
//!
//! let report = IngestPipeline::new(splitter, embedder, store)
//!     .ingest(Path::new("recipes.pdf"))
//!     .await;
//! println!("stored {} chunks", report.stored);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! PDF → pages → TextSplitter → BatchEmbedder → SqliteStore
//!                                                  ↓
//! question → embed_query → Retriever (full scan) → Answerer → answer
//! ```

pub mod answer;
pub mod config;
pub mod confirm;
pub mod ingest;
pub mod pipeline;
pub mod retrieval;
pub mod storage;
