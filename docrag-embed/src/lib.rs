//! # docrag-embed
//!
//! Text embeddings from hosted embedding services, with the batching policy
//! used during document ingestion.
//!
//! ## Quick Start
//!
//! ```no_run
//! use docrag_embed::{BatchEmbedder, EmbedConfig, create_provider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = EmbedConfig::gemini(std::env::var("GEMINI_API_KEY")?);
//! let provider = create_provider(&config)?;
//! let embedder = BatchEmbedder::from_config(provider, &config);
//!
//! let texts = vec!["Hello world".to_string(), "How are you?".to_string()];
//! let outcome = embedder.embed_batch(&texts).await;
//! println!("embedded {} of {} texts", outcome.result.len(), texts.len());
//!
//! let query = embedder.embed_query("greetings").await?;
//! println!("query dimension {}", query.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`]: provider selection, credentials and batching settings
//! - [`provider`]: the [`EmbeddingProvider`] trait and shared helpers
//! - [`gemini`] / [`openai`]: HTTP implementations of the trait
//! - [`batch`]: [`BatchEmbedder`], fixed-size batches with a pause in between
//! - [`error`]: error types and result handling
//!
//! ## Error Handling
//!
//! Provider calls return [`Result<T>`] with [`EmbedError`]. Batch runs never
//! fail outright; see [`BatchOutcome`].

pub mod batch;
pub mod config;
pub mod error;
pub mod gemini;
pub mod openai;
pub mod provider;

// Re-export main types for easy access
pub use batch::{BatchEmbedder, BatchOutcome};
pub use config::{EmbedConfig, EmbedConfigBuilder, ProviderKind};
pub use error::{EmbedError, Result};
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use provider::{EmbeddingProvider, EmbeddingResult, create_provider, normalize};
