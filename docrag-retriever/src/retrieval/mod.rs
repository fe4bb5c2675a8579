//! Query-time retrieval: similarity scoring and top-k ranking

pub mod search;
pub mod similarity;

pub use search::{Retriever, ScoredChunk};
pub use similarity::cosine_similarity;
