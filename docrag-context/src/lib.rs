pub mod text;

// Re-export the splitter types for external use
pub use text::{
    Chunks, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, SplitterConfig, SplitterError, TextChunk,
    TextSplitter,
};
