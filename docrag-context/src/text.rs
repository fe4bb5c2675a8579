//! Splitting extracted document text into overlapping, bounded chunks.
//!
//! The goal is to turn the text of a document page into a sequence of
//! passages that an embedding model can digest, while keeping natural units of
//! text (paragraphs, sentences, words) intact whenever they fit.
//!
//! The module defines three main pieces:
//! - [`SplitterConfig`]: chunk size and overlap, both counted in characters.
//! - [`TextSplitter`]: holds the configuration and the ordered delimiter set.
//! - [`Chunks`]: a lazy iterator over [`TextChunk`]s, produced by
//!   [`TextSplitter::split`].
//!
//! # Splitting rules
//!
//! Chunks are produced as a sliding window over the text. For each window the
//! splitter looks for a place to end the chunk, trying the delimiters in order
//! of significance:
//!
//! 1. paragraph breaks (a blank line),
//! 2. sentence ends (`.`, `!` or `?` followed by whitespace),
//! 3. line breaks,
//! 4. any whitespace,
//!
//! and uses the *last* match of the first delimiter that occurs in the window.
//! When no delimiter occurs, the chunk is cut hard at `chunk_size` characters.
//! The next chunk starts exactly `overlap` characters before the end of the
//! previous one, so consecutive chunks always share `overlap` characters.
//! The one exception is a whitespace run longer than a window: windows that
//! would hold only whitespace are skipped and the next chunk starts at the
//! following visible character.
//!
//! ```
//! use docrag_context::text::{SplitterConfig, TextSplitter};
//!
//! let splitter = TextSplitter::new(SplitterConfig::new(20, 5).unwrap()).unwrap();
//! let text = "First sentence here. Second sentence follows.";
//!
//! let chunks: Vec<_> = splitter.split(text).collect();
//! assert!(chunks.len() > 1);
//! for chunk in &chunks {
//!     assert!(chunk.char_len() <= 20);
//! }
//! // Consecutive chunks share exactly five characters.
//! assert_eq!(chunks[1].start, chunks[0].end - 5);
//! ```
use regex::Regex;
use serde::Serialize;
use std::iter::FusedIterator;

/// Default maximum number of characters per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 600;

/// Default number of characters shared by consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 60;

/// Delimiters for prose extracted from documents, most significant first.
///
/// - `\n\s*\n`: paragraph breaks (blank lines, possibly containing spaces).
/// - `[.!?]["')\]]*\s+`: sentence ends, including closing quotes or brackets.
/// - `\n`: single line breaks.
/// - `\s+`: any run of whitespace, the last resort before a hard cut.
pub const DOCUMENT_DELIMITERS: &[&str] = &[
    r"\n\s*\n",           // Paragraphs
    r#"[.!?]["')\]]*\s+"#, // Sentences
    r"\n",                // Line breaks
    r"\s+",               // Words
];

/// Errors raised while configuring a [`TextSplitter`].
#[derive(Debug, thiserror::Error)]
pub enum SplitterError {
    /// A chunk must hold at least one character.
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    /// The overlap must leave room for new text in every chunk.
    #[error("overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },

    /// A delimiter pattern failed to compile.
    #[error("invalid delimiter pattern {pattern:?}: {source}")]
    InvalidDelimiter {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Chunk size and overlap, both measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitterConfig {
    /// Maximum number of characters per chunk
    pub chunk_size: usize,
    /// Number of characters repeated at the start of each following chunk
    pub overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl SplitterConfig {
    /// Create a validated configuration.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, SplitterError> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that `chunk_size > 0` and `overlap < chunk_size`.
    pub fn validate(&self) -> Result<(), SplitterError> {
        if self.chunk_size == 0 {
            return Err(SplitterError::ZeroChunkSize);
        }
        if self.overlap >= self.chunk_size {
            return Err(SplitterError::OverlapTooLarge {
                chunk_size: self.chunk_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    /// Label stored alongside every chunk produced with this configuration.
    ///
    /// The label depends only on the two parameters, so re-running ingestion
    /// with the same settings always produces the same label.
    pub fn strategy_label(&self) -> String {
        format!("fixed_size_{}_{}", self.chunk_size, self.overlap)
    }
}

/// Splits text into overlapping chunks bounded by a maximum character count.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
    delimiters: Vec<Regex>,
}

/// A single chunk borrowed from the text passed to [`TextSplitter::split`].
///
/// `start` and `end` are character offsets (not byte offsets) into the
/// original text; `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk<'a> {
    /// Position of this chunk in the sequence (0-indexed)
    pub sequence: usize,
    /// Character offset of the first character
    pub start: usize,
    /// Character offset one past the last character
    pub end: usize,
    /// The chunk text
    pub text: &'a str,
}

impl TextChunk<'_> {
    /// Number of characters in this chunk.
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

impl TextSplitter {
    /// Creates a splitter using [`DOCUMENT_DELIMITERS`].
    pub fn new(config: SplitterConfig) -> Result<Self, SplitterError> {
        Self::with_delimiters(config, DOCUMENT_DELIMITERS)
    }

    /// Creates a splitter with custom delimiter patterns.
    ///
    /// Patterns are regular expressions tried in order, most significant
    /// first. A chunk ends right after the matched delimiter.
    pub fn with_delimiters(
        config: SplitterConfig,
        delimiter_patterns: &[&str],
    ) -> Result<Self, SplitterError> {
        config.validate()?;

        let delimiters = delimiter_patterns
            .iter()
            .map(|&pattern| {
                Regex::new(pattern).map_err(|source| SplitterError::InvalidDelimiter {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { config, delimiters })
    }

    pub fn config(&self) -> SplitterConfig {
        self.config
    }

    /// Shorthand for `self.config().strategy_label()`.
    pub fn strategy_label(&self) -> String {
        self.config.strategy_label()
    }

    /// Returns a lazy iterator over the chunks of `text`.
    ///
    /// Empty or whitespace-only input yields no chunks. Text of at most
    /// `chunk_size` characters yields exactly one chunk. The iterator can be
    /// cloned to replay the sequence from its current position.
    pub fn split<'a>(&'a self, text: &'a str) -> Chunks<'a> {
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());

        let next_start = if text.trim().is_empty() {
            None
        } else {
            Some(0)
        };

        Chunks {
            splitter: self,
            text,
            offsets,
            next_start,
            sequence: 0,
        }
    }
}

/// Iterator returned by [`TextSplitter::split`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    splitter: &'a TextSplitter,
    text: &'a str,
    // Byte offset of every character, followed by `text.len()`.
    offsets: Vec<usize>,
    next_start: Option<usize>,
    sequence: usize,
}

impl Chunks<'_> {
    fn char_count(&self) -> usize {
        self.offsets.len() - 1
    }

    fn char_index(&self, byte: usize) -> usize {
        self.offsets.binary_search(&byte).unwrap_or_else(|i| i)
    }

    // Character index of the first non-whitespace character at or after `from`.
    fn next_visible(&self, from: usize) -> Option<usize> {
        let byte = self.offsets[from];
        self.text[byte..]
            .char_indices()
            .find(|(_, c)| !c.is_whitespace())
            .map(|(i, _)| self.char_index(byte + i))
    }

    // Picks the end of the chunk starting at `start`, which is known to be
    // followed by more than `chunk_size` characters.
    fn find_end(&self, start: usize) -> usize {
        let SplitterConfig {
            chunk_size,
            overlap,
        } = self.splitter.config;
        let limit = start + chunk_size;
        // The next chunk starts at `end - overlap`, which must move forward.
        let floor = start + overlap;

        let window_start = self.offsets[start];
        let window = &self.text[window_start..self.offsets[limit]];

        for delimiter in &self.splitter.delimiters {
            let candidate = delimiter
                .find_iter(window)
                .map(|m| self.char_index(window_start + m.end()))
                .filter(|&end| end > floor)
                .last();
            if let Some(end) = candidate {
                return end;
            }
        }

        limit
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = TextChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut start = self.next_start?;
        let total = self.char_count();

        let end = loop {
            let end = if total - start <= self.splitter.config.chunk_size {
                total
            } else {
                self.find_end(start)
            };

            let window = &self.text[self.offsets[start]..self.offsets[end]];
            if !window.trim().is_empty() {
                break end;
            }
            // Blank window inside a long whitespace run: resume at the next
            // visible character, giving up the overlap with the previous chunk.
            match self.next_visible(end) {
                Some(visible) => start = visible,
                None => {
                    self.next_start = None;
                    return None;
                }
            }
        };

        let chunk = TextChunk {
            sequence: self.sequence,
            start,
            end,
            text: &self.text[self.offsets[start]..self.offsets[end]],
        };
        self.sequence += 1;

        let rest = &self.text[self.offsets[end]..];
        self.next_start = if rest.trim().is_empty() {
            None
        } else {
            Some(end - self.splitter.config.overlap)
        };

        Some(chunk)
    }
}

impl FusedIterator for Chunks<'_> {}
