//! Page text extraction
//!
//! PDFs are read with `pdf-extract` on a blocking thread. Plain-text files
//! are accepted too and come back as a single page. Every failure is logged
//! and turned into an empty page list so ingestion can report "nothing to
//! index" instead of aborting.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Text of one page, numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageText {
    pub number: usize,
    pub text: String,
}

/// Load the pages of `path`, choosing the reader by extension.
pub async fn load_document(path: &Path) -> Vec<PageText> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("txt") | Some("md") => load_text(path).await,
        _ => load_pdf(path).await,
    }
}

/// Extract the text of every page of a PDF.
pub async fn load_pdf(path: &Path) -> Vec<PageText> {
    if !path.is_file() {
        tracing::error!("File not found: {}", path.display());
        return Vec::new();
    }

    let owned: PathBuf = path.to_path_buf();
    let extracted = tokio::task::spawn_blocking(move || pdf_extract::extract_text_by_pages(&owned)).await;

    let pages = match extracted {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            tracing::error!("Error loading PDF {}: {}", path.display(), e);
            return Vec::new();
        }
        Err(e) => {
            // pdf-extract panics on some malformed files
            tracing::error!("PDF extraction aborted for {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let pages: Vec<PageText> = pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| PageText { number: i + 1, text })
        .collect();
    tracing::info!("Loaded {} pages from {}", pages.len(), path.display());
    pages
}

async fn load_text(path: &Path) -> Vec<PageText> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => {
            tracing::info!("Loaded text file {}", path.display());
            vec![PageText { number: 1, text }]
        }
        Err(e) => {
            tracing::error!("Error reading {}: {}", path.display(), e);
            Vec::new()
        }
    }
}
