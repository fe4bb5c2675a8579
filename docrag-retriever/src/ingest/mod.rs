//! Document loading

pub mod pdf;

pub use pdf::{PageText, load_document, load_pdf};
