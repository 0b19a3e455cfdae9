use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    Open(String),
    #[error("failed to extract text: {0}")]
    Extraction(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for PDF text acquisition backends.
///
/// Implementors provide the low-level per-page text; slide labeling,
/// prompting and normalization live in this crate.
pub trait PdfBackend: Send + Sync {
    /// Extract text page by page, preserving page order.
    ///
    /// Pages with no extractable text yield an empty string rather than an
    /// error; only an unreadable document fails.
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, BackendError>;
}
