use std::path::Path;

use mupdf::{Document, TextPageFlags};

use deckhand_core::{BackendError, PdfBackend};

/// MuPDF-based implementation of [`PdfBackend`].
///
/// This crate is the sole AGPL island — it isolates the mupdf dependency
/// (which is AGPL-3.0) so that non-PDF code paths do not transitively
/// depend on it.
///
/// Pitch decks are one slide per page, so unlike a paper-oriented
/// extractor no header/footer region is excluded: slide numbers and
/// footnote-sized text regularly carry the metrics we want.
#[derive(Debug, Default)]
pub struct MupdfBackend;

impl MupdfBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PdfBackend for MupdfBackend {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, BackendError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| BackendError::Open("invalid path encoding".into()))?;

        let document = Document::open(path_str).map_err(|e| BackendError::Open(e.to_string()))?;

        let mut pages_text = Vec::new();

        for page_result in document
            .pages()
            .map_err(|e| BackendError::Extraction(e.to_string()))?
        {
            let page = page_result.map_err(|e| BackendError::Extraction(e.to_string()))?;

            // A slide that fails text extraction (pure imagery, no text
            // layer) contributes an empty string, not an error.
            let Ok(text_page) = page.to_text_page(TextPageFlags::empty()) else {
                pages_text.push(String::new());
                continue;
            };

            let mut page_text = String::new();
            for block in text_page.blocks() {
                for line in block.lines() {
                    let line_text: String = line
                        .chars()
                        .map(|c| c.char().unwrap_or('\u{FFFD}'))
                        .collect();
                    page_text.push_str(&line_text);
                    page_text.push('\n');
                }
            }
            pages_text.push(page_text.trim().to_string());
        }

        Ok(pages_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_pdf_bytes_fail_to_open() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("deckhand_not_a_pdf_{}.pdf", std::process::id()));
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let result = MupdfBackend::new().extract_pages(&path);
        assert!(matches!(result, Err(BackendError::Open(_))));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_fails_to_open() {
        let result = MupdfBackend::new().extract_pages(Path::new("/nonexistent/deck.pdf"));
        assert!(matches!(result, Err(BackendError::Open(_))));
    }
}
