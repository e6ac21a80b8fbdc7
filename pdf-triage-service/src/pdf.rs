use std::path::Path;

use lopdf::Document;
use tracing::{debug, warn};

/// Turns a PDF on disk into plain text.
///
/// Extraction never fails: unreadable pages contribute nothing and an
/// unreadable document yields an empty string.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, path: &Path) -> String;
}

/// Page-by-page extraction with `lopdf`.
pub struct LopdfExtractor;

impl TextExtractor for LopdfExtractor {
    fn extract_text(&self, path: &Path) -> String {
        let document = match Document::load(path) {
            Ok(document) => document,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to open PDF");
                return String::new();
            }
        };

        let mut text = String::new();
        let pages = document.get_pages();
        for page_number in pages.keys() {
            match document.extract_text(&[*page_number]) {
                Ok(page_text) => {
                    text.push_str(&page_text);
                    text.push('\n');
                }
                Err(e) => {
                    warn!(page = page_number, error = %e, "Failed to extract page text");
                }
            }
        }

        debug!(pages = pages.len(), chars = text.len(), "Extracted PDF text");
        text
    }
}
