pub mod archive;
pub mod classification;
pub mod parameter_extract;
pub mod text_extract;

pub use archive::ArchiveTask;
pub use classification::ClassificationTask;
pub use parameter_extract::ParameterExtractTask;
pub use text_extract::TextExtractTask;

use triage_flow::{Context, GraphError, Result};

use crate::models::PaperDocument;

/// Keys shared through the workflow context.
pub mod context_keys {
    pub const DOCUMENT: &str = "document";
    /// Set once non-empty text has been extracted.
    pub const HAS_TEXT: &str = "has_text";
    /// Set once a complete parameter record exists.
    pub const HAS_PARAMETERS: &str = "has_parameters";
    /// Set when the verdict has an archive bucket.
    pub const ARCHIVABLE: &str = "archivable";
}

pub(crate) fn load_document(context: &Context) -> Result<PaperDocument> {
    context
        .get(context_keys::DOCUMENT)
        .ok_or_else(|| GraphError::ContextError("Document not found in context".to_string()))
}

pub(crate) fn save_document(context: &Context, document: &PaperDocument) -> Result<()> {
    context.set(context_keys::DOCUMENT, document)
}
