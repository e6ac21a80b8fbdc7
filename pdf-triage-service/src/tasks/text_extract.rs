use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use triage_flow::{Context, GraphError, NextAction, Result, Task, TaskResult};

use super::{context_keys, load_document, save_document};
use crate::pdf::TextExtractor;

pub const NO_TEXT_ERROR: &str = "No text could be extracted from PDF";

/// Reads the scratch PDF into plain text.
pub struct TextExtractTask {
    extractor: Arc<dyn TextExtractor>,
}

impl TextExtractTask {
    pub fn new(extractor: Arc<dyn TextExtractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl Task for TextExtractTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let mut document = load_document(&context)?;
        info!(
            document_id = %document.id,
            filename = %document.filename,
            "Extracting PDF text"
        );

        let extractor = self.extractor.clone();
        let path = PathBuf::from(&document.pdf_path);
        let text = tokio::task::spawn_blocking(move || extractor.extract_text(&path))
            .await
            .map_err(|e| GraphError::TaskExecutionFailed(format!("Text extraction failed: {}", e)))?;

        if text.trim().is_empty() {
            warn!(document_id = %document.id, "No text extracted from PDF");
            document.error = Some(NO_TEXT_ERROR.to_string());
            save_document(&context, &document)?;
            return Ok(TaskResult::new_with_status(NextAction::Continue, NO_TEXT_ERROR));
        }

        info!(document_id = %document.id, chars = text.len(), "Extracted PDF text");
        document.extracted_text = Some(text);
        save_document(&context, &document)?;
        context.set(context_keys::HAS_TEXT, true)?;

        Ok(TaskResult::new_with_status(
            NextAction::Continue,
            "Extracted PDF text",
        ))
    }
}
