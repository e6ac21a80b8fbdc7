use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use triage_flow::{Context, GraphError, NextAction, Result, Task, TaskResult};

use super::{context_keys, load_document, save_document};
use crate::extraction::extract_parameters;
use crate::llm::ChatModel;

/// Pulls the bibliographic record out of the extracted text.
pub struct ParameterExtractTask {
    model: Arc<dyn ChatModel>,
}

impl ParameterExtractTask {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Task for ParameterExtractTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let mut document = load_document(&context)?;
        let text = document
            .extracted_text
            .as_deref()
            .ok_or_else(|| GraphError::ContextError("Extracted text not found".to_string()))?;

        let extraction = extract_parameters(self.model.as_ref(), text).await;

        let complete = match extraction.parameters.error_message() {
            Some(error) => {
                warn!(document_id = %document.id, error = %error, "Parameter extraction failed");
                document.error = Some(error.to_string());
                false
            }
            None => {
                info!(document_id = %document.id, "Parameter extraction complete");
                true
            }
        };
        document.extraction = Some(extraction);
        save_document(&context, &document)?;

        if complete {
            context.set(context_keys::HAS_PARAMETERS, true)?;
            Ok(TaskResult::new_with_status(
                NextAction::Continue,
                "Extracted paper parameters",
            ))
        } else {
            Ok(TaskResult::new_with_status(
                NextAction::Continue,
                "Parameter extraction failed",
            ))
        }
    }
}
