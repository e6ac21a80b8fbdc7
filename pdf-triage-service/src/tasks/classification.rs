use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use triage_flow::{Context, GraphError, NextAction, Result, Task, TaskResult};

use super::{context_keys, load_document, save_document};
use crate::classification::classify;
use crate::local_model::{SamplingParams, TextGenerator};
use crate::models::Verdict;

/// Asks the local fine-tuned model for a good/bad verdict.
pub struct ClassificationTask {
    generator: Arc<dyn TextGenerator>,
    sampling: SamplingParams,
}

impl ClassificationTask {
    pub fn new(generator: Arc<dyn TextGenerator>, sampling: SamplingParams) -> Self {
        Self {
            generator,
            sampling,
        }
    }
}

#[async_trait]
impl Task for ClassificationTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let mut document = load_document(&context)?;
        let parameters = document
            .extraction
            .as_ref()
            .and_then(|extraction| extraction.parameters.record())
            .cloned()
            .ok_or_else(|| GraphError::ContextError("Paper parameters not found".to_string()))?;

        let reply = classify(
            self.generator.as_ref(),
            &self.sampling,
            &document.topic,
            &parameters,
        )
        .await
        .map_err(|e| GraphError::TaskExecutionFailed(format!("Classification failed: {}", e)))?;

        let verdict = Verdict::from_reply(&reply);
        info!(document_id = %document.id, verdict = %verdict, "Classified document");

        document.model_reply = Some(reply);
        document.verdict = Some(verdict);
        save_document(&context, &document)?;
        if verdict != Verdict::Unclassified {
            context.set(context_keys::ARCHIVABLE, true)?;
        }

        Ok(TaskResult::new_with_status(
            NextAction::Continue,
            format!("Classified as {}", verdict),
        ))
    }
}
