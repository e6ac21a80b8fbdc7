use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use triage_flow::{Context, GraphError, NextAction, Result, Task, TaskResult};

use super::{load_document, save_document};
use crate::store::ArchiveStore;

/// Copies the original PDF into the bucket named by its verdict.
pub struct ArchiveTask {
    store: Arc<ArchiveStore>,
}

impl ArchiveTask {
    pub fn new(store: Arc<ArchiveStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Task for ArchiveTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let mut document = load_document(&context)?;
        let verdict = document
            .verdict
            .ok_or_else(|| GraphError::ContextError("Verdict not found".to_string()))?;

        let stored = self
            .store
            .add(verdict, &document.filename, Path::new(&document.pdf_path))
            .await
            .map_err(|e| GraphError::TaskExecutionFailed(format!("Failed to archive PDF: {}", e)))?;

        let status = format!("Archived as {}/{}", verdict, stored);
        document.archived_as = Some(stored);
        save_document(&context, &document)?;

        Ok(TaskResult::new_with_status(NextAction::End, status))
    }
}
