use std::sync::Arc;

use tracing::{debug, error};
use triage_flow::{Context, Graph, GraphBuilder, GraphError, Task};

use crate::llm::ChatModel;
use crate::local_model::{SamplingParams, TextGenerator};
use crate::models::PaperDocument;
use crate::pdf::TextExtractor;
use crate::store::ArchiveStore;
use crate::tasks::*;

/// Collaborators shared by every run of the triage workflow.
#[derive(Clone)]
pub struct TriageDeps {
    pub extractor: Arc<dyn TextExtractor>,
    pub chat: Arc<dyn ChatModel>,
    pub generator: Arc<dyn TextGenerator>,
    pub sampling: SamplingParams,
    pub store: Arc<ArchiveStore>,
}

/// text → parameters → verdict → archive, each step gated on the previous
/// one having produced something usable.
pub fn build_triage_workflow(deps: &TriageDeps) -> Graph {
    let text_extract_task = Arc::new(TextExtractTask::new(deps.extractor.clone()));
    let text_extract_id = text_extract_task.id().to_string();

    let parameter_extract_task = Arc::new(ParameterExtractTask::new(deps.chat.clone()));
    let parameter_extract_id = parameter_extract_task.id().to_string();

    let classification_task = Arc::new(ClassificationTask::new(
        deps.generator.clone(),
        deps.sampling,
    ));
    let classification_id = classification_task.id().to_string();

    let archive_task = Arc::new(ArchiveTask::new(deps.store.clone()));
    let archive_id = archive_task.id().to_string();

    GraphBuilder::new("pdf_triage")
        .add_task(text_extract_task)
        .add_task(parameter_extract_task)
        .add_task(classification_task)
        .add_task(archive_task)
        .add_conditional_edge(&text_extract_id, &parameter_extract_id, |ctx| {
            ctx.get::<bool>(context_keys::HAS_TEXT).unwrap_or(false)
        })
        .add_conditional_edge(&parameter_extract_id, &classification_id, |ctx| {
            ctx.get::<bool>(context_keys::HAS_PARAMETERS).unwrap_or(false)
        })
        .add_conditional_edge(&classification_id, &archive_id, |ctx| {
            ctx.get::<bool>(context_keys::ARCHIVABLE).unwrap_or(false)
        })
        .build()
}

/// Runs one document through the workflow.
///
/// Never fails: a workflow error is recorded on the returned document so the
/// file still gets a result entry.
pub async fn run_document(graph: &Graph, document: PaperDocument) -> PaperDocument {
    let context = Context::new();
    if let Err(e) = save_document(&context, &document) {
        return with_error(document, e);
    }

    match graph.execute(context.clone()).await {
        Ok(result) => {
            debug!(
                document_id = %document.id,
                visited = ?result.visited,
                status = ?result.status_message,
                "Workflow finished"
            );
            load_document(&context).unwrap_or(document)
        }
        Err(e) => {
            error!(document_id = %document.id, error = %e, "Workflow failed");
            let latest = load_document(&context).unwrap_or(document);
            with_error(latest, e)
        }
    }
}

fn with_error(mut document: PaperDocument, error: GraphError) -> PaperDocument {
    let message = match error {
        GraphError::TaskExecutionFailed(message) => message,
        other => other.to_string(),
    };
    document.error = Some(message);
    document
}
