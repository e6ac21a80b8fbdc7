use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Task execution failed: {0}")]
    TaskExecutionFailed(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Context error: {0}")]
    ContextError(String),

    #[error("Graph '{0}' has no start task")]
    NoStartTask(String),

    #[error("Graph '{graph_id}' exceeded {limit} steps without ending")]
    StepLimitExceeded { graph_id: String, limit: usize },
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::ContextError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
