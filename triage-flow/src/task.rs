use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{context::Context, error::Result};

/// Result of a task execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Next action to take
    pub next_action: NextAction,
    /// Short human-readable note about what the task did
    pub status_message: Option<String>,
    /// Set by the graph to the id of the task that produced this result
    #[serde(default)]
    pub task_id: String,
}

impl TaskResult {
    pub fn new(next_action: NextAction) -> Self {
        Self {
            next_action,
            status_message: None,
            task_id: String::new(),
        }
    }

    pub fn new_with_status(next_action: NextAction, status_message: impl Into<String>) -> Self {
        Self {
            next_action,
            status_message: Some(status_message.into()),
            task_id: String::new(),
        }
    }
}

/// Defines what should happen after a task completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextAction {
    /// Follow the outgoing edges of the current task
    Continue,
    /// Stop the run
    End,
}

/// Core trait that all tasks must implement
#[async_trait]
pub trait Task: Send + Sync {
    /// Unique identifier for this task, the type name unless overridden
    fn id(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn run(&self, context: Context) -> Result<TaskResult>;
}
