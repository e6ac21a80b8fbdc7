use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::{
    context::Context,
    error::{GraphError, Result},
    task::{NextAction, Task, TaskResult},
};

/// Default ceiling on task executions in one run.
pub const MAX_STEPS: usize = 32;

/// Type alias for edge condition functions
pub type EdgeCondition = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// Edge between tasks in the graph
#[derive(Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub condition: Option<EdgeCondition>,
}

/// An immutable graph of tasks, built once and shared across runs.
pub struct Graph {
    pub id: String,
    tasks: HashMap<String, Arc<dyn Task>>,
    edges: Vec<Edge>,
    start_task_id: Option<String>,
    max_steps: usize,
}

impl Graph {
    /// Run the graph from its start task until a task ends the run or no
    /// outgoing edge applies.
    pub async fn execute(&self, context: Context) -> Result<ExecutionResult> {
        let mut current = self
            .start_task_id
            .clone()
            .ok_or_else(|| GraphError::NoStartTask(self.id.clone()))?;
        let mut visited = Vec::new();
        let mut status_message = None;

        for _ in 0..self.max_steps {
            let result = self.execute_single_task(&current, context.clone()).await?;
            visited.push(current.clone());
            if result.status_message.is_some() {
                status_message = result.status_message;
            }

            let next = match result.next_action {
                NextAction::End => None,
                NextAction::Continue => self.find_next_task(&current, &context),
            };

            match next {
                Some(next_task_id) => current = next_task_id,
                None => {
                    return Ok(ExecutionResult {
                        visited,
                        status_message,
                    });
                }
            }
        }

        Err(GraphError::StepLimitExceeded {
            graph_id: self.id.clone(),
            limit: self.max_steps,
        })
    }

    async fn execute_single_task(&self, task_id: &str, context: Context) -> Result<TaskResult> {
        let task = self
            .tasks
            .get(task_id)
            .ok_or_else(|| GraphError::TaskNotFound(task_id.to_string()))?;

        debug!(graph_id = %self.id, task_id = %task_id, "Running task");
        let mut result = task.run(context).await?;
        result.task_id = task_id.to_string();
        Ok(result)
    }

    /// Edges are checked in the order they were added; the first
    /// unconditional edge, or conditional edge whose condition holds, wins.
    pub fn find_next_task(&self, current_task_id: &str, context: &Context) -> Option<String> {
        self.edges
            .iter()
            .filter(|edge| edge.from == current_task_id)
            .find(|edge| {
                edge.condition
                    .as_ref()
                    .is_none_or(|condition| condition(context))
            })
            .map(|edge| edge.to.clone())
    }

    pub fn start_task_id(&self) -> Option<&str> {
        self.start_task_id.as_deref()
    }
}

/// Builder for creating graphs
pub struct GraphBuilder {
    id: String,
    tasks: HashMap<String, Arc<dyn Task>>,
    edges: Vec<Edge>,
    start_task_id: Option<String>,
    max_steps: usize,
}

impl GraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tasks: HashMap::new(),
            edges: Vec::new(),
            start_task_id: None,
            max_steps: MAX_STEPS,
        }
    }

    /// The first task added becomes the start task.
    pub fn add_task(mut self, task: Arc<dyn Task>) -> Self {
        let task_id = task.id().to_string();
        if self.start_task_id.is_none() {
            self.start_task_id = Some(task_id.clone());
        }
        self.tasks.insert(task_id, task);
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(Edge {
            from: from.into(),
            to: to.into(),
            condition: None,
        });
        self
    }

    /// Edge taken only when `condition` holds for the run's context.
    pub fn add_conditional_edge<F>(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: F,
    ) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.edges.push(Edge {
            from: from.into(),
            to: to.into(),
            condition: Some(Arc::new(condition)),
        });
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn build(self) -> Graph {
        Graph {
            id: self.id,
            tasks: self.tasks,
            edges: self.edges,
            start_task_id: self.start_task_id,
            max_steps: self.max_steps,
        }
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Task ids in execution order
    pub visited: Vec<String>,
    /// Last status message reported by any task
    pub status_message: Option<String>,
}
