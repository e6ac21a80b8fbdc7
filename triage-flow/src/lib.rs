pub mod context;
pub mod error;
pub mod graph;
pub mod task;

// Re-export commonly used types
pub use context::Context;
pub use error::{GraphError, Result};
pub use graph::{ExecutionResult, Graph, GraphBuilder, MAX_STEPS};
pub use task::{NextAction, Task, TaskResult};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct AppendTask {
        id: String,
        next: NextAction,
    }

    impl AppendTask {
        fn new(id: &str, next: NextAction) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                next,
            })
        }
    }

    #[async_trait]
    impl Task for AppendTask {
        fn id(&self) -> &str {
            &self.id
        }

        async fn run(&self, context: Context) -> Result<TaskResult> {
            let mut trail: Vec<String> = context.get("trail").unwrap_or_default();
            trail.push(self.id.clone());
            context.set("trail", trail)?;
            Ok(TaskResult::new_with_status(
                self.next.clone(),
                format!("{} done", self.id),
            ))
        }
    }

    #[tokio::test]
    async fn test_linear_graph_execution() {
        let graph = GraphBuilder::new("linear")
            .add_task(AppendTask::new("a", NextAction::Continue))
            .add_task(AppendTask::new("b", NextAction::Continue))
            .add_task(AppendTask::new("c", NextAction::End))
            .add_edge("a", "b")
            .add_edge("b", "c")
            .build();

        let context = Context::new();
        let result = graph.execute(context.clone()).await.unwrap();

        assert_eq!(result.visited, vec!["a", "b", "c"]);
        assert_eq!(result.status_message.as_deref(), Some("c done"));
        let trail: Vec<String> = context.get("trail").unwrap();
        assert_eq!(trail, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_conditional_edges_checked_in_order() {
        let build = || {
            GraphBuilder::new("branching")
                .add_task(AppendTask::new("check", NextAction::Continue))
                .add_task(AppendTask::new("yes", NextAction::End))
                .add_task(AppendTask::new("fallback", NextAction::End))
                .add_conditional_edge("check", "yes", |ctx| {
                    ctx.get::<bool>("flag").unwrap_or(false)
                })
                .add_edge("check", "fallback")
                .build()
        };

        let context = Context::new();
        context.set("flag", true).unwrap();
        let result = build().execute(context).await.unwrap();
        assert_eq!(result.visited, vec!["check", "yes"]);

        let result = build().execute(Context::new()).await.unwrap();
        assert_eq!(result.visited, vec!["check", "fallback"]);
    }

    #[tokio::test]
    async fn test_unmet_condition_without_fallback_stops() {
        let graph = GraphBuilder::new("guarded")
            .add_task(AppendTask::new("first", NextAction::Continue))
            .add_task(AppendTask::new("second", NextAction::End))
            .add_conditional_edge("first", "second", |ctx| ctx.contains("ready"))
            .build();

        let result = graph.execute(Context::new()).await.unwrap();
        assert_eq!(result.visited, vec!["first"]);
        assert_eq!(result.status_message.as_deref(), Some("first done"));
    }

    #[tokio::test]
    async fn test_end_ignores_outgoing_edges() {
        let graph = GraphBuilder::new("early_end")
            .add_task(AppendTask::new("stop", NextAction::End))
            .add_task(AppendTask::new("never", NextAction::End))
            .add_edge("stop", "never")
            .build();

        let result = graph.execute(Context::new()).await.unwrap();
        assert_eq!(result.visited, vec!["stop"]);
    }

    #[tokio::test]
    async fn test_step_limit_is_enforced() {
        let graph = GraphBuilder::new("loop")
            .add_task(AppendTask::new("ping", NextAction::Continue))
            .add_task(AppendTask::new("pong", NextAction::Continue))
            .add_edge("ping", "pong")
            .add_edge("pong", "ping")
            .with_max_steps(5)
            .build();

        let context = Context::new();
        let err = graph.execute(context.clone()).await.unwrap_err();
        assert!(matches!(
            err,
            GraphError::StepLimitExceeded { limit: 5, .. }
        ));
        let trail: Vec<String> = context.get("trail").unwrap();
        assert_eq!(trail, vec!["ping", "pong", "ping", "pong", "ping"]);
    }

    #[tokio::test]
    async fn test_edge_to_unknown_task_fails() {
        let graph = GraphBuilder::new("broken")
            .add_task(AppendTask::new("start", NextAction::Continue))
            .add_edge("start", "missing")
            .build();

        let err = graph.execute(Context::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::TaskNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_empty_graph_has_no_start() {
        let graph = GraphBuilder::new("empty").build();
        assert!(graph.start_task_id().is_none());
        let err = graph.execute(Context::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::NoStartTask(_)));
    }

    #[test]
    fn test_context_type_mismatch_returns_none() {
        let context = Context::new();
        context.set("count", 3).unwrap();
        assert_eq!(context.get::<u32>("count"), Some(3));
        assert_eq!(context.get::<String>("count"), None);
        assert!(context.contains("count"));
        assert!(!context.contains("missing"));
    }
}
