//! ActionExecutor trait: the boundary to whatever performs side effects.

use std::future::Future;

use tinker_types::task::{ActionOutcome, PlannedAction};

/// Where an action runs.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub thread_id: &'a str,
    pub working_dir: &'a str,
}

/// Failure of the executor itself, as opposed to an unsuccessful action.
///
/// Callers convert these into an unsuccessful [`ActionOutcome`] so a broken
/// executor is recorded like any other failed action.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("invalid action parameters: {0}")]
    InvalidParams(String),

    #[error("failed to launch action: {0}")]
    Spawn(String),

    #[error("executor unavailable: {0}")]
    Unavailable(String),
}

/// Runs planned actions verbatim. Parameter validation is the executor's job.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ActionExecutor: Send + Sync {
    fn execute(
        &self,
        action: &PlannedAction,
        ctx: &ActionContext<'_>,
    ) -> impl Future<Output = Result<ActionOutcome, ExecutorError>> + Send;
}

/// Run `action`, folding executor errors into an unsuccessful outcome.
pub async fn execute_recorded<E: ActionExecutor>(
    executor: &E,
    action: &PlannedAction,
    ctx: &ActionContext<'_>,
) -> ActionOutcome {
    match executor.execute(action, ctx).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(
                thread_id = ctx.thread_id,
                kind = %action.kind,
                error = %e,
                "executor error, recording failed action"
            );
            ActionOutcome::failed(e.to_string(), serde_json::Value::Null)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl ActionExecutor for Broken {
        async fn execute(
            &self,
            _action: &PlannedAction,
            _ctx: &ActionContext<'_>,
        ) -> Result<ActionOutcome, ExecutorError> {
            Err(ExecutorError::Spawn("bash not found".into()))
        }
    }

    #[tokio::test]
    async fn executor_error_becomes_failed_outcome() {
        let ctx = ActionContext {
            thread_id: "t",
            working_dir: "/workspace",
        };
        let outcome = execute_recorded(&Broken, &PlannedAction::shell("ls"), &ctx).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("bash not found"));
    }
}
