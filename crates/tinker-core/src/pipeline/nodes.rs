//! Pipeline node bodies.
//!
//! Nodes never fail: oracle errors degrade to a no-op plan or a summary
//! narrative, and executor errors are recorded as failed actions. Only the
//! runner's persistence can fail a run.

use std::fmt::Write as _;
use std::sync::Arc;

use uuid::Uuid;

use tinker_types::message::ConversationMessage;
use tinker_types::task::{
    ActionResult, ExecutionStatus, PlannedAction, ResumptionMarker, TaskState,
    DEFAULT_WORKING_DIR,
};

use crate::executor::{execute_recorded, ActionContext, ActionExecutor};
use crate::oracle::{OracleQuery, ReasoningOracle};

/// The analyze / execute / complete nodes, bound to an oracle and executor.
pub struct TaskPipeline<O, E> {
    oracle: Arc<O>,
    executor: Arc<E>,
    synthesize: bool,
    working_dir: String,
}

impl<O: ReasoningOracle, E: ActionExecutor> TaskPipeline<O, E> {
    pub fn new(oracle: Arc<O>, executor: Arc<E>) -> Self {
        Self {
            oracle,
            executor,
            synthesize: true,
            working_dir: DEFAULT_WORKING_DIR.to_string(),
        }
    }

    /// Enable or disable the post-execution synthesis call.
    pub fn with_synthesis(mut self, synthesize: bool) -> Self {
        self.synthesize = synthesize;
        self
    }

    /// Directory actions run in; recorded as the state's `current_directory`.
    pub fn with_working_dir(mut self, working_dir: impl Into<String>) -> Self {
        self.working_dir = working_dir.into();
        self
    }

    /// Plan the task.
    ///
    /// Appends the task to the conversation, replaces the plan with the
    /// oracle's actions, and stores its narrative as pending. An oracle
    /// failure plans a single no-op describing the failure.
    pub async fn analyze(&self, state: &mut TaskState) {
        state.execution_status = ExecutionStatus::Analyzing;
        state.current_directory.clone_from(&self.working_dir);

        let query = OracleQuery::Analyze {
            task: &state.task_content,
            history: &state.conversation_history,
            working_dir: &state.current_directory,
        };
        let response = self.oracle.consult(&query).await;

        state
            .conversation_history
            .push(ConversationMessage::user(state.task_content.clone()));

        match response {
            Ok(response) => {
                tracing::info!(
                    thread_id = state.thread_id(),
                    actions = response.actions.len(),
                    "task analyzed"
                );
                state.planned_actions = response.actions;
                state.pending_narrative =
                    Some(response.narrative).filter(|n| !n.trim().is_empty());
            }
            Err(e) => {
                tracing::warn!(
                    thread_id = state.thread_id(),
                    error = %e,
                    "analysis failed, planning no-op"
                );
                state.planned_actions = vec![PlannedAction::noop(format!(
                    "analysis unavailable: {e}"
                ))];
                state.pending_narrative = Some(format!("I could not analyze this task: {e}"));
            }
        }

        state.narrative_emitted = false;
        if state.checkpoint_id.is_none() {
            state.checkpoint_id = Some(Uuid::now_v7());
        }
        state.resumption_marker = Some(ResumptionMarker::TaskAnalyzed);
    }

    /// Run every planned action in order, recording each outcome.
    ///
    /// A failed action never stops the remaining ones. Afterwards the oracle
    /// is asked once for a combined narrative (when synthesis is enabled);
    /// otherwise, or if that call fails, a per-action summary is used.
    pub async fn execute(&self, state: &mut TaskState) {
        state.execution_status = ExecutionStatus::Executing;

        let thread_id = state.thread_id().to_string();
        let working_dir = state.current_directory.clone();
        let ctx = ActionContext {
            thread_id: &thread_id,
            working_dir: &working_dir,
        };

        for (index, action) in state.planned_actions.iter().enumerate() {
            let outcome = execute_recorded(self.executor.as_ref(), action, &ctx).await;
            tracing::info!(
                thread_id = %thread_id,
                index,
                kind = %action.kind,
                success = outcome.success,
                "action executed"
            );
            state
                .action_results
                .push(ActionResult::new(action.clone(), outcome));
        }

        let narrative = self.synthesize_narrative(state).await;
        state.pending_narrative = Some(narrative);
        state.narrative_emitted = false;
        state.resumption_marker = Some(ResumptionMarker::ToolsExecuted);
    }

    /// Finalize the state. Safe to call any number of times.
    pub fn complete(&self, state: &mut TaskState) {
        if !state.narrative_emitted {
            if let Some(narrative) = &state.pending_narrative {
                state
                    .conversation_history
                    .push(ConversationMessage::assistant(narrative.clone()));
            }
            state.narrative_emitted = true;
        }
        state.execution_status = ExecutionStatus::Completed;
        state.resumption_marker = Some(ResumptionMarker::Completed);
    }

    async fn synthesize_narrative(&self, state: &TaskState) -> String {
        if !self.synthesize {
            return summarize_results(&state.action_results);
        }

        let query = OracleQuery::Synthesize {
            task: &state.task_content,
            results: &state.action_results,
        };
        match self.oracle.consult(&query).await {
            Ok(response) if !response.narrative.trim().is_empty() => response.narrative,
            Ok(_) => summarize_results(&state.action_results),
            Err(e) => {
                tracing::warn!(
                    thread_id = state.thread_id(),
                    error = %e,
                    "synthesis failed, using result summary"
                );
                summarize_results(&state.action_results)
            }
        }
    }
}

/// Plain summary of an execution pass: one line per action with its outcome.
pub fn summarize_results(results: &[ActionResult]) -> String {
    let failed = results.iter().filter(|r| !r.success).count();
    let mut out = format!(
        "Executed {} action(s), {} failed.",
        results.len(),
        failed
    );
    for result in results {
        let label = result
            .request
            .command()
            .unwrap_or(result.request.kind.as_str());
        let status = if result.success { "ok" } else { "failed" };
        let _ = write!(out, "\n- [{status}] {label}");
        if let Some(error) = &result.outcome.error {
            let _ = write!(out, ": {error}");
        }
    }
    out
}
