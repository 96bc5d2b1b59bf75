//! Drives the task pipeline with a checkpoint after every node.
//!
//! Entry points (`execute_task`, `resume`) always hand back a well-formed
//! `TaskState`: a persistence failure mid-run turns the working state into a
//! terminal `Failed` state instead of escaping as an error. The `try_*`
//! variants expose the typed error.

use std::sync::Arc;

use tinker_types::session::ThreadSnapshot;
use tinker_types::task::TaskState;

use crate::checkpoint::Checkpointer;
use crate::error::RunnerError;
use crate::executor::ActionExecutor;
use crate::oracle::ReasoningOracle;
use crate::repository::ThreadStore;
use crate::session::SessionRegistry;

use super::graph::{entry_node, successor, PipelineNode};
use super::nodes::TaskPipeline;

/// Runs tasks on threads, persisting after each pipeline step.
///
/// Does not serialize calls for the same thread; callers must.
pub struct TaskRunner<S, O, E> {
    pipeline: TaskPipeline<O, E>,
    checkpointer: Checkpointer<S>,
    sessions: SessionRegistry<S>,
}

impl<S, O, E> TaskRunner<S, O, E>
where
    S: ThreadStore,
    O: ReasoningOracle,
    E: ActionExecutor,
{
    pub fn new(store: Arc<S>, pipeline: TaskPipeline<O, E>) -> Self {
        Self {
            pipeline,
            checkpointer: Checkpointer::new(Arc::clone(&store)),
            sessions: SessionRegistry::new(store),
        }
    }

    pub fn checkpointer(&self) -> &Checkpointer<S> {
        &self.checkpointer
    }

    /// Execute `task` on `thread_id`, creating or continuing the thread.
    #[tracing::instrument(name = "execute_task", skip(self, task), fields(thread_id = %thread_id))]
    pub async fn execute_task(&self, thread_id: &str, task: &str) -> TaskState {
        let mut state = match self.prepare(thread_id, task).await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(thread_id, error = %e, "could not start task");
                let mut state = TaskState::new(thread_id, task);
                state.fail(e.to_string());
                return state;
            }
        };

        match self.finish(&mut state, PipelineNode::Analyze).await {
            Ok(()) => state,
            Err(e) => self.fail_persisted(state, e).await,
        }
    }

    /// Like [`execute_task`](Self::execute_task), but returns the error.
    pub async fn try_execute_task(&self, thread_id: &str, task: &str) -> Result<TaskState, RunnerError> {
        let mut state = self.prepare(thread_id, task).await?;
        self.finish(&mut state, PipelineNode::Analyze).await?;
        Ok(state)
    }

    /// Continue a thread from its latest snapshot.
    ///
    /// Re-enters at the node implied by the resumption marker; an already
    /// finished thread is returned unchanged.
    #[tracing::instrument(name = "resume_task", skip(self), fields(thread_id = %thread_id))]
    pub async fn resume(&self, thread_id: &str) -> TaskState {
        let mut state = match self.load(thread_id).await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(thread_id, error = %e, "could not resume task");
                let mut state = TaskState::new(thread_id, "");
                state.fail(e.to_string());
                return state;
            }
        };

        let entry = entry_node(&state);
        match self.finish(&mut state, entry).await {
            Ok(()) => state,
            Err(e) => self.fail_persisted(state, e).await,
        }
    }

    /// Like [`resume`](Self::resume), but returns the error.
    pub async fn try_resume(&self, thread_id: &str) -> Result<TaskState, RunnerError> {
        let mut state = self.load(thread_id).await?;
        let entry = entry_node(&state);
        self.finish(&mut state, entry).await?;
        Ok(state)
    }

    /// Run one node, checkpoint, and return the next node.
    pub async fn step(&self, node: PipelineNode, state: &mut TaskState) -> Result<PipelineNode, RunnerError> {
        match node {
            PipelineNode::Analyze => self.pipeline.analyze(state).await,
            PipelineNode::Execute => self.pipeline.execute(state).await,
            PipelineNode::Complete => self.pipeline.complete(state),
            PipelineNode::End => return Ok(PipelineNode::End),
        }
        self.checkpointer.save_task(state).await?;

        let next = successor(node, state);
        tracing::debug!(thread_id = state.thread_id(), %node, %next, "pipeline step");
        Ok(next)
    }

    /// Run from `entry` until the graph ends.
    pub async fn drive(&self, state: &mut TaskState, entry: PipelineNode) -> Result<(), RunnerError> {
        let mut node = entry;
        while node != PipelineNode::End {
            node = self.step(node, state).await?;
        }
        Ok(())
    }

    async fn prepare(&self, thread_id: &str, task: &str) -> Result<TaskState, RunnerError> {
        self.sessions.create_session(thread_id, task).await?;

        let state = match self.checkpointer.load(thread_id).await? {
            Some(ThreadSnapshot::Task(previous)) => TaskState::continue_from(&previous, task),
            Some(ThreadSnapshot::Loop(_)) => {
                tracing::info!(thread_id, "thread held a loop snapshot, starting a fresh task");
                TaskState::new(thread_id, task)
            }
            None => TaskState::new(thread_id, task),
        };
        tracing::info!(thread_id, "starting task");
        Ok(state)
    }

    async fn load(&self, thread_id: &str) -> Result<TaskState, RunnerError> {
        self.checkpointer
            .load_task(thread_id)
            .await?
            .ok_or_else(|| RunnerError::NoCheckpoint(thread_id.to_string()))
    }

    async fn finish(&self, state: &mut TaskState, entry: PipelineNode) -> Result<(), RunnerError> {
        tracing::info!(thread_id = state.thread_id(), %entry, "running pipeline");
        self.drive(state, entry).await?;
        self.sessions.touch(state.thread_id()).await?;
        tracing::info!(
            thread_id = state.thread_id(),
            status = %state.execution_status,
            actions = state.action_results.len(),
            failed = state.failed_action_count(),
            "task finished"
        );
        Ok(())
    }

    /// Turn a mid-run failure into a terminal state, persisting it if possible.
    async fn fail_persisted(&self, mut state: TaskState, error: RunnerError) -> TaskState {
        tracing::error!(thread_id = state.thread_id(), error = %error, "task failed");
        state.fail(error.to_string());
        if let Err(e) = self.checkpointer.save_task(&state).await {
            tracing::warn!(thread_id = state.thread_id(), error = %e, "could not persist failed state");
        }
        if let Err(e) = self.sessions.touch(state.thread_id()).await {
            tracing::debug!(thread_id = state.thread_id(), error = %e, "could not touch session");
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::InMemoryThreadStore;
    use crate::repository::SessionRepository;
    use crate::testing::{FlakyStore, ScriptedExecutor, ScriptedOracle};
    use tinker_types::agent_loop::LoopState;
    use tinker_types::task::{ExecutionStatus, PlannedAction, ResumptionMarker};

    struct Harness<S> {
        store: Arc<S>,
        oracle: Arc<ScriptedOracle>,
        executor: Arc<ScriptedExecutor>,
        runner: TaskRunner<S, ScriptedOracle, ScriptedExecutor>,
    }

    fn harness<S: ThreadStore>(store: S, oracle: ScriptedOracle) -> Harness<S> {
        let store = Arc::new(store);
        let oracle = Arc::new(oracle);
        let executor = Arc::new(ScriptedExecutor::default());
        let pipeline = TaskPipeline::new(Arc::clone(&oracle), Arc::clone(&executor));
        Harness {
            runner: TaskRunner::new(Arc::clone(&store), pipeline),
            store,
            oracle,
            executor,
        }
    }

    #[tokio::test]
    async fn execute_task_runs_to_completion() {
        let h = harness(
            InMemoryThreadStore::new(),
            ScriptedOracle::planning(vec![PlannedAction::shell("echo hi")]),
        );
        let state = h.runner.execute_task("t1", "echo hi").await;

        assert_eq!(state.execution_status, ExecutionStatus::Completed);
        assert_eq!(state.resumption_marker, Some(ResumptionMarker::Completed));
        assert_eq!(state.action_results.len(), 1);
        // user task + synthesized narrative
        assert_eq!(state.conversation_history.len(), 2);

        let history = h.runner.checkpointer().history("t1", None).await.unwrap();
        let markers: Vec<_> = history
            .iter()
            .map(|r| r.resumption_marker.clone().unwrap())
            .collect();
        assert_eq!(markers, vec!["completed", "tools_executed", "task_analyzed"]);
        assert!(h.store.get_session("t1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn empty_plan_skips_execute() {
        let h = harness(InMemoryThreadStore::new(), ScriptedOracle::planning(Vec::new()));
        let state = h.runner.execute_task("t", "just chat").await;

        assert_eq!(state.execution_status, ExecutionStatus::Completed);
        assert!(state.action_results.is_empty());
        assert_eq!(h.oracle.calls("synthesize"), 0);
        assert_eq!(h.runner.checkpointer().history("t", None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn resume_after_analysis_uses_persisted_plan() {
        let h = harness(
            InMemoryThreadStore::new(),
            ScriptedOracle::planning(vec![PlannedAction::shell("echo fresh")]),
        );

        // Simulate a crash right after analysis with a plan the oracle would
        // not produce again.
        let mut state = TaskState::new("t", "do it");
        state.planned_actions = vec![PlannedAction::shell("echo persisted"), PlannedAction::shell("false")];
        state.resumption_marker = Some(ResumptionMarker::TaskAnalyzed);
        h.runner.checkpointer().save_task(&state).await.unwrap();

        let resumed = h.runner.resume("t").await;
        assert_eq!(resumed.execution_status, ExecutionStatus::Completed);
        assert_eq!(h.oracle.calls("analyze"), 0);
        assert_eq!(h.executor.executed(), vec!["echo persisted", "false"]);
        assert_eq!(resumed.action_results.len(), 2);
    }

    #[tokio::test]
    async fn resume_after_execution_does_not_rerun_actions() {
        let h = harness(
            InMemoryThreadStore::new(),
            ScriptedOracle::planning(vec![PlannedAction::shell("echo hi")]),
        );
        let mut state = TaskState::new("t", "echo hi");
        state.planned_actions = vec![PlannedAction::shell("echo hi")];
        state.pending_narrative = Some("it printed hi".into());
        state.resumption_marker = Some(ResumptionMarker::ToolsExecuted);
        h.runner.checkpointer().save_task(&state).await.unwrap();

        let resumed = h.runner.resume("t").await;
        assert!(h.executor.executed().is_empty());
        assert_eq!(resumed.execution_status, ExecutionStatus::Completed);
        assert_eq!(
            resumed.conversation_history.last().unwrap().content,
            "it printed hi"
        );

        // Resuming a completed thread changes nothing.
        let again = h.runner.resume("t").await;
        assert_eq!(again.conversation_history.len(), resumed.conversation_history.len());
    }

    #[tokio::test]
    async fn resume_without_checkpoint_fails() {
        let h = harness(InMemoryThreadStore::new(), ScriptedOracle::planning(Vec::new()));
        assert!(matches!(
            h.runner.try_resume("missing").await,
            Err(RunnerError::NoCheckpoint(_))
        ));
        let state = h.runner.resume("missing").await;
        assert_eq!(state.execution_status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn resume_rejects_loop_thread() {
        let h = harness(InMemoryThreadStore::new(), ScriptedOracle::planning(Vec::new()));
        h.runner
            .checkpointer()
            .save_loop(&LoopState::new("l", "goal", 2))
            .await
            .unwrap();
        assert!(matches!(
            h.runner.try_resume("l").await,
            Err(RunnerError::Checkpoint(_))
        ));
    }

    #[tokio::test]
    async fn persistence_failure_yields_failed_state() {
        let h = harness(
            FlakyStore::failing(),
            ScriptedOracle::planning(vec![PlannedAction::shell("echo hi")]),
        );

        let err = h.runner.try_execute_task("t", "echo hi").await.unwrap_err();
        assert!(matches!(err, RunnerError::Checkpoint(_)));

        let state = h.runner.execute_task("t", "echo hi").await;
        assert_eq!(state.execution_status, ExecutionStatus::Failed);
        match state.resumption_marker {
            Some(ResumptionMarker::Error(msg)) => assert!(msg.contains("database is locked")),
            other => panic!("unexpected marker: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failure_after_analysis_keeps_progress_resumable() {
        let h = harness(
            FlakyStore::fail_after(1),
            ScriptedOracle::planning(vec![PlannedAction::shell("echo hi")]),
        );
        let state = h.runner.execute_task("t", "echo hi").await;
        assert_eq!(state.execution_status, ExecutionStatus::Failed);

        // The analysis checkpoint survived; the failed state could not be written.
        let persisted = h.runner.checkpointer().load_task("t").await.unwrap().unwrap();
        assert_eq!(persisted.resumption_marker, Some(ResumptionMarker::TaskAnalyzed));

        h.store.recover();
        let resumed = h.runner.resume("t").await;
        assert_eq!(resumed.execution_status, ExecutionStatus::Completed);
        assert_eq!(h.oracle.calls("analyze"), 1);
    }

    #[tokio::test]
    async fn failed_resume_still_touches_session() {
        let h = harness(FlakyStore::fail_after(1), ScriptedOracle::planning(Vec::new()));
        h.runner
            .checkpointer()
            .save_task(&TaskState::new("t", "echo hi"))
            .await
            .unwrap();
        h.store.upsert_session("t", "echo hi").await.unwrap();
        h.store.upsert_session("u", "other").await.unwrap();

        let state = h.runner.resume("t").await;
        assert_eq!(state.execution_status, ExecutionStatus::Failed);

        let ids: Vec<_> = h
            .store
            .list_sessions()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.thread_id)
            .collect();
        assert_eq!(ids, vec!["t", "u"]);
    }

    #[tokio::test]
    async fn second_task_continues_conversation() {
        let h = harness(
            InMemoryThreadStore::new(),
            ScriptedOracle::planning(vec![PlannedAction::shell("echo hi")]),
        );
        let first = h.runner.execute_task("t", "echo hi").await;
        let second = h.runner.execute_task("t", "echo again").await;

        assert_eq!(second.conversation_history.len(), first.conversation_history.len() + 2);
        assert_eq!(second.action_results.len(), 1);
        assert_ne!(first.checkpoint_id, second.checkpoint_id);
        assert_eq!(
            h.store.get_session("t").await.unwrap().unwrap().summary,
            "echo again"
        );
    }
}
