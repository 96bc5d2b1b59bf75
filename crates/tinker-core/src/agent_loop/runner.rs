//! Drives the reasoning loop with a checkpoint after every phase.

use std::sync::Arc;

use tinker_types::agent_loop::LoopState;

use crate::checkpoint::Checkpointer;
use crate::error::RunnerError;
use crate::executor::ActionExecutor;
use crate::oracle::ReasoningOracle;
use crate::repository::ThreadStore;
use crate::session::SessionRegistry;

use super::graph::{entry_node, successor, LoopNode};
use super::phases::LoopAgent;

/// Runs goals on threads, persisting after each loop phase.
///
/// Total work is bounded only by each run's `max_iterations`.
pub struct LoopRunner<S, O, E> {
    agent: LoopAgent<O, E>,
    checkpointer: Checkpointer<S>,
    sessions: SessionRegistry<S>,
    default_max_iterations: u32,
}

impl<S, O, E> LoopRunner<S, O, E>
where
    S: ThreadStore,
    O: ReasoningOracle,
    E: ActionExecutor,
{
    /// A zero `default_max_iterations` is raised to 1.
    pub fn new(store: Arc<S>, agent: LoopAgent<O, E>, default_max_iterations: u32) -> Self {
        Self {
            agent,
            checkpointer: Checkpointer::new(Arc::clone(&store)),
            sessions: SessionRegistry::new(store),
            default_max_iterations: default_max_iterations.max(1),
        }
    }

    pub fn checkpointer(&self) -> &Checkpointer<S> {
        &self.checkpointer
    }

    /// Run `goal` on a fresh loop for `thread_id`.
    ///
    /// A persistence failure stops the loop and is recorded on the returned
    /// state (`error` set, `should_continue` false).
    #[tracing::instrument(name = "run_goal", skip(self, goal), fields(thread_id = %thread_id))]
    pub async fn run_goal(&self, thread_id: &str, goal: &str, max_iterations: Option<u32>) -> LoopState {
        let mut state = self.new_state(thread_id, goal, max_iterations);
        match self.start(&mut state).await {
            Ok(()) => state,
            Err(e) => self.fail_persisted(state, e).await,
        }
    }

    pub async fn try_run_goal(
        &self,
        thread_id: &str,
        goal: &str,
        max_iterations: Option<u32>,
    ) -> Result<LoopState, RunnerError> {
        let mut state = self.new_state(thread_id, goal, max_iterations);
        self.start(&mut state).await?;
        Ok(state)
    }

    /// Continue a loop from its persisted phase.
    #[tracing::instrument(name = "resume_loop", skip(self), fields(thread_id = %thread_id))]
    pub async fn resume_loop(&self, thread_id: &str) -> LoopState {
        let mut state = match self.load(thread_id).await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(thread_id, error = %e, "could not resume loop");
                let mut state = LoopState::new(thread_id, "", 0);
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

    pub async fn try_resume_loop(&self, thread_id: &str) -> Result<LoopState, RunnerError> {
        let mut state = self.load(thread_id).await?;
        let entry = entry_node(&state);
        self.finish(&mut state, entry).await?;
        Ok(state)
    }

    /// Run one phase, checkpoint, and return the next node.
    pub async fn step(&self, node: LoopNode, state: &mut LoopState) -> Result<LoopNode, RunnerError> {
        match node {
            LoopNode::Think => self.agent.think(state).await,
            LoopNode::Act => self.agent.act(state).await,
            LoopNode::Observe => self.agent.observe(state),
            LoopNode::Decide => self.agent.decide(state),
            LoopNode::End => return Ok(LoopNode::End),
        }
        self.checkpointer.save_loop(state).await?;

        let next = successor(node, state);
        tracing::debug!(
            thread_id = %state.thread_id,
            iteration = state.iteration_count,
            %node,
            %next,
            "loop step"
        );
        Ok(next)
    }

    pub async fn drive(&self, state: &mut LoopState, entry: LoopNode) -> Result<(), RunnerError> {
        let mut node = entry;
        while node != LoopNode::End {
            node = self.step(node, state).await?;
        }
        Ok(())
    }

    /// The first think/act cycle always runs, so the bound is at least 1.
    fn new_state(&self, thread_id: &str, goal: &str, max_iterations: Option<u32>) -> LoopState {
        let max_iterations = match max_iterations {
            Some(0) => {
                tracing::warn!(thread_id, "max_iterations of 0 raised to 1");
                1
            }
            Some(n) => n,
            None => self.default_max_iterations,
        };
        LoopState::new(thread_id, goal, max_iterations)
    }

    async fn start(&self, state: &mut LoopState) -> Result<(), RunnerError> {
        self.sessions.create_session(&state.thread_id, &state.goal).await?;
        tracing::info!(
            thread_id = %state.thread_id,
            max_iterations = state.max_iterations,
            "starting reasoning loop"
        );
        // Persist the initial state so an interrupted first think is resumable.
        self.checkpointer.save_loop(state).await?;
        self.finish(state, LoopNode::Think).await
    }

    async fn load(&self, thread_id: &str) -> Result<LoopState, RunnerError> {
        self.checkpointer
            .load_loop(thread_id)
            .await?
            .ok_or_else(|| RunnerError::NoCheckpoint(thread_id.to_string()))
    }

    async fn finish(&self, state: &mut LoopState, entry: LoopNode) -> Result<(), RunnerError> {
        self.drive(state, entry).await?;
        self.sessions.touch(&state.thread_id).await?;
        tracing::info!(thread_id = %state.thread_id, "{}", summary(state));
        Ok(())
    }

    async fn fail_persisted(&self, mut state: LoopState, error: RunnerError) -> LoopState {
        tracing::error!(thread_id = %state.thread_id, error = %error, "loop failed");
        state.fail(error.to_string());
        if let Err(e) = self.checkpointer.save_loop(&state).await {
            tracing::warn!(thread_id = %state.thread_id, error = %e, "could not persist failed loop");
        }
        if let Err(e) = self.sessions.touch(&state.thread_id).await {
            tracing::debug!(thread_id = %state.thread_id, error = %e, "could not touch session");
        }
        state
    }
}

/// One-line description of how a loop ended (or where it stands).
pub fn summary(state: &LoopState) -> String {
    if let Some(error) = &state.error {
        return format!(
            "Loop failed at iteration {}/{}: {error}",
            state.iteration_count, state.max_iterations
        );
    }
    match state.exit_reason {
        Some(reason) if state.is_finished() => format!(
            "Loop finished after {} of {} iteration(s): {reason}",
            state.iteration_count, state.max_iterations
        ),
        _ => format!(
            "Loop paused at iteration {}/{} before {}",
            state.iteration_count, state.max_iterations, state.phase
        ),
    }
}
