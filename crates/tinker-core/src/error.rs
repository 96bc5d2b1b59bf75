use tinker_types::error::RepositoryError;

use crate::checkpoint::CheckpointError;

/// Errors surfaced by the pipeline and loop runners.
///
/// Only persistence can fail a run: oracle and executor failures are degraded
/// inside the graph nodes.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("session registry error: {0}")]
    Session(#[from] RepositoryError),

    #[error("no checkpoint found for thread {0}")]
    NoCheckpoint(String),
}
