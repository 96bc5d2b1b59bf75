//! Application state wiring the engine together.
//!
//! The runners are generic over the thread store, so `AppState` is too:
//! `main` builds either an `AppState<SqliteThreadStore>` (the default) or an
//! `AppState<InMemoryThreadStore>` (`--ephemeral`) and dispatches commands
//! against whichever it built.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use tinker_core::agent_loop::{LoopAgent, LoopRunner};
use tinker_core::checkpoint::Checkpointer;
use tinker_core::oracle::BoxOracle;
use tinker_core::pipeline::{TaskPipeline, TaskRunner};
use tinker_core::repository::ThreadStore;
use tinker_core::session::SessionRegistry;
use tinker_infra::executor::ShellExecutor;
use tinker_infra::oracle::{AnthropicOracle, DirectOracle};
use tinker_infra::sqlite::pool::{database_url, DatabasePool};
use tinker_infra::sqlite::thread_store::SqliteThreadStore;
use tinker_types::config::{OracleKind, TinkerConfig};

use crate::locks::ThreadLocks;

/// Concrete runner types pinned to the boxed oracle and the shell executor.
pub type ConcreteTaskRunner<S> = TaskRunner<S, BoxOracle, ShellExecutor>;

pub type ConcreteLoopRunner<S> = LoopRunner<S, BoxOracle, ShellExecutor>;

/// Shared application state for every command.
pub struct AppState<S> {
    pub tasks: ConcreteTaskRunner<S>,
    pub agent: ConcreteLoopRunner<S>,
    pub sessions: SessionRegistry<S>,
    pub checkpointer: Checkpointer<S>,
    pub locks: ThreadLocks,
}

impl<S: ThreadStore> AppState<S> {
    /// Wire runners, registry, and checkpointer over one shared store.
    pub fn new(store: S, oracle: BoxOracle, config: &TinkerConfig) -> Self {
        let store = Arc::new(store);
        let oracle = Arc::new(oracle);
        let executor = Arc::new(ShellExecutor::from_config(&config.executor));

        let pipeline = TaskPipeline::new(Arc::clone(&oracle), Arc::clone(&executor))
            .with_synthesis(config.synthesize)
            .with_working_dir(config.executor.working_dir.clone());
        let agent = LoopAgent::new(oracle, executor, config.executor.working_dir.clone());

        Self {
            tasks: TaskRunner::new(Arc::clone(&store), pipeline),
            agent: LoopRunner::new(Arc::clone(&store), agent, config.max_iterations),
            sessions: SessionRegistry::new(Arc::clone(&store)),
            checkpointer: Checkpointer::new(store),
            locks: ThreadLocks::new(),
        }
    }
}

/// Build the oracle selected by `kind`.
pub fn build_oracle(kind: OracleKind, config: &TinkerConfig) -> anyhow::Result<BoxOracle> {
    Ok(match kind {
        OracleKind::Direct => BoxOracle::new(
            DirectOracle::new().with_command_prefixes(config.direct_command_prefixes.clone()),
        ),
        OracleKind::Anthropic => {
            let oracle = AnthropicOracle::from_env(config.model.clone(), config.max_tokens)
                .context("Anthropic oracle unavailable (set ANTHROPIC_API_KEY or use --oracle direct)")?;
            BoxOracle::new(oracle)
        }
    })
}

/// Open (and migrate) the SQLite thread store in `data_dir`.
pub async fn open_sqlite_store(data_dir: &Path) -> anyhow::Result<SqliteThreadStore> {
    tokio::fs::create_dir_all(data_dir)
        .await
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let url = format!("{}?mode=rwc", database_url(data_dir));
    let pool = DatabasePool::new(&url)
        .await
        .with_context(|| format!("Failed to open database at {}", data_dir.display()))?;

    Ok(SqliteThreadStore::new(pool))
}
