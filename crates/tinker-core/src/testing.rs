//! Scripted collaborators shared by the graph and runner tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::json;

use tinker_types::error::RepositoryError;
use tinker_types::session::{CheckpointRecord, Session, SessionStatus, ThreadSnapshot};
use tinker_types::task::{ActionOutcome, PlannedAction};

use crate::executor::{ActionContext, ActionExecutor, ExecutorError};
use crate::oracle::{OracleError, OracleQuery, OracleResponse, ReasoningOracle};
use crate::repository::memory::InMemoryThreadStore;
use crate::repository::{CheckpointLog, CheckpointStore, SessionRepository, ThreadStore};

type Handler = dyn Fn(&OracleQuery<'_>) -> Result<OracleResponse, OracleError> + Send + Sync;

/// Oracle answering every query through a closure, counting calls per kind.
pub struct ScriptedOracle {
    handler: Box<Handler>,
    calls: Mutex<Vec<&'static str>>,
}

impl ScriptedOracle {
    pub fn new(
        handler: impl Fn(&OracleQuery<'_>) -> Result<OracleResponse, OracleError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Plans `actions` on analyze and summarises on synthesize.
    pub fn planning(actions: Vec<PlannedAction>) -> Self {
        Self::new(move |query| match query {
            OracleQuery::Analyze { .. } => {
                Ok(OracleResponse::narrative("plan ready").with_actions(actions.clone()))
            }
            OracleQuery::Synthesize { .. } => Ok(OracleResponse::narrative("all done")),
            _ => Ok(OracleResponse::default()),
        })
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == name)
            .count()
    }
}

impl ReasoningOracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn consult(&self, query: &OracleQuery<'_>) -> Result<OracleResponse, OracleError> {
        self.calls.lock().unwrap().push(query.name());
        (self.handler)(query)
    }
}

/// Executor faking a shell.
///
/// `echo X` prints `X`, `false` fails, `explode` makes the executor itself
/// error, and `noop` actions succeed.
#[derive(Default)]
pub struct ScriptedExecutor {
    executed: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

impl ActionExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        action: &PlannedAction,
        _ctx: &ActionContext<'_>,
    ) -> Result<ActionOutcome, ExecutorError> {
        if action.is_noop() {
            return Ok(ActionOutcome::succeeded(action.params.clone()));
        }
        let command = action
            .command()
            .ok_or_else(|| ExecutorError::InvalidParams("missing command".into()))?
            .to_string();
        self.executed.lock().unwrap().push(command.clone());

        if command == "explode" {
            return Err(ExecutorError::Spawn("no shell".into()));
        }
        if command == "false" {
            return Ok(ActionOutcome::failed(
                "exit status 1",
                json!({"command": command, "stdout": "", "stderr": "", "returncode": 1}),
            ));
        }
        let stdout = command
            .strip_prefix("echo ")
            .map(|s| format!("{s}\n"))
            .unwrap_or_default();
        Ok(ActionOutcome::succeeded(
            json!({"command": command, "stdout": stdout, "stderr": "", "returncode": 0}),
        ))
    }
}

/// In-memory store whose snapshot writes can be switched to fail.
///
/// `fail_after` lets a number of puts succeed before failing.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryThreadStore,
    failing: AtomicBool,
    puts_before_failure: AtomicUsize,
}

impl FlakyStore {
    pub fn failing() -> Self {
        let store = Self::default();
        store.failing.store(true, Ordering::SeqCst);
        store
    }

    pub fn fail_after(puts: usize) -> Self {
        let store = Self::failing();
        store.puts_before_failure.store(puts, Ordering::SeqCst);
        store
    }

    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }
}

impl CheckpointStore for FlakyStore {
    async fn put(&self, thread_id: &str, snapshot: &ThreadSnapshot) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            let remaining = self.puts_before_failure.load(Ordering::SeqCst);
            if remaining == 0 {
                return Err(RepositoryError::Query("database is locked".into()));
            }
            self.puts_before_failure.store(remaining - 1, Ordering::SeqCst);
        }
        self.inner.put(thread_id, snapshot).await
    }

    async fn get(&self, thread_id: &str) -> Result<Option<ThreadSnapshot>, RepositoryError> {
        self.inner.get(thread_id).await
    }

    async fn delete(&self, thread_id: &str) -> Result<bool, RepositoryError> {
        CheckpointStore::delete(&self.inner, thread_id).await
    }
}

impl CheckpointLog for FlakyStore {
    async fn append(&self, record: &CheckpointRecord) -> Result<(), RepositoryError> {
        self.inner.append(record).await
    }

    async fn list_for_thread(
        &self,
        thread_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<CheckpointRecord>, RepositoryError> {
        self.inner.list_for_thread(thread_id, limit).await
    }

    async fn delete_for_thread(&self, thread_id: &str) -> Result<u64, RepositoryError> {
        self.inner.delete_for_thread(thread_id).await
    }
}

impl SessionRepository for FlakyStore {
    async fn upsert_session(&self, thread_id: &str, summary: &str) -> Result<Session, RepositoryError> {
        self.inner.upsert_session(thread_id, summary).await
    }

    async fn touch_session(&self, thread_id: &str) -> Result<bool, RepositoryError> {
        self.inner.touch_session(thread_id).await
    }

    async fn get_session(&self, thread_id: &str) -> Result<Option<Session>, RepositoryError> {
        self.inner.get_session(thread_id).await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, RepositoryError> {
        self.inner.list_sessions().await
    }

    async fn set_session_status(
        &self,
        thread_id: &str,
        status: SessionStatus,
    ) -> Result<bool, RepositoryError> {
        self.inner.set_session_status(thread_id, status).await
    }
}

impl ThreadStore for FlakyStore {
    async fn clear_thread(&self, thread_id: &str) -> Result<bool, RepositoryError> {
        self.inner.clear_thread(thread_id).await
    }

    async fn clear_all(&self) -> Result<u64, RepositoryError> {
        self.inner.clear_all().await
    }
}
