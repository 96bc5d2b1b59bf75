//! Session registry: per-thread lifecycle tracking over a [`ThreadStore`].

use std::sync::Arc;

use tinker_types::error::RepositoryError;
use tinker_types::session::{summarize, Session, SessionStatus};

use crate::repository::ThreadStore;

/// What a clear operation removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearScope {
    /// One thread's snapshot, checkpoint log, and session.
    Thread(String),
    /// Every thread.
    Everything,
}

/// Creates, touches, lists, archives, and clears sessions.
pub struct SessionRegistry<S> {
    store: Arc<S>,
}

impl<S> Clone for SessionRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ThreadStore> SessionRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Insert or refresh the session for `thread_id`.
    ///
    /// The summary is the first 100 characters of `task_text`. Snapshot state
    /// held by the checkpoint store is not touched.
    pub async fn create_session(
        &self,
        thread_id: &str,
        task_text: &str,
    ) -> Result<Session, RepositoryError> {
        let session = self
            .store
            .upsert_session(thread_id, &summarize(task_text))
            .await?;
        tracing::debug!(thread_id, "session created or refreshed");
        Ok(session)
    }

    /// Record an access. A missing session is not an error.
    pub async fn touch(&self, thread_id: &str) -> Result<(), RepositoryError> {
        if !self.store.touch_session(thread_id).await? {
            tracing::debug!(thread_id, "touch on unknown session ignored");
        }
        Ok(())
    }

    pub async fn get(&self, thread_id: &str) -> Result<Option<Session>, RepositoryError> {
        self.store.get_session(thread_id).await
    }

    /// All sessions ordered by last access, most recent first.
    pub async fn list_sessions(&self) -> Result<Vec<Session>, RepositoryError> {
        self.store.list_sessions().await
    }

    /// Mark a session archived. Archived sessions stay listed and resumable.
    pub async fn archive(&self, thread_id: &str) -> Result<(), RepositoryError> {
        if self
            .store
            .set_session_status(thread_id, SessionStatus::Archived)
            .await?
        {
            tracing::info!(thread_id, "session archived");
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    /// Delete snapshot, checkpoint log, and session data.
    ///
    /// Returns the number of threads removed.
    pub async fn clear(&self, scope: ClearScope) -> Result<u64, RepositoryError> {
        match scope {
            ClearScope::Thread(thread_id) => {
                let removed = self.store.clear_thread(&thread_id).await?;
                tracing::info!(thread_id = %thread_id, removed, "cleared thread");
                Ok(u64::from(removed))
            }
            ClearScope::Everything => {
                tracing::warn!("clearing ALL threads, sessions and checkpoints");
                let removed = self.store.clear_all().await?;
                tracing::warn!(removed, "cleared all threads");
                Ok(removed)
            }
        }
    }
}
