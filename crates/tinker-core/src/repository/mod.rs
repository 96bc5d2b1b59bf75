//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (tinker-infra) implements. The core crate never depends on any specific
//! storage technology.
//!
//! Snapshots and the checkpoint log are two separate interfaces even when one
//! physical store backs both: the snapshot store is the source of truth, the
//! log is an audit trail.

pub mod memory;

use tinker_types::error::RepositoryError;
use tinker_types::session::{CheckpointRecord, Session, SessionStatus, ThreadSnapshot};

/// Latest-state-by-thread persistence with overwrite semantics.
///
/// The store provides no per-thread locking. Callers serialize concurrent
/// writes to the same thread.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait CheckpointStore: Send + Sync {
    /// Durably overwrite the latest snapshot for `thread_id` before returning.
    fn put(
        &self,
        thread_id: &str,
        snapshot: &ThreadSnapshot,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// The latest snapshot for `thread_id`, if any.
    fn get(
        &self,
        thread_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ThreadSnapshot>, RepositoryError>> + Send;

    /// Remove the snapshot. Returns `true` if one existed.
    fn delete(
        &self,
        thread_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}

/// Append-only checkpoint metadata, listed newest-first.
pub trait CheckpointLog: Send + Sync {
    fn append(
        &self,
        record: &CheckpointRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Records for `thread_id`, newest first, optionally capped at `limit`.
    fn list_for_thread(
        &self,
        thread_id: &str,
        limit: Option<u32>,
    ) -> impl std::future::Future<Output = Result<Vec<CheckpointRecord>, RepositoryError>> + Send;

    /// Drop every record for `thread_id`. Returns the number removed.
    fn delete_for_thread(
        &self,
        thread_id: &str,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}

/// Per-thread session lifecycle records.
pub trait SessionRepository: Send + Sync {
    /// Insert a session or refresh the summary of an existing one.
    ///
    /// An existing session keeps its `created_at` and becomes active again;
    /// `last_accessed_at` is bumped either way.
    fn upsert_session(
        &self,
        thread_id: &str,
        summary: &str,
    ) -> impl std::future::Future<Output = Result<Session, RepositoryError>> + Send;

    /// Bump `last_accessed_at`. Returns `false` if there is no such session.
    fn touch_session(
        &self,
        thread_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    fn get_session(
        &self,
        thread_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Session>, RepositoryError>> + Send;

    /// All sessions, most recently accessed first.
    ///
    /// Ordering follows access order, not wall-clock time, so two accesses
    /// within the same clock tick still list in the order they happened.
    fn list_sessions(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Session>, RepositoryError>> + Send;

    /// Returns `false` if there is no such session.
    fn set_session_status(
        &self,
        thread_id: &str,
        status: SessionStatus,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}

/// A single backend holding snapshots, the checkpoint log, and sessions.
///
/// Adds the cross-table clear operations, which implementations should run
/// as one logical (ideally transactional) unit.
pub trait ThreadStore: CheckpointStore + CheckpointLog + SessionRepository {
    /// Remove the snapshot, log records, and session of one thread.
    ///
    /// Returns `true` if anything was removed.
    fn clear_thread(
        &self,
        thread_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Remove every thread. Returns the number of sessions removed.
    fn clear_all(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
