//! Process-local thread store backed by `DashMap`.
//!
//! Used for `--ephemeral` runs and as the reference implementation in tests.
//! Values are cloned on read so no `DashMap` guard outlives a call.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;

use tinker_types::error::RepositoryError;
use tinker_types::session::{CheckpointRecord, Session, SessionStatus, ThreadSnapshot};

use super::{CheckpointLog, CheckpointStore, SessionRepository, ThreadStore};

#[derive(Debug, Clone)]
struct SessionEntry {
    session: Session,
    access_seq: u64,
}

/// In-memory implementation of every repository port.
#[derive(Debug, Default)]
pub struct InMemoryThreadStore {
    snapshots: DashMap<String, ThreadSnapshot>,
    log: DashMap<String, Vec<CheckpointRecord>>,
    sessions: DashMap<String, SessionEntry>,
    access_seq: AtomicU64,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.access_seq.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl CheckpointStore for InMemoryThreadStore {
    async fn put(&self, thread_id: &str, snapshot: &ThreadSnapshot) -> Result<(), RepositoryError> {
        self.snapshots.insert(thread_id.to_string(), snapshot.clone());
        Ok(())
    }

    async fn get(&self, thread_id: &str) -> Result<Option<ThreadSnapshot>, RepositoryError> {
        Ok(self.snapshots.get(thread_id).map(|r| r.value().clone()))
    }

    async fn delete(&self, thread_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.snapshots.remove(thread_id).is_some())
    }
}

impl CheckpointLog for InMemoryThreadStore {
    async fn append(&self, record: &CheckpointRecord) -> Result<(), RepositoryError> {
        self.log
            .entry(record.thread_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn list_for_thread(
        &self,
        thread_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<CheckpointRecord>, RepositoryError> {
        let records = match self.log.get(thread_id) {
            Some(entry) => entry.value().clone(),
            None => return Ok(Vec::new()),
        };
        let limit = limit.map_or(usize::MAX, |l| l as usize);
        Ok(records.into_iter().rev().take(limit).collect())
    }

    async fn delete_for_thread(&self, thread_id: &str) -> Result<u64, RepositoryError> {
        Ok(self
            .log
            .remove(thread_id)
            .map_or(0, |(_, records)| records.len() as u64))
    }
}

impl SessionRepository for InMemoryThreadStore {
    async fn upsert_session(&self, thread_id: &str, summary: &str) -> Result<Session, RepositoryError> {
        let now = Utc::now();
        let seq = self.next_seq();
        let mut entry = self
            .sessions
            .entry(thread_id.to_string())
            .or_insert_with(|| SessionEntry {
                session: Session {
                    thread_id: thread_id.to_string(),
                    created_at: now,
                    last_accessed_at: now,
                    summary: summary.to_string(),
                    status: SessionStatus::Active,
                },
                access_seq: seq,
            });
        entry.session.summary = summary.to_string();
        entry.session.status = SessionStatus::Active;
        entry.session.last_accessed_at = now;
        entry.access_seq = seq;
        Ok(entry.session.clone())
    }

    async fn touch_session(&self, thread_id: &str) -> Result<bool, RepositoryError> {
        let seq = self.next_seq();
        match self.sessions.get_mut(thread_id) {
            Some(mut entry) => {
                entry.session.last_accessed_at = Utc::now();
                entry.access_seq = seq;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_session(&self, thread_id: &str) -> Result<Option<Session>, RepositoryError> {
        Ok(self.sessions.get(thread_id).map(|r| r.session.clone()))
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, RepositoryError> {
        let mut entries: Vec<SessionEntry> =
            self.sessions.iter().map(|r| r.value().clone()).collect();
        entries.sort_by(|a, b| b.access_seq.cmp(&a.access_seq));
        Ok(entries.into_iter().map(|e| e.session).collect())
    }

    async fn set_session_status(
        &self,
        thread_id: &str,
        status: SessionStatus,
    ) -> Result<bool, RepositoryError> {
        match self.sessions.get_mut(thread_id) {
            Some(mut entry) => {
                entry.session.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl ThreadStore for InMemoryThreadStore {
    async fn clear_thread(&self, thread_id: &str) -> Result<bool, RepositoryError> {
        let had_snapshot = self.snapshots.remove(thread_id).is_some();
        let had_log = self.log.remove(thread_id).is_some();
        let had_session = self.sessions.remove(thread_id).is_some();
        Ok(had_snapshot || had_log || had_session)
    }

    async fn clear_all(&self) -> Result<u64, RepositoryError> {
        let count = self.sessions.len() as u64;
        self.snapshots.clear();
        self.log.clear();
        self.sessions.clear();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinker_types::agent_loop::LoopState;
    use tinker_types::task::TaskState;

    fn task_snapshot(thread_id: &str, task: &str) -> ThreadSnapshot {
        ThreadSnapshot::Task(TaskState::new(thread_id, task))
    }

    #[tokio::test]
    async fn put_overwrites_latest_snapshot() {
        let store = InMemoryThreadStore::new();
        store.put("a", &task_snapshot("a", "first")).await.unwrap();
        store.put("a", &task_snapshot("a", "second")).await.unwrap();

        match store.get("a").await.unwrap() {
            Some(ThreadSnapshot::Task(state)) => assert_eq!(state.task_content, "second"),
            other => panic!("unexpected snapshot: {other:?}"),
        }
    }

    #[tokio::test]
    async fn distinct_threads_do_not_interfere() {
        let store = InMemoryThreadStore::new();
        store.put("a", &task_snapshot("a", "ls")).await.unwrap();
        store
            .put("b", &ThreadSnapshot::Loop(LoopState::new("b", "goal", 3)))
            .await
            .unwrap();

        assert_eq!(store.get("a").await.unwrap().unwrap().thread_id(), "a");
        assert_eq!(store.get("b").await.unwrap().unwrap().thread_id(), "b");
        assert!(store.get("c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn log_lists_newest_first_with_limit() {
        let store = InMemoryThreadStore::new();
        let mut ids = Vec::new();
        for task in ["one", "two", "three"] {
            let record = CheckpointRecord::for_snapshot(&task_snapshot("a", task));
            ids.push(record.checkpoint_id);
            store.append(&record).await.unwrap();
        }

        let listed = store.list_for_thread("a", None).await.unwrap();
        let listed_ids: Vec<_> = listed.iter().map(|r| r.checkpoint_id).collect();
        assert_eq!(listed_ids, vec![ids[2], ids[1], ids[0]]);

        let limited = store.list_for_thread("a", Some(2)).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].checkpoint_id, ids[2]);
        assert!(store.list_for_thread("missing", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sessions_order_by_access() {
        let store = InMemoryThreadStore::new();
        store.upsert_session("a", "task a").await.unwrap();
        store.upsert_session("b", "task b").await.unwrap();
        store.touch_session("a").await.unwrap();
        store.touch_session("b").await.unwrap();

        let ids: Vec<_> = store
            .list_sessions()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.thread_id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn upsert_keeps_created_at_and_refreshes_summary() {
        let store = InMemoryThreadStore::new();
        let first = store.upsert_session("a", "old").await.unwrap();
        let second = store.upsert_session("a", "new").await.unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.summary, "new");
        assert!(!store.touch_session("missing").await.unwrap());
    }

    #[tokio::test]
    async fn clear_thread_removes_only_that_thread() {
        let store = InMemoryThreadStore::new();
        for id in ["a", "b"] {
            let snap = task_snapshot(id, "ls");
            store.put(id, &snap).await.unwrap();
            store.append(&CheckpointRecord::for_snapshot(&snap)).await.unwrap();
            store.upsert_session(id, "ls").await.unwrap();
        }

        assert!(store.clear_thread("a").await.unwrap());
        assert!(store.get("a").await.unwrap().is_none());
        assert!(store.get_session("a").await.unwrap().is_none());
        assert!(store.list_for_thread("a", None).await.unwrap().is_empty());
        assert!(store.get("b").await.unwrap().is_some());
        assert!(!store.clear_thread("a").await.unwrap());

        assert_eq!(store.clear_all().await.unwrap(), 1);
        assert!(store.list_sessions().await.unwrap().is_empty());
    }
}
