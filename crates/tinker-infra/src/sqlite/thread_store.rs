//! SQLite thread store.
//!
//! Implements every repository port from `tinker-core` over three tables:
//! `thread_snapshots` (latest state per thread, stored as JSON),
//! `checkpoint_log` (append-only, ordered by an autoincrement `seq`), and
//! `sessions` (ordered by a monotonically increasing `access_seq`).

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use tinker_core::repository::{CheckpointLog, CheckpointStore, SessionRepository, ThreadStore};
use tinker_types::error::RepositoryError;
use tinker_types::session::{
    CheckpointRecord, Session, SessionStatus, SnapshotKind, ThreadSnapshot,
};
use tinker_types::task::ExecutionStatus;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ThreadStore`.
#[derive(Clone)]
pub struct SqliteThreadStore {
    pool: DatabasePool,
}

impl SqliteThreadStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn session_on_writer(&self, thread_id: &str) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE thread_id = ?")
            .bind(thread_id)
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.map(|r| {
            SessionRow::from_row(&r)
                .map_err(|e| RepositoryError::Query(e.to_string()))?
                .into_session()
        })
        .transpose()
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct SessionRow {
    thread_id: String,
    created_at: String,
    last_accessed_at: String,
    summary: String,
    status: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            thread_id: row.try_get("thread_id")?,
            created_at: row.try_get("created_at")?,
            last_accessed_at: row.try_get("last_accessed_at")?,
            summary: row.try_get("summary")?,
            status: row.try_get("status")?,
        })
    }

    fn into_session(self) -> Result<Session, RepositoryError> {
        let status: SessionStatus = self
            .status
            .parse()
            .map_err(RepositoryError::Query)?;
        Ok(Session {
            thread_id: self.thread_id,
            created_at: parse_datetime(&self.created_at)?,
            last_accessed_at: parse_datetime(&self.last_accessed_at)?,
            summary: self.summary,
            status,
        })
    }
}

struct CheckpointRow {
    checkpoint_id: String,
    thread_id: String,
    kind: String,
    resumption_marker: Option<String>,
    execution_status: String,
    created_at: String,
}

impl CheckpointRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            checkpoint_id: row.try_get("checkpoint_id")?,
            thread_id: row.try_get("thread_id")?,
            kind: row.try_get("kind")?,
            resumption_marker: row.try_get("resumption_marker")?,
            execution_status: row.try_get("execution_status")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_record(self) -> Result<CheckpointRecord, RepositoryError> {
        let kind: SnapshotKind = self.kind.parse().map_err(RepositoryError::Query)?;
        let execution_status: ExecutionStatus = self
            .execution_status
            .parse()
            .map_err(RepositoryError::Query)?;
        Ok(CheckpointRecord {
            checkpoint_id: parse_uuid(&self.checkpoint_id)?,
            thread_id: self.thread_id,
            created_at: parse_datetime(&self.created_at)?,
            kind,
            resumption_marker: self.resumption_marker,
            execution_status,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

impl CheckpointStore for SqliteThreadStore {
    async fn put(&self, thread_id: &str, snapshot: &ThreadSnapshot) -> Result<(), RepositoryError> {
        let json = serde_json::to_string(snapshot)?;

        sqlx::query(
            r#"INSERT INTO thread_snapshots (thread_id, kind, snapshot, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(thread_id) DO UPDATE SET
                 kind = excluded.kind,
                 snapshot = excluded.snapshot,
                 updated_at = excluded.updated_at"#,
        )
        .bind(thread_id)
        .bind(snapshot.kind().to_string())
        .bind(&json)
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, thread_id: &str) -> Result<Option<ThreadSnapshot>, RepositoryError> {
        let row = sqlx::query("SELECT snapshot FROM thread_snapshots WHERE thread_id = ?")
            .bind(thread_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let json: String = row
                    .try_get("snapshot")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, thread_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM thread_snapshots WHERE thread_id = ?")
            .bind(thread_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// Checkpoint log
// ---------------------------------------------------------------------------

impl CheckpointLog for SqliteThreadStore {
    async fn append(&self, record: &CheckpointRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO checkpoint_log
                 (checkpoint_id, thread_id, kind, resumption_marker, execution_status, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.checkpoint_id.to_string())
        .bind(&record.thread_id)
        .bind(record.kind.to_string())
        .bind(&record.resumption_marker)
        .bind(record.execution_status.to_string())
        .bind(format_datetime(&record.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.message().contains("UNIQUE") {
                    return RepositoryError::Conflict(format!(
                        "checkpoint {} already recorded",
                        record.checkpoint_id
                    ));
                }
            }
            RepositoryError::Query(e.to_string())
        })?;

        Ok(())
    }

    async fn list_for_thread(
        &self,
        thread_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<CheckpointRecord>, RepositoryError> {
        // LIMIT -1 means no limit in SQLite.
        let limit = limit.map_or(-1, i64::from);

        let rows = sqlx::query(
            "SELECT * FROM checkpoint_log WHERE thread_id = ? ORDER BY seq DESC LIMIT ?",
        )
        .bind(thread_id)
        .bind(limit)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|r| {
                CheckpointRow::from_row(r)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_record()
            })
            .collect()
    }

    async fn delete_for_thread(&self, thread_id: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM checkpoint_log WHERE thread_id = ?")
            .bind(thread_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

impl SessionRepository for SqliteThreadStore {
    async fn upsert_session(&self, thread_id: &str, summary: &str) -> Result<Session, RepositoryError> {
        let now = format_datetime(&Utc::now());

        sqlx::query(
            r#"INSERT INTO sessions (thread_id, created_at, last_accessed_at, access_seq, summary, status)
               VALUES (?, ?, ?, (SELECT COALESCE(MAX(access_seq), 0) + 1 FROM sessions), ?, 'active')
               ON CONFLICT(thread_id) DO UPDATE SET
                 last_accessed_at = excluded.last_accessed_at,
                 access_seq = excluded.access_seq,
                 summary = excluded.summary,
                 status = 'active'"#,
        )
        .bind(thread_id)
        .bind(&now)
        .bind(&now)
        .bind(summary)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        self.session_on_writer(thread_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn touch_session(&self, thread_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE sessions SET
                 last_accessed_at = ?,
                 access_seq = (SELECT COALESCE(MAX(access_seq), 0) + 1 FROM sessions)
               WHERE thread_id = ?"#,
        )
        .bind(format_datetime(&Utc::now()))
        .bind(thread_id)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_session(&self, thread_id: &str) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE thread_id = ?")
            .bind(thread_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.map(|r| {
            SessionRow::from_row(&r)
                .map_err(|e| RepositoryError::Query(e.to_string()))?
                .into_session()
        })
        .transpose()
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM sessions ORDER BY access_seq DESC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|r| {
                SessionRow::from_row(r)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_session()
            })
            .collect()
    }

    async fn set_session_status(
        &self,
        thread_id: &str,
        status: SessionStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE sessions SET status = ? WHERE thread_id = ?")
            .bind(status.to_string())
            .bind(thread_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// Clear
// ---------------------------------------------------------------------------

impl ThreadStore for SqliteThreadStore {
    async fn clear_thread(&self, thread_id: &str) -> Result<bool, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut removed = 0;
        for sql in [
            "DELETE FROM thread_snapshots WHERE thread_id = ?",
            "DELETE FROM checkpoint_log WHERE thread_id = ?",
            "DELETE FROM sessions WHERE thread_id = ?",
        ] {
            removed += sqlx::query(sql)
                .bind(thread_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?
                .rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(removed > 0)
    }

    async fn clear_all(&self) -> Result<u64, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let sessions = sqlx::query("DELETE FROM sessions")
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .rows_affected();

        for sql in ["DELETE FROM thread_snapshots", "DELETE FROM checkpoint_log"] {
            sqlx::query(sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(sessions)
    }
}
