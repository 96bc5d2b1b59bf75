//! Per-thread serialization.
//!
//! The engine leaves same-thread concurrency undefined, so every run or
//! resume holds the thread's lock for its whole duration.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Map of `thread_id` to an async mutex, created on first use.
#[derive(Debug, Default, Clone)]
pub struct ThreadLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `thread_id`.
    pub async fn acquire(&self, thread_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .inner
            .entry(thread_id.to_string())
            .or_default()
            .value()
            .clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_thread_waits() {
        let locks = ThreadLocks::new();
        let guard = locks.acquire("a").await;

        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = other.acquire("a").await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn distinct_threads_do_not_block() {
        let locks = ThreadLocks::new();
        let _a = locks.acquire("a").await;
        tokio::time::timeout(Duration::from_secs(1), locks.acquire("b"))
            .await
            .unwrap();
    }
}
