//! Per-thread serialization
//!
//! Reconciliation reads the latest exchange and then writes, so two messages
//! for the same thread must not interleave. Each `(app, thread)` key gets an
//! async mutex that lives only while someone holds or waits on it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockKey = (String, Uuid);

/// Registry of in-flight thread locks
#[derive(Clone, Default)]
pub struct ThreadLocks {
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `thread` within `app`.
    pub async fn lock(&self, app: &str, thread: Uuid) -> ThreadGuard {
        let key = (app.to_string(), thread);
        let mutex = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        let guard = mutex.lock_owned().await;
        ThreadGuard {
            guard: Some(guard),
            key,
            locks: Arc::clone(&self.locks),
        }
    }

    /// Number of threads currently locked or awaited
    pub fn active(&self) -> usize {
        self.locks.len()
    }
}

/// Held for the duration of one message's reconciliation.
pub struct ThreadGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: LockKey,
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the registry still references the mutex: nobody is waiting
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_lock_released_entry_removed() {
        let locks = ThreadLocks::new();
        let thread = Uuid::new_v4();
        {
            let _guard = locks.lock("app", thread).await;
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_same_thread_is_exclusive() {
        let locks = ThreadLocks::new();
        let thread = Uuid::new_v4();
        let guard = locks.lock("app", thread).await;

        let contender = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = contender.lock("app", thread).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_different_threads_do_not_block() {
        let locks = ThreadLocks::new();
        let _a = locks.lock("app", Uuid::new_v4()).await;
        let _b = locks.lock("app", Uuid::new_v4()).await;
        let _c = locks.lock("other", Uuid::new_v4()).await;
        assert_eq!(locks.active(), 3);
    }
}
