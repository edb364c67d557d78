//! Self-lock detection (§5): an async mutex that refuses to let a task
//! re-enter a lock it already holds, rather than deadlocking silently.
//!
//! The original ran thread-per-request and kept a thread-local set of held
//! lock ids (`LockwSLD`). This resolver is task-per-request under tokio, so
//! the same idea is expressed with [`tokio::task_local!`] instead of thread
//! identity — the set of lock ids held by the *current task* rather than
//! the current OS thread.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::DnsError;

tokio::task_local! {
    static HELD_LOCKS: std::cell::RefCell<Vec<Uuid>>;
}

/// An async mutex that detects a task trying to acquire a lock it already
/// holds, returning [`DnsError::ServerFault`] instead of deadlocking.
pub struct SelfLockMutex<T> {
    id: Uuid,
    inner: Mutex<T>,
}

impl<T> SelfLockMutex<T> {
    pub fn new(value: T) -> Self {
        SelfLockMutex { id: Uuid::new_v4(), inner: Mutex::new(value) }
    }

    /// Acquires the lock, erroring immediately if the current task already
    /// holds it rather than blocking forever.
    pub async fn lock(self: &Arc<Self>) -> Result<SelfLockGuard<'_, T>, DnsError> {
        let already_held = HELD_LOCKS
            .try_with(|held| held.borrow().contains(&self.id))
            .unwrap_or(false);
        if already_held {
            return Err(DnsError::ServerFault(
                "self-lock detected: task already holds this connection's lock".to_string(),
            ));
        }

        let guard = self.inner.lock().await;
        // Best effort: if we're not inside a task-local scope (e.g. a bare
        // unit test), skip bookkeeping rather than failing the lock.
        let _ = HELD_LOCKS.try_with(|held| held.borrow_mut().push(self.id));
        Ok(SelfLockGuard { id: self.id, guard })
    }

    /// Runs `fut` with the current task registered as holding no locks yet,
    /// establishing the task-local scope `lock` depends on. Entry points
    /// (listeners) should wrap each accepted request in this.
    pub async fn scoped<F, R>(fut: F) -> R
    where
        F: std::future::Future<Output = R>,
    {
        HELD_LOCKS.scope(std::cell::RefCell::new(Vec::new()), fut).await
    }
}

pub struct SelfLockGuard<'a, T> {
    id: Uuid,
    guard: MutexGuard<'a, T>,
}

impl<'a, T> std::ops::Deref for SelfLockGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<'a, T> std::ops::DerefMut for SelfLockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<'a, T> Drop for SelfLockGuard<'a, T> {
    fn drop(&mut self) {
        let id = self.id;
        let _ = HELD_LOCKS.try_with(|held| held.borrow_mut().retain(|h| *h != id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_succeeds_within_scope() {
        let mutex = Arc::new(SelfLockMutex::new(0_i32));
        SelfLockMutex::scoped(async {
            let mut guard = mutex.lock().await.unwrap();
            *guard += 1;
        })
        .await;
    }

    #[tokio::test]
    async fn test_reentrant_lock_is_detected() {
        let mutex = Arc::new(SelfLockMutex::new(0_i32));
        SelfLockMutex::scoped(async {
            let _outer = mutex.lock().await.unwrap();
            let err = mutex.lock().await.unwrap_err();
            assert!(matches!(err, DnsError::ServerFault(_)));
        })
        .await;
    }

    #[tokio::test]
    async fn test_lock_released_after_guard_drop() {
        let mutex = Arc::new(SelfLockMutex::new(0_i32));
        SelfLockMutex::scoped(async {
            {
                let _guard = mutex.lock().await.unwrap();
            }
            let _again = mutex.lock().await.unwrap();
        })
        .await;
    }
}
