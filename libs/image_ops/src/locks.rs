//! The owner lock and its capability token.
//!
//! The owner lock serializes mutating operations against one image: the
//! caller takes it in shared mode before constructing an operation and keeps
//! it for the operation's whole lifetime, which also blocks an exclusive
//! ownership handoff mid-flight. [`OperationRequest::run`] takes the guard in
//! its signature, so an operation cannot be driven without it.
//!
//! Unlike the general-metadata and snapshot-table locks, this guard is held
//! across await points, hence the async lock.
//!
//! [`OperationRequest::run`]: crate::operation::OperationRequest::run

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
pub struct OwnerLock {
    inner: RwLock<()>,
}

impl OwnerLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared mode: the right to run mutating operations. Multiple readers
    /// would be possible at the lock level; the one-operation-at-a-time
    /// guarantee comes from callers driving operations sequentially while
    /// holding their guard.
    pub async fn lock_shared(&self) -> OwnerGuard<'_> {
        OwnerGuard {
            _guard: self.inner.read().await,
        }
    }

    /// Exclusive mode: ownership handoff, taken by external orchestration
    /// only once no operation guard is outstanding.
    pub async fn lock_exclusive(&self) -> OwnerWriteGuard<'_> {
        OwnerWriteGuard {
            _guard: self.inner.write().await,
        }
    }
}

/// Proof that the owner lock is held in shared mode.
pub struct OwnerGuard<'a> {
    _guard: RwLockReadGuard<'a, ()>,
}

pub struct OwnerWriteGuard<'a> {
    _guard: RwLockWriteGuard<'a, ()>,
}
