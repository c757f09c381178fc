use crate::completion::CompletionBridge;

/// Protection status stored per snapshot in the image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionStatus {
    Unprotected,
    Protected,
    /// Transitional status written while an unprotect is in flight.
    Unprotecting,
}

/// A class-method call understood by the image-header object class.
///
/// Wire encoding is owned by the store's extension mechanism; this enum is
/// the in-process representation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodCall {
    /// Set the stored refcount of the snapshot to zero.
    ClearSnapshotRefcount { snap_id: u64 },
    /// Reduce the stored refcount of the snapshot by one, floored at zero.
    DecrementSnapshotRefcount { snap_id: u64 },
    /// Set the stored protection status of the snapshot.
    SetSnapshotProtection {
        snap_id: u64,
        status: ProtectionStatus,
    },
}

/// An ordered sequence of [`MethodCall`]s applied all-or-nothing to a single
/// named object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBatch {
    calls: Vec<MethodCall>,
}

impl WriteBatch {
    pub fn calls(&self) -> &[MethodCall] {
        &self.calls
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Accumulates class-method calls into one atomic [`WriteBatch`], one helper
/// per call the header object class exposes.
#[derive(Debug, Default)]
pub struct WriteBatchBuilder {
    calls: Vec<MethodCall>,
}

impl WriteBatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_snapshot_refcount(&mut self, snap_id: u64) -> &mut Self {
        self.calls.push(MethodCall::ClearSnapshotRefcount { snap_id });
        self
    }

    pub fn decrement_snapshot_refcount(&mut self, snap_id: u64) -> &mut Self {
        self.calls
            .push(MethodCall::DecrementSnapshotRefcount { snap_id });
        self
    }

    pub fn set_snapshot_protection(&mut self, snap_id: u64, status: ProtectionStatus) -> &mut Self {
        self.calls
            .push(MethodCall::SetSnapshotProtection { snap_id, status });
        self
    }

    pub fn build(self) -> WriteBatch {
        WriteBatch { calls: self.calls }
    }
}

/// Submission boundary to the object store.
///
/// Submission is fire-and-forget: the batch and its completion handle belong
/// to the store runtime from the moment this returns, and the returned bridge
/// resolves exactly once with `0` on success or a negated [`codes`] value on
/// failure. No retries, no cancellation at this layer.
///
/// [`codes`]: crate::codes
pub trait ObjectStore: Send + Sync {
    fn submit_atomic_write(&self, object: &str, batch: WriteBatch) -> CompletionBridge;
}
