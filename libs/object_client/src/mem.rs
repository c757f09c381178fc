//! In-memory [`ObjectStore`] backend.
//!
//! Keeps the header state of every object it has seen and applies batches
//! with the same all-or-nothing semantics a real backend provides: every call
//! in a batch is validated first, and a failing call leaves the object
//! untouched. Doubles as the test backend; submissions are recorded and
//! failures can be injected per submission.

use std::collections::{BTreeMap, HashMap, VecDeque};

use parking_lot::Mutex;
use tracing::debug;

use crate::codes;
use crate::completion::CompletionBridge;
use crate::store::{MethodCall, ObjectStore, ProtectionStatus, WriteBatch};

/// Per-object header state: snapshot refcounts and protection statuses.
///
/// Snapshots must be seeded before refcount or protection calls touch them,
/// mirroring a real header class rejecting calls against unknown snapshot
/// records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderObject {
    refcounts: BTreeMap<u64, u64>,
    protection: BTreeMap<u64, ProtectionStatus>,
}

impl HeaderObject {
    pub fn refcount(&self, snap_id: u64) -> Option<u64> {
        self.refcounts.get(&snap_id).copied()
    }

    pub fn protection(&self, snap_id: u64) -> Option<ProtectionStatus> {
        self.protection.get(&snap_id).copied()
    }

    fn validate(&self, call: &MethodCall) -> i32 {
        let snap_id = match call {
            MethodCall::ClearSnapshotRefcount { snap_id }
            | MethodCall::DecrementSnapshotRefcount { snap_id }
            | MethodCall::SetSnapshotProtection { snap_id, .. } => *snap_id,
        };
        if self.refcounts.contains_key(&snap_id) {
            0
        } else {
            -codes::ENOENT
        }
    }

    fn apply(&mut self, call: &MethodCall) {
        match call {
            MethodCall::ClearSnapshotRefcount { snap_id } => {
                self.refcounts.insert(*snap_id, 0);
            }
            MethodCall::DecrementSnapshotRefcount { snap_id } => {
                let count = self.refcounts.entry(*snap_id).or_insert(0);
                *count = count.saturating_sub(1);
            }
            MethodCall::SetSnapshotProtection { snap_id, status } => {
                self.protection.insert(*snap_id, *status);
            }
        }
    }
}

/// One recorded call to [`ObjectStore::submit_atomic_write`].
#[derive(Debug, Clone)]
pub struct Submission {
    pub object: String,
    pub batch: WriteBatch,
}

#[derive(Default)]
struct StoreState {
    objects: HashMap<String, HeaderObject>,
    forced_results: VecDeque<i32>,
    submissions: Vec<Submission>,
}

/// See module docs.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the snapshot record on the object, with the given refcount and
    /// protection status. Header maintenance is the owning layer's job; this
    /// stands in for it.
    pub fn seed_snapshot(
        &self,
        object: &str,
        snap_id: u64,
        refcount: u64,
        status: ProtectionStatus,
    ) {
        let mut state = self.state.lock();
        let header = state.objects.entry(object.to_owned()).or_default();
        header.refcounts.insert(snap_id, refcount);
        header.protection.insert(snap_id, status);
    }

    /// Forces the next submission to resolve with `code` without applying
    /// its batch. Injected failures queue up in FIFO order.
    pub fn inject_failure(&self, code: i32) {
        self.state.lock().forced_results.push_back(code);
    }

    pub fn object(&self, name: &str) -> Option<HeaderObject> {
        self.state.lock().objects.get(name).cloned()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().submissions.clone()
    }

    fn apply_atomic(&self, object: &str, batch: &WriteBatch) -> i32 {
        let mut state = self.state.lock();
        state.submissions.push(Submission {
            object: object.to_owned(),
            batch: batch.clone(),
        });

        if let Some(code) = state.forced_results.pop_front() {
            return code;
        }

        let header = state.objects.entry(object.to_owned()).or_default();
        for call in batch.calls() {
            let code = header.validate(call);
            if code < 0 {
                return code;
            }
        }
        for call in batch.calls() {
            header.apply(call);
        }
        0
    }
}

impl ObjectStore for InMemoryStore {
    fn submit_atomic_write(&self, object: &str, batch: WriteBatch) -> CompletionBridge {
        let code = self.apply_atomic(object, &batch);
        debug!(object, calls = batch.len(), code, "atomic write applied");

        let (tx, rx) = CompletionBridge::channel();
        tx.complete(code);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OID: &str = "image_header.img";

    fn store_with_snap(snap_id: u64, refcount: u64) -> InMemoryStore {
        let store = InMemoryStore::new();
        store.seed_snapshot(OID, snap_id, refcount, ProtectionStatus::Unprotected);
        store
    }

    #[tokio::test]
    async fn clear_sets_refcount_to_zero() {
        let store = store_with_snap(7, 3);
        let mut batch = crate::WriteBatchBuilder::new();
        batch.clear_snapshot_refcount(7);

        let code = store.submit_atomic_write(OID, batch.build()).wait().await;
        assert_eq!(code, 0);
        assert_eq!(store.object(OID).unwrap().refcount(7), Some(0));
    }

    #[tokio::test]
    async fn decrement_floors_at_zero() {
        let store = store_with_snap(7, 1);
        for expected in [0, 0] {
            let mut batch = crate::WriteBatchBuilder::new();
            batch.decrement_snapshot_refcount(7);
            let code = store.submit_atomic_write(OID, batch.build()).wait().await;
            assert_eq!(code, 0);
            assert_eq!(store.object(OID).unwrap().refcount(7), Some(expected));
        }
    }

    #[tokio::test]
    async fn failing_call_leaves_object_untouched() {
        let store = store_with_snap(7, 3);
        let mut batch = crate::WriteBatchBuilder::new();
        // Second call targets an unknown snapshot: the whole batch must be
        // rejected, including the otherwise-valid first call.
        batch.clear_snapshot_refcount(7).decrement_snapshot_refcount(9);

        let code = store.submit_atomic_write(OID, batch.build()).wait().await;
        assert_eq!(code, -codes::ENOENT);
        assert_eq!(store.object(OID).unwrap().refcount(7), Some(3));
    }

    #[tokio::test]
    async fn injected_failure_skips_application() {
        let store = store_with_snap(7, 3);
        store.inject_failure(-codes::EIO);

        let mut batch = crate::WriteBatchBuilder::new();
        batch.clear_snapshot_refcount(7);
        let code = store.submit_atomic_write(OID, batch.build()).wait().await;

        assert_eq!(code, -codes::EIO);
        assert_eq!(store.object(OID).unwrap().refcount(7), Some(3));
        assert_eq!(store.submissions().len(), 1);
    }
}
