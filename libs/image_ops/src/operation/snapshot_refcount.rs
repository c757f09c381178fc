//! Snapshot refcount bookkeeping operations.
//!
//! Both variants go through a single productive state:
//!
//! ```text
//! <start> ---> SUBMIT_MUTATION ---> <terminal>
//! ```
//!
//! Refcount bookkeeping is advisory cleanup: the machine is terminal after
//! its one round trip no matter what the store answered, and a failure is a
//! logged diagnostic plus the propagated code, never a blocking condition for
//! whatever larger operation triggered it.

use tracing::debug;

use object_client::{ObjectStore, WriteBatchBuilder};

use crate::error::OperationError;
use crate::image::{FEATURE_LAYERING, Image, SnapshotNamespace};
use crate::journal::{EventKind, JournalEvent};

use super::{Flow, Operation, OperationKind};

const STATE_SUBMIT_MUTATION: &str = "SUBMIT_MUTATION";

#[derive(Debug, Clone, Copy)]
enum RefcountUpdate {
    Clear,
    Decrement,
}

/// Preconditions and batch construction shared by both variants, run under
/// short-lived shared guards on the general-metadata and snapshot-table
/// locks. The guards drop at scope exit, immediately after submission, and
/// are never held across an await.
fn submit_refcount_update<I: Image>(
    image: &I,
    store: &dyn ObjectStore,
    update: RefcountUpdate,
    namespace: &SnapshotNamespace,
    name: &str,
) -> Result<Flow, OperationError> {
    let md = image.md().read();
    let snaps = image.snaps().read();

    if !md.has_feature(FEATURE_LAYERING) {
        return Err(OperationError::UnsupportedFeature {
            feature: "layering",
        });
    }

    let snap_id = snaps
        .resolve(namespace, name)
        .ok_or_else(|| OperationError::NotFound {
            namespace: namespace.clone(),
            name: name.to_owned(),
        })?;

    debug!(image = %image.name(), snap = %snap_id, ?update, "submitting refcount update");

    let mut batch = WriteBatchBuilder::new();
    match update {
        RefcountUpdate::Clear => batch.clear_snapshot_refcount(snap_id.as_u64()),
        RefcountUpdate::Decrement => batch.decrement_snapshot_refcount(snap_id.as_u64()),
    };

    let bridge = store.submit_atomic_write(image.header_object(), batch.build());
    Ok(Flow::Submitted(bridge))
}

fn refcount_result(code: i32) -> Result<Flow, OperationError> {
    // Best-effort bookkeeping: terminal after the single round trip
    // regardless of outcome.
    if code < 0 {
        return Err(OperationError::Store { code });
    }
    Ok(Flow::Terminal)
}

/// Forces a snapshot's stored refcount to zero.
pub struct SnapshotClearRefcount {
    snap_namespace: SnapshotNamespace,
    snap_name: String,
}

impl SnapshotClearRefcount {
    pub fn new(snap_namespace: SnapshotNamespace, snap_name: impl Into<String>) -> Self {
        SnapshotClearRefcount {
            snap_namespace,
            snap_name: snap_name.into(),
        }
    }
}

impl<I: Image> Operation<I> for SnapshotClearRefcount {
    fn kind(&self) -> OperationKind {
        OperationKind::ClearRefcount
    }

    fn state(&self) -> &'static str {
        STATE_SUBMIT_MUTATION
    }

    fn start(&mut self, image: &I, store: &dyn ObjectStore) -> Result<Flow, OperationError> {
        submit_refcount_update(
            image,
            store,
            RefcountUpdate::Clear,
            &self.snap_namespace,
            &self.snap_name,
        )
    }

    fn on_result(
        &mut self,
        _image: &I,
        _store: &dyn ObjectStore,
        code: i32,
    ) -> Result<Flow, OperationError> {
        refcount_result(code)
    }

    fn journal_event(&self, op_tid: u64) -> JournalEvent {
        JournalEvent::new(
            EventKind::ClearRefcount,
            op_tid,
            self.snap_namespace.clone(),
            self.snap_name.clone(),
        )
    }
}

/// Reduces a snapshot's stored refcount by one, floored at zero.
pub struct SnapshotDecrementRefcount {
    snap_namespace: SnapshotNamespace,
    snap_name: String,
}

impl SnapshotDecrementRefcount {
    pub fn new(snap_namespace: SnapshotNamespace, snap_name: impl Into<String>) -> Self {
        SnapshotDecrementRefcount {
            snap_namespace,
            snap_name: snap_name.into(),
        }
    }
}

impl<I: Image> Operation<I> for SnapshotDecrementRefcount {
    fn kind(&self) -> OperationKind {
        OperationKind::DecrementRefcount
    }

    fn state(&self) -> &'static str {
        STATE_SUBMIT_MUTATION
    }

    fn start(&mut self, image: &I, store: &dyn ObjectStore) -> Result<Flow, OperationError> {
        submit_refcount_update(
            image,
            store,
            RefcountUpdate::Decrement,
            &self.snap_namespace,
            &self.snap_name,
        )
    }

    fn on_result(
        &mut self,
        _image: &I,
        _store: &dyn ObjectStore,
        code: i32,
    ) -> Result<Flow, OperationError> {
        refcount_result(code)
    }

    fn journal_event(&self, op_tid: u64) -> JournalEvent {
        JournalEvent::new(
            EventKind::DecrementRefcount,
            op_tid,
            self.snap_namespace.clone(),
            self.snap_name.clone(),
        )
    }
}
