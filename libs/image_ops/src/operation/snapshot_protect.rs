//! Snapshot protect operation.
//!
//! ```text
//! <start> ---> SET_PROTECT ---> <terminal>
//! ```

use tracing::debug;

use object_client::{ObjectStore, ProtectionStatus, WriteBatchBuilder};

use crate::error::OperationError;
use crate::image::{FEATURE_LAYERING, Image, SnapshotNamespace};
use crate::journal::{EventKind, JournalEvent};

use super::{Flow, Operation, OperationKind};

/// Marks a snapshot protected so dependent clones cannot lose it.
///
/// Protecting a snapshot that is already protected (or still unprotecting)
/// fails with [`OperationError::Busy`].
pub struct SnapshotProtect {
    snap_namespace: SnapshotNamespace,
    snap_name: String,
}

impl SnapshotProtect {
    pub fn new(snap_namespace: SnapshotNamespace, snap_name: impl Into<String>) -> Self {
        SnapshotProtect {
            snap_namespace,
            snap_name: snap_name.into(),
        }
    }
}

impl<I: Image> Operation<I> for SnapshotProtect {
    fn kind(&self) -> OperationKind {
        OperationKind::Protect
    }

    fn state(&self) -> &'static str {
        "SET_PROTECT"
    }

    fn start(&mut self, image: &I, store: &dyn ObjectStore) -> Result<Flow, OperationError> {
        let md = image.md().read();
        let snaps = image.snaps().read();

        if !md.has_feature(FEATURE_LAYERING) {
            return Err(OperationError::UnsupportedFeature {
                feature: "layering",
            });
        }

        let not_found = || OperationError::NotFound {
            namespace: self.snap_namespace.clone(),
            name: self.snap_name.clone(),
        };
        let snap_id = snaps
            .resolve(&self.snap_namespace, &self.snap_name)
            .ok_or_else(not_found)?;

        match snaps.protection(snap_id).ok_or_else(not_found)? {
            ProtectionStatus::Unprotected => {}
            ProtectionStatus::Protected | ProtectionStatus::Unprotecting => {
                return Err(OperationError::Busy {
                    namespace: self.snap_namespace.clone(),
                    name: self.snap_name.clone(),
                });
            }
        }

        debug!(image = %image.name(), snap = %snap_id, "protecting snapshot");

        let mut batch = WriteBatchBuilder::new();
        batch.set_snapshot_protection(snap_id.as_u64(), ProtectionStatus::Protected);

        let bridge = store.submit_atomic_write(image.header_object(), batch.build());
        Ok(Flow::Submitted(bridge))
    }

    fn on_result(
        &mut self,
        _image: &I,
        _store: &dyn ObjectStore,
        code: i32,
    ) -> Result<Flow, OperationError> {
        if code < 0 {
            return Err(OperationError::Store { code });
        }
        Ok(Flow::Terminal)
    }

    fn journal_event(&self, op_tid: u64) -> JournalEvent {
        JournalEvent::new(
            EventKind::Protect,
            op_tid,
            self.snap_namespace.clone(),
            self.snap_name.clone(),
        )
    }
}
