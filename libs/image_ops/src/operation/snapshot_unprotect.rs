//! Snapshot unprotect operation, the multi-step member of the family.
//!
//! ```text
//! <start> ---> SET_UNPROTECTING ---> SET_UNPROTECTED ---> <terminal>
//!                                        |
//!                                        v (on failure)
//!                                  ROLLBACK_PROTECT ---> <terminal, original error>
//! ```
//!
//! The transitional `Unprotecting` status is written first so that observers
//! never see the snapshot silently flip from protected to unprotected; if the
//! final write fails, a compensating write restores `Protected` before the
//! original error is reported. The clone-children scan the full system runs
//! between the two writes belongs to the snapshot-table maintainer, not to
//! this component.

use tracing::{debug, warn};

use object_client::{CompletionBridge, ObjectStore, ProtectionStatus, WriteBatchBuilder};

use crate::error::OperationError;
use crate::image::{FEATURE_LAYERING, Image, SnapId, SnapshotNamespace};
use crate::journal::{EventKind, JournalEvent};

use super::{Flow, Operation, OperationKind};

#[derive(Debug, Clone, Copy)]
enum State {
    Prepare,
    SetUnprotecting { snap_id: SnapId },
    SetUnprotected { snap_id: SnapId },
    /// Compensating write in flight; reports `failed` once it lands.
    RollbackProtect { failed: i32 },
}

/// Removes a snapshot's protection.
///
/// Unprotecting a snapshot that is not currently protected fails with
/// [`OperationError::InvalidState`].
pub struct SnapshotUnprotect {
    snap_namespace: SnapshotNamespace,
    snap_name: String,
    state: State,
}

impl SnapshotUnprotect {
    pub fn new(snap_namespace: SnapshotNamespace, snap_name: impl Into<String>) -> Self {
        SnapshotUnprotect {
            snap_namespace,
            snap_name: snap_name.into(),
            state: State::Prepare,
        }
    }

    fn submit_status<I: Image>(
        &self,
        image: &I,
        store: &dyn ObjectStore,
        snap_id: SnapId,
        status: ProtectionStatus,
    ) -> CompletionBridge {
        let mut batch = WriteBatchBuilder::new();
        batch.set_snapshot_protection(snap_id.as_u64(), status);
        store.submit_atomic_write(image.header_object(), batch.build())
    }
}

impl<I: Image> Operation<I> for SnapshotUnprotect {
    fn kind(&self) -> OperationKind {
        OperationKind::Unprotect
    }

    fn state(&self) -> &'static str {
        match self.state {
            State::Prepare => "PREPARE",
            State::SetUnprotecting { .. } => "SET_UNPROTECTING",
            State::SetUnprotected { .. } => "SET_UNPROTECTED",
            State::RollbackProtect { .. } => "ROLLBACK_PROTECT",
        }
    }

    fn start(&mut self, image: &I, store: &dyn ObjectStore) -> Result<Flow, OperationError> {
        let snap_id = {
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
                ProtectionStatus::Protected => {}
                ProtectionStatus::Unprotected | ProtectionStatus::Unprotecting => {
                    return Err(OperationError::InvalidState {
                        namespace: self.snap_namespace.clone(),
                        name: self.snap_name.clone(),
                        detail: "snapshot is not protected",
                    });
                }
            }
            snap_id
        };

        debug!(image = %image.name(), snap = %snap_id, "unprotecting snapshot");

        self.state = State::SetUnprotecting { snap_id };
        let bridge = self.submit_status(image, store, snap_id, ProtectionStatus::Unprotecting);
        Ok(Flow::Submitted(bridge))
    }

    fn on_result(
        &mut self,
        image: &I,
        store: &dyn ObjectStore,
        code: i32,
    ) -> Result<Flow, OperationError> {
        match self.state {
            State::SetUnprotecting { snap_id } => {
                // The batch was atomic: on failure the header still says
                // Protected and there is nothing to roll back.
                if code < 0 {
                    return Err(OperationError::Store { code });
                }
                self.state = State::SetUnprotected { snap_id };
                let bridge =
                    self.submit_status(image, store, snap_id, ProtectionStatus::Unprotected);
                Ok(Flow::Submitted(bridge))
            }
            State::SetUnprotected { snap_id } => {
                if code < 0 {
                    warn!(
                        image = %image.name(),
                        snap = %snap_id,
                        code,
                        "unprotect failed, rolling back protection status"
                    );
                    self.state = State::RollbackProtect { failed: code };
                    let bridge =
                        self.submit_status(image, store, snap_id, ProtectionStatus::Protected);
                    return Ok(Flow::Submitted(bridge));
                }
                Ok(Flow::Terminal)
            }
            State::RollbackProtect { failed } => {
                if code < 0 {
                    warn!(image = %image.name(), code, "protection rollback failed");
                }
                Err(OperationError::Store { code: failed })
            }
            State::Prepare => unreachable!("completion delivered before submission"),
        }
    }

    fn journal_event(&self, op_tid: u64) -> JournalEvent {
        JournalEvent::new(
            EventKind::Unprotect,
            op_tid,
            self.snap_namespace.clone(),
            self.snap_name.clone(),
        )
    }
}
