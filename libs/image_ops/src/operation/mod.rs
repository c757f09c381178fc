//! The operation state-machine skeleton.
//!
//! Locking contract, honored by every operation:
//!
//! * The caller holds the image's owner lock in shared mode for the whole
//!   lifetime of the operation; [`OperationRequest::run`] takes the guard in
//!   its signature. This serializes mutating operations per image.
//! * The general-metadata and snapshot-table locks are taken in shared mode
//!   inside the synchronous precondition/batch-build phase only, and are
//!   released before the driver awaits the submission, so unrelated readers
//!   never stall on network latency.
//!
//! Flow: `start` runs the preconditions and submits the first write batch (or
//! fails synchronously); every delivered result code is fed to `on_result`,
//! which either finishes the machine or submits the next step. At most one
//! submission is outstanding per operation, and the driver resolves exactly
//! once, success or not.

mod snapshot_protect;
mod snapshot_refcount;
mod snapshot_unprotect;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error};

use object_client::{CompletionBridge, ObjectStore};

use crate::error::OperationError;
use crate::image::{FEATURE_JOURNALING, Image};
use crate::journal::{Journal, JournalEvent};
use crate::locks::OwnerGuard;

pub use self::snapshot_protect::SnapshotProtect;
pub use self::snapshot_refcount::{SnapshotClearRefcount, SnapshotDecrementRefcount};
pub use self::snapshot_unprotect::SnapshotUnprotect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    ClearRefcount,
    DecrementRefcount,
    Protect,
    Unprotect,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationKind::ClearRefcount => "clear_refcount",
            OperationKind::DecrementRefcount => "decrement_refcount",
            OperationKind::Protect => "protect",
            OperationKind::Unprotect => "unprotect",
        })
    }
}

/// What an operation step left behind.
pub enum Flow {
    /// A write batch is in flight; the bridge resolves with its result code.
    Submitted(CompletionBridge),
    /// The state machine is done and the operation succeeded.
    Terminal,
}

/// One mutation kind's state machine.
///
/// `Err` from `start` or `on_result` is terminal-with-error; `Ok(Terminal)`
/// is terminal-success; `Ok(Submitted)` means another asynchronous step is in
/// flight. `journal_event` must be pure: same descriptor before, during and
/// after the network round trip.
pub trait Operation<I: Image>: Send {
    fn kind(&self) -> OperationKind;

    /// Current state, for diagnostics only; the driver never branches on it.
    fn state(&self) -> &'static str;

    fn start(&mut self, image: &I, store: &dyn ObjectStore) -> Result<Flow, OperationError>;

    fn on_result(
        &mut self,
        image: &I,
        store: &dyn ObjectStore,
        code: i32,
    ) -> Result<Flow, OperationError>;

    fn journal_event(&self, op_tid: u64) -> JournalEvent;
}

/// Drives one [`Operation`] to its terminal state.
///
/// Created per invocation; lives for exactly one run. The returned future is
/// the operation's single completion: it resolves exactly once, and a
/// negative store code surfaces as [`OperationError::Store`] with that code.
pub struct OperationRequest<I: Image, O: Operation<I>> {
    image: Arc<I>,
    store: Arc<dyn ObjectStore>,
    journal: Option<Arc<dyn Journal>>,
    op_tid: u64,
    op: O,
}

impl<I: Image, O: Operation<I>> OperationRequest<I, O> {
    pub fn new(image: Arc<I>, store: Arc<dyn ObjectStore>, op_tid: u64, op: O) -> Self {
        OperationRequest {
            image,
            store,
            journal: None,
            op_tid,
            op,
        }
    }

    pub fn with_journal(mut self, journal: Arc<dyn Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Runs the operation to its terminal state. The caller must have taken
    /// the guard from this image's owner lock and keep it until the returned
    /// future resolves.
    pub async fn run(self, _owner: &OwnerGuard<'_>) -> Result<(), OperationError> {
        let OperationRequest {
            image,
            store,
            journal,
            op_tid,
            mut op,
        } = self;
        let kind = op.kind();

        debug!(image = %image.name(), %kind, op_tid, "starting operation");

        // Append the replay event before the first submission, so a crash
        // between submission and completion still replays the mutation.
        if let Some(journal) = &journal {
            if image.md().read().has_feature(FEATURE_JOURNALING) {
                let event = op.journal_event(op_tid);
                if let Err(e) = journal.append(&event) {
                    let err = OperationError::Journal(e);
                    error!(image = %image.name(), %kind, op_tid, error = %err, "operation failed");
                    return Err(err);
                }
            }
        }

        let mut flow = op.start(image.as_ref(), store.as_ref());
        loop {
            match flow {
                Ok(Flow::Terminal) => {
                    debug!(image = %image.name(), %kind, op_tid, "operation complete");
                    return Ok(());
                }
                Ok(Flow::Submitted(bridge)) => {
                    let code = bridge.wait().await;
                    debug!(%kind, state = op.state(), code, "completion received");
                    flow = op.on_result(image.as_ref(), store.as_ref(), code);
                }
                Err(err) => {
                    error!(
                        image = %image.name(),
                        %kind,
                        state = op.state(),
                        code = err.code(),
                        error = %err,
                        "operation failed"
                    );
                    return Err(err);
                }
            }
        }
    }
}
