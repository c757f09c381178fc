//! Journal replay descriptors.
//!
//! Every operation can describe itself as a [`JournalEvent`], keyed by a
//! caller-supplied transaction id, so the journal can replay the mutation
//! deterministically after a crash. Event generation is pure; durability and
//! the replay engine itself belong to the journal collaborator.

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::image::SnapshotNamespace;

/// Serialization version of the event envelope.
const EVENT_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ClearRefcount,
    DecrementRefcount,
    Protect,
    Unprotect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEvent {
    /// Serialization version, for future use.
    pub version: u8,

    pub kind: EventKind,

    /// Caller-supplied transaction id; threaded through unchanged.
    pub op_tid: u64,

    pub snapshot_namespace: SnapshotNamespace,
    pub snapshot_name: String,
}

impl JournalEvent {
    pub fn new(
        kind: EventKind,
        op_tid: u64,
        snapshot_namespace: SnapshotNamespace,
        snapshot_name: String,
    ) -> Self {
        JournalEvent {
            version: EVENT_VERSION,
            kind,
            op_tid,
            snapshot_namespace,
            snapshot_name,
        }
    }
}

/// Encodes events into the journal's on-disk representation and back.
pub struct JournalEventEncoder;

impl JournalEventEncoder {
    pub fn encode(event: &JournalEvent) -> anyhow::Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(event)?))
    }

    pub fn decode(bytes: &[u8]) -> anyhow::Result<JournalEvent> {
        let event: JournalEvent = serde_json::from_slice(bytes)?;
        anyhow::ensure!(
            event.version == EVENT_VERSION,
            "unsupported journal event version {}",
            event.version
        );
        Ok(event)
    }
}

/// Append boundary to the journal collaborator.
pub trait Journal: Send + Sync {
    fn append(&self, event: &JournalEvent) -> anyhow::Result<()>;
}

/// In-process journal keeping encoded events in memory; the reference
/// implementation for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryJournal {
    entries: Mutex<Vec<Bytes>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Decodes everything appended so far, in append order.
    pub fn events(&self) -> anyhow::Result<Vec<JournalEvent>> {
        self.entries
            .lock()
            .iter()
            .map(|bytes| JournalEventEncoder::decode(bytes))
            .collect()
    }
}

impl Journal for MemoryJournal {
    fn append(&self, event: &JournalEvent) -> anyhow::Result<()> {
        let encoded = JournalEventEncoder::encode(event)?;
        self.entries.lock().push(encoded);
        Ok(())
    }
}
