//! The image-handle boundary.
//!
//! An image handle is long-lived and owned by the caller; this crate only
//! reads it under its locks. The [`Image`] trait exists so operations can be
//! exercised against test doubles with the same lock/resolve contract as the
//! production [`ImageHandle`].

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use object_client::ProtectionStatus;

use crate::locks::OwnerLock;

/// Image supports cloning and snapshot protection; precondition for all
/// snapshot refcount and protection operations.
pub const FEATURE_LAYERING: u64 = 1 << 0;
/// Image records operations in the journal for crash-safe replay.
pub const FEATURE_JOURNALING: u64 = 1 << 6;

/// Identifier a snapshot name resolves to through the snapshot table.
///
/// Resolution yields `Option<SnapId>`; there is no reserved sentinel value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SnapId(pub u64);

impl SnapId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SnapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Namespace half of a snapshot's (namespace, name) key.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotNamespace {
    User,
    /// A snapshot moved to the trash; keeps the pre-trash name for listing.
    Trash { original_name: String },
}

impl fmt::Display for SnapshotNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotNamespace::User => f.write_str("user"),
            SnapshotNamespace::Trash { .. } => f.write_str("trash"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    pub id: SnapId,
    pub namespace: SnapshotNamespace,
    pub name: String,
    pub protection: ProtectionStatus,
}

/// The snapshot table: (namespace, name) -> id plus per-snapshot info.
///
/// All lookups are pure reads; callers hold a read guard on the table's lock
/// while resolving so they never observe a partially-updated table.
#[derive(Default)]
pub struct SnapshotTable {
    by_name: BTreeMap<(SnapshotNamespace, String), SnapId>,
    by_id: BTreeMap<SnapId, SnapshotInfo>,
}

impl SnapshotTable {
    pub fn resolve(&self, namespace: &SnapshotNamespace, name: &str) -> Option<SnapId> {
        self.by_name
            .get(&(namespace.clone(), name.to_owned()))
            .copied()
    }

    pub fn protection(&self, id: SnapId) -> Option<ProtectionStatus> {
        self.by_id.get(&id).map(|info| info.protection)
    }

    pub fn get(&self, id: SnapId) -> Option<&SnapshotInfo> {
        self.by_id.get(&id)
    }

    pub fn insert(&mut self, info: SnapshotInfo) {
        self.by_name
            .insert((info.namespace.clone(), info.name.clone()), info.id);
        self.by_id.insert(info.id, info);
    }

    pub fn remove(&mut self, id: SnapId) -> Option<SnapshotInfo> {
        let info = self.by_id.remove(&id)?;
        self.by_name
            .remove(&(info.namespace.clone(), info.name.clone()));
        Some(info)
    }

    pub fn set_protection(&mut self, id: SnapId, status: ProtectionStatus) -> bool {
        match self.by_id.get_mut(&id) {
            Some(info) => {
                info.protection = status;
                true
            }
            None => false,
        }
    }
}

pub struct ImageMetadata {
    pub features: u64,
}

impl ImageMetadata {
    pub fn has_feature(&self, feature: u64) -> bool {
        self.features & feature != 0
    }
}

/// Lock/resolve contract an operation needs from an image handle.
///
/// The general-metadata and snapshot-table locks are synchronous and guard
/// only short read sections; they must never be held across an await. The
/// owner lock is async and held by the caller for an operation's lifetime.
pub trait Image: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Name of the header object all write batches target.
    fn header_object(&self) -> &str;

    fn owner_lock(&self) -> &OwnerLock;

    /// General-metadata lock and the metadata it guards.
    fn md(&self) -> &RwLock<ImageMetadata>;

    /// Snapshot-table lock and the table it guards.
    fn snaps(&self) -> &RwLock<SnapshotTable>;
}

/// Production image handle: the in-memory metadata cache plus lock handles.
///
/// Construction, feature negotiation and snapshot-table maintenance belong to
/// the owning layer; the mutators here exist for it (and for tests), not for
/// operations.
pub struct ImageHandle {
    name: String,
    header_object: String,
    owner_lock: OwnerLock,
    md: RwLock<ImageMetadata>,
    snaps: RwLock<SnapshotTable>,
}

impl ImageHandle {
    pub fn new(name: impl Into<String>, features: u64) -> Self {
        let name = name.into();
        ImageHandle {
            header_object: format!("image_header.{name}"),
            name,
            owner_lock: OwnerLock::new(),
            md: RwLock::new(ImageMetadata { features }),
            snaps: RwLock::new(SnapshotTable::default()),
        }
    }

    pub fn add_snapshot(&self, info: SnapshotInfo) {
        self.snaps.write().insert(info);
    }

    pub fn remove_snapshot(&self, id: SnapId) -> Option<SnapshotInfo> {
        self.snaps.write().remove(id)
    }

    pub fn set_snapshot_protection(&self, id: SnapId, status: ProtectionStatus) -> bool {
        self.snaps.write().set_protection(id, status)
    }
}

impl Image for ImageHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn header_object(&self) -> &str {
        &self.header_object
    }

    fn owner_lock(&self) -> &OwnerLock {
        &self.owner_lock
    }

    fn md(&self) -> &RwLock<ImageMetadata> {
        &self.md
    }

    fn snaps(&self) -> &RwLock<SnapshotTable> {
        &self.snaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_snap(id: u64, name: &str) -> SnapshotInfo {
        SnapshotInfo {
            id: SnapId(id),
            namespace: SnapshotNamespace::User,
            name: name.to_owned(),
            protection: ProtectionStatus::Unprotected,
        }
    }

    #[test]
    fn resolve_is_namespace_scoped() {
        let mut table = SnapshotTable::default();
        table.insert(user_snap(7, "snap1"));
        table.insert(SnapshotInfo {
            id: SnapId(8),
            namespace: SnapshotNamespace::Trash {
                original_name: "snap1".to_owned(),
            },
            name: "snap1".to_owned(),
            protection: ProtectionStatus::Unprotected,
        });

        assert_eq!(
            table.resolve(&SnapshotNamespace::User, "snap1"),
            Some(SnapId(7))
        );
        assert_eq!(
            table.resolve(
                &SnapshotNamespace::Trash {
                    original_name: "snap1".to_owned()
                },
                "snap1"
            ),
            Some(SnapId(8))
        );
        assert_eq!(table.resolve(&SnapshotNamespace::User, "missing"), None);
    }

    #[test]
    fn remove_unlinks_both_indexes() {
        let mut table = SnapshotTable::default();
        table.insert(user_snap(7, "snap1"));

        assert!(table.remove(SnapId(7)).is_some());
        assert_eq!(table.resolve(&SnapshotNamespace::User, "snap1"), None);
        assert_eq!(table.protection(SnapId(7)), None);
    }

    #[test]
    fn set_protection_requires_known_id() {
        let mut table = SnapshotTable::default();
        table.insert(user_snap(7, "snap1"));

        assert!(table.set_protection(SnapId(7), ProtectionStatus::Protected));
        assert_eq!(
            table.protection(SnapId(7)),
            Some(ProtectionStatus::Protected)
        );
        assert!(!table.set_protection(SnapId(9), ProtectionStatus::Protected));
    }
}
