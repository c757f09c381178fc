//! Asynchronous operation-request framework for image-header mutations.
//!
//! Every control-plane mutation of an image's object-store-backed header
//! (refcount bookkeeping, snapshot protection, ...) runs through the same
//! skeleton: a per-invocation state machine that checks preconditions under
//! the image's metadata locks, turns the mutation into one atomic write batch,
//! submits it, and reaches a terminal state with exactly one result delivered
//! to the caller.
//!
//! The pieces:
//!
//! * [`image::Image`] — the image-handle boundary: feature bits, snapshot
//!   table and the three lock handles, read but never structurally mutated by
//!   this crate. [`image::ImageHandle`] is the production implementation.
//! * [`operation::Operation`] + [`operation::OperationRequest`] — the
//!   state-machine contract and the driver that runs one operation to its
//!   terminal state while the caller holds the owner lock.
//! * [`journal`] — replay event descriptors correlated by a caller-supplied
//!   transaction id.
//!
//! See [`operation`] for the locking contract every operation honors.

pub mod error;
pub mod image;
pub mod journal;
pub mod locks;
pub mod operation;

pub use self::error::OperationError;
pub use self::image::{Image, ImageHandle, SnapId, SnapshotInfo, SnapshotNamespace};
pub use self::operation::{Flow, Operation, OperationKind, OperationRequest};
