//! Client-side abstractions for the object store that backs image headers.
//!
//! The control plane mutates an image's header object through small atomic
//! write batches of class-method calls. This crate owns that boundary:
//!
//! * [`ObjectStore`] is the submission trait implemented by real backends and
//!   by [`InMemoryStore`], an in-process reference backend used in tests and
//!   single-process deployments.
//! * [`WriteBatchBuilder`] accumulates [`MethodCall`]s into a [`WriteBatch`]
//!   that the store applies all-or-nothing to one named object.
//! * [`CompletionBridge`] delivers the single result code of a submission back
//!   to the caller exactly once.
//!
//! Retry, cancellation and timeout policy live in the backend or above it,
//! never here: a submitted batch always resolves its bridge with exactly one
//! POSIX-style result code (see [`codes`]).

pub mod codes;
mod completion;
mod mem;
mod store;

pub use self::completion::{CompletionBridge, CompletionSender};
pub use self::mem::{HeaderObject, InMemoryStore, Submission};
pub use self::store::{
    MethodCall, ObjectStore, ProtectionStatus, WriteBatch, WriteBatchBuilder,
};
