use object_client::codes;

use crate::image::SnapshotNamespace;

/// Failure of one operation request.
///
/// Synchronous precondition failures and asynchronous store failures travel
/// through the same terminal completion; callers tell them apart by kind (or
/// by [`code`]). This layer never retries or recovers.
///
/// [`code`]: OperationError::code
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("image does not support feature '{feature}'")]
    UnsupportedFeature { feature: &'static str },

    #[error("snapshot {namespace}/{name} not found")]
    NotFound {
        namespace: SnapshotNamespace,
        name: String,
    },

    #[error("snapshot {namespace}/{name} is busy")]
    Busy {
        namespace: SnapshotNamespace,
        name: String,
    },

    #[error("snapshot {namespace}/{name}: {detail}")]
    InvalidState {
        namespace: SnapshotNamespace,
        name: String,
        detail: &'static str,
    },

    /// Result code delivered by the object store; already negated.
    #[error("object store error (code {code})")]
    Store { code: i32 },

    #[error("journal append failed")]
    Journal(#[source] anyhow::Error),
}

impl OperationError {
    /// The POSIX-style negative code this error travels as on the wire.
    pub fn code(&self) -> i32 {
        match self {
            OperationError::UnsupportedFeature { .. } => -codes::ENOSYS,
            OperationError::NotFound { .. } => -codes::ENOENT,
            OperationError::Busy { .. } => -codes::EBUSY,
            OperationError::InvalidState { .. } => -codes::EINVAL,
            OperationError::Store { code } => *code,
            OperationError::Journal(_) => -codes::EIO,
        }
    }
}
