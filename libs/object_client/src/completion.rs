use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::codes;

/// Delivers the result code of one submission. Consumed by [`complete`],
/// which makes exactly-once delivery a move-semantics guarantee rather than
/// a runtime check.
///
/// [`complete`]: CompletionSender::complete
pub struct CompletionSender {
    tx: oneshot::Sender<i32>,
}

impl CompletionSender {
    pub fn complete(self, code: i32) {
        if self.tx.send(code).is_err() {
            // The submitting side dropped its bridge without waiting. Legal:
            // there is simply nobody left to deliver to.
            debug!(code, "completion receiver dropped before delivery");
        }
    }
}

/// The receiving half handed back by [`ObjectStore::submit_atomic_write`];
/// resolves exactly once with the submission's result code.
///
/// [`ObjectStore::submit_atomic_write`]: crate::ObjectStore::submit_atomic_write
pub struct CompletionBridge {
    rx: oneshot::Receiver<i32>,
}

impl CompletionBridge {
    pub fn channel() -> (CompletionSender, CompletionBridge) {
        let (tx, rx) = oneshot::channel();
        (CompletionSender { tx }, CompletionBridge { rx })
    }

    /// Waits for the result code. If the store runtime dropped the sender
    /// without completing, resolves with `-ECANCELED`; the store contract
    /// promises exactly-once delivery, so a vanished sender means the
    /// runtime itself went away.
    pub async fn wait(self) -> i32 {
        match self.rx.await {
            Ok(code) => code,
            Err(_) => {
                warn!("store runtime dropped completion before delivery");
                -codes::ECANCELED
            }
        }
    }
}
