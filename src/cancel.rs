//! Cooperative cancellation shared between the CLI and the build pipeline.

use tokio::sync::watch;

/// Creates a linked handle and observer.
#[must_use]
pub fn cancellation_pair() -> (CancelHandle, Cancellation) {
    let (sender, receiver) = watch::channel(false);
    (CancelHandle { sender }, Cancellation { receiver })
}

/// Requests cancellation of an in-flight build.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signals every linked [`Cancellation`]. Repeated calls are harmless.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

/// Observes a cancellation request.
#[derive(Clone, Debug)]
pub struct Cancellation {
    receiver: watch::Receiver<bool>,
}

impl Cancellation {
    /// Returns an observer that is never cancelled.
    #[must_use]
    pub fn never() -> Self {
        let (_, receiver) = watch::channel(false);
        Self { receiver }
    }

    /// Reports whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancellation is requested.
    ///
    /// Pends forever when the handle was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
