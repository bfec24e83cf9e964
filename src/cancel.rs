//! Cooperative cancellation for in-flight camera requests and assembly jobs.
//!
//! One `CancelHandle` fires, any number of cloned `CancelSignal`s observe.
//! A dropped handle that never fired does not count as a cancellation.

use tokio::sync::watch;

/// Sending half, held by whoever may abort the operation (usually the UI).
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Request cancellation. Calling it again is a no-op.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half, polled by the operation being cancelled.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancellation is requested; pends forever otherwise.
    pub async fn cancelled(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }
        std::future::pending::<()>().await
    }
}

/// Create a linked handle/signal pair.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx: Some(rx) })
}
