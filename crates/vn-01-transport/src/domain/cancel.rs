//! Cooperative cancellation for connection attempts.
//!
//! A `CancelHandle` flips a watch channel; every `CancelToken` cloned from it
//! observes the flip. Dropping the in-flight connect future on cancellation
//! closes whatever socket it had half-opened, so nothing leaks.

use crate::domain::errors::TransportError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

/// Triggers cancellation.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observes cancellation.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Create a linked handle and token.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        // Receivers may all be gone; nothing to notify then.
        let _ = self.tx.send(true);
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Pends forever if the handle is dropped first.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Run `fut` bounded by `timeout` and `cancel`.
///
/// Cancellation wins over completion when both are ready.
pub async fn run_cancellable<T, F>(
    operation: &str,
    fut: F,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransportError::Cancelled {
            operation: operation.to_string(),
        }),
        result = tokio::time::timeout(timeout, fut) => match result {
            Ok(inner) => inner,
            Err(_) => Err(TransportError::Timeout {
                operation: operation.to_string(),
                after_ms: timeout.as_millis() as u64,
            }),
        },
    }
}
