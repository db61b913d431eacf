//! Top-level cancellation signal
//!
//! One `CancellationHandle` is owned by whoever may give up on an invocation
//! (the binary maps ctrl-c onto it). Any number of `CancellationSignal`s can be
//! observed by long waits.

use tokio::sync::watch;

/// Triggers cancellation
#[derive(Debug)]
pub struct CancellationHandle {
    tx: watch::Sender<Option<String>>,
}

/// Observes cancellation
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    rx: watch::Receiver<Option<String>>,
}

impl CancellationHandle {
    /// Create a handle and its first signal
    pub fn channel() -> (Self, CancellationSignal) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, CancellationSignal { rx })
    }

    /// Cancel with a cause. Later calls keep the first cause.
    pub fn cancel(&self, cause: impl Into<String>) {
        let cause = cause.into();
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(cause);
                true
            } else {
                false
            }
        });
    }

    /// Another signal tied to this handle
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancellationSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(None);
        Self { rx }
    }

    /// Cause of cancellation, if it has happened
    pub fn cause(&self) -> Option<String> {
        self.rx.borrow().clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Resolve once cancelled and return the cause.
    ///
    /// If the handle is dropped without cancelling, this never resolves.
    pub async fn cancelled(&mut self) -> String {
        loop {
            if let Some(cause) = self.rx.borrow_and_update().clone() {
                return cause;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let (handle, mut signal) = CancellationHandle::channel();
        assert!(!signal.is_cancelled());

        let waiter = tokio::spawn(async move { signal.cancelled().await });
        handle.cancel("operator abort");

        let cause = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cause, "operator abort");
    }

    #[tokio::test]
    async fn test_first_cause_wins() {
        let (handle, signal) = CancellationHandle::channel();
        handle.cancel("first");
        handle.cancel("second");
        assert_eq!(signal.cause().as_deref(), Some("first"));
        assert!(handle.signal().is_cancelled());
    }

    #[tokio::test]
    async fn test_dropped_handle_never_fires() {
        let (handle, mut signal) = CancellationHandle::channel();
        drop(handle);
        let waited = tokio::time::timeout(Duration::from_millis(50), signal.cancelled()).await;
        assert!(waited.is_err());
    }
}
