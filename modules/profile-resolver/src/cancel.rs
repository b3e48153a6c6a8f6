// Shared cancellation for a resolver run. One handle, any number of signals;
// every in-flight candidate task waits on a clone of the same signal.

use tokio::sync::watch;

/// Caller side: trips the signal for every task of the run.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Worker side: cheap to clone, awaitable.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the run is cancelled. Pends forever if the handle is
    /// dropped without cancelling.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_reaches_every_clone() {
        let (handle, signal) = cancel_pair();
        let mut a = signal.clone();
        let mut b = handle.signal();
        assert!(!signal.is_cancelled());

        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), a.cancelled()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), b.cancelled()).await.unwrap();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn never_does_not_fire() {
        let mut signal = CancelSignal::never();
        let waited = tokio::time::timeout(Duration::from_millis(50), signal.cancelled()).await;
        assert!(waited.is_err());
        assert!(!signal.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_before_wait_is_observed() {
        let (handle, mut signal) = cancel_pair();
        handle.cancel();
        drop(handle);
        tokio::time::timeout(Duration::from_secs(1), signal.cancelled()).await.unwrap();
    }
}
