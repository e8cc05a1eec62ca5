//! Shutdown coordination for the server.

use std::sync::Arc;

use tokio::sync::watch;

/// One-shot shutdown event shared by every long-running task.
///
/// Firing is idempotent: only the first [`Shutdown::trigger`] changes anything,
/// and listeners that subscribe after it fired see it immediately.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Fire the signal. Returns `true` only for the call that fired it.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Resolves once shutdown has fired, or once the coordinator is gone.
    pub async fn recv(&mut self) {
        let _ = self.rx.wait_for(|fired| *fired).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fires_at_most_once() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());
        assert!(shutdown.trigger());
        assert!(!shutdown.trigger());
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn late_subscribers_observe_the_signal() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let mut listener = shutdown.subscribe();
        tokio::time::timeout(Duration::from_secs(1), listener.recv())
            .await
            .expect("listener should resolve immediately");
    }

    #[tokio::test]
    async fn listeners_wake_on_trigger() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.subscribe();

        let waiter = tokio::spawn(async move { listener.recv().await });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
