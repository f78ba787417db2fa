// src/ingest/shutdown.rs
use tokio::sync::watch;

/// Sending half of the shutdown signal, held by the process wiring
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Receiving half, cloned into every component that has to stop cooperatively
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // No receivers left just means nobody is running
        let _ = self.tx.send(true);
    }
}

impl Shutdown {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_, shutdown) = shutdown_channel();
        shutdown
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested
    pub async fn wait(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Trigger dropped without firing
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
    async fn wait_resolves_after_trigger() {
        let (trigger, mut shutdown) = shutdown_channel();
        assert!(!shutdown.is_triggered());
        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), shutdown.wait())
            .await
            .expect("shutdown observed");
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn never_does_not_resolve() {
        let mut shutdown = Shutdown::never();
        let result = tokio::time::timeout(Duration::from_millis(50), shutdown.wait()).await;
        assert!(result.is_err());
    }
}
