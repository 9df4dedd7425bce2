//! Cooperative shutdown signal
//!
//! An interrupt never cancels an in-flight build; it only keeps the next tag
//! or the next cycle from starting.

use tokio::sync::watch;

/// Sending half, held by whoever listens for Ctrl-C
#[derive(Debug)]
pub struct ShutdownTrigger(watch::Sender<bool>);

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // Nobody listening is fine
        let _ = self.0.send(true);
    }
}

/// Receiving half, cloned into the engine and the watcher
#[derive(Debug, Clone)]
pub struct Shutdown(watch::Receiver<bool>);

impl Shutdown {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_requested(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown has been requested. Parks forever if the
    /// trigger is dropped without firing.
    pub async fn wait(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Create a connected trigger/receiver pair
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger(tx), Shutdown(rx))
}
