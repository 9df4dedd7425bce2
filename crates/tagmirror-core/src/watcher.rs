//! Fixed-interval driver for the sync engine

use crate::error::Result;
use crate::shutdown::Shutdown;
use crate::sync::{SyncEngine, SyncReport};
use std::time::Duration;
use tracing::{error, info};

/// Where the watcher is between and during cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Running,
}

/// Runs sync cycles on a timer. A failed cycle is logged and the loop goes
/// on; only the shutdown signal ends it.
pub struct Watcher {
    engine: SyncEngine,
    interval: Duration,
    shutdown: Shutdown,
    state: WatcherState,
    cycles: u64,
}

impl Watcher {
    pub fn new(engine: SyncEngine, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            shutdown: Shutdown::never(),
            state: WatcherState::Idle,
            cycles: 0,
        }
    }

    /// Stop the loop (and the engine between tags) when `shutdown` fires
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.engine = self.engine.with_shutdown(shutdown.clone());
        self.shutdown = shutdown;
        self
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// Cycles started so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Run exactly one cycle, returning its failure to the caller
    pub async fn run_once(&mut self) -> Result<SyncReport> {
        self.state = WatcherState::Running;
        self.cycles += 1;
        let result = self.engine.run_cycle().await;
        self.state = WatcherState::Idle;
        result
    }

    /// Run cycles until shutdown. Cycle errors never escape.
    pub async fn run(&mut self) {
        info!("Starting watcher loop; polling every {}s", self.interval.as_secs());

        loop {
            if self.shutdown.is_requested() {
                break;
            }

            if let Err(e) = self.run_once().await {
                error!("Error during sync: {}", e);
            }

            let mut shutdown = self.shutdown.clone();
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.wait() => break,
            }
        }

        info!("Watcher stopped after {} cycles", self.cycles);
    }
}
