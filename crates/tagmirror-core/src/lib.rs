//! # tagmirror-core
//!
//! Core library for tagmirror providing:
//! - Tag classification against a major version, variants and a version floor
//! - Durable per-tag state (last digest, last seen, last built)
//! - The sync engine deciding when an upstream tag needs rebuilding
//! - The watcher loop driving the engine on a timer
//! - Configuration loading (tagmirror.yaml + environment)

pub mod config;
pub mod error;
pub mod filter;
pub mod shutdown;
pub mod source;
pub mod state;
pub mod sync;
pub mod watcher;

pub use config::MirrorConfig;
pub use error::{Error, Result};
pub use filter::{Classification, ParsedVersion, TagFilter};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use source::{BuildExecutor, BuildOutcome, DigestResolver, TagSource};
pub use state::{FileStateStore, StateStore, TagRecord};
pub use sync::{SyncEngine, SyncOptions, SyncReport};
pub use watcher::{Watcher, WatcherState};
