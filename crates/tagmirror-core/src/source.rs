//! Capabilities the sync engine needs from the outside world
//!
//! Implementations live in tagmirror-image (registry and docker) or in tests.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

/// Enumerates every upstream tag name
#[async_trait]
pub trait TagSource: Send + Sync {
    /// All tag names, with pagination followed to exhaustion
    async fn list_tags(&self) -> Result<Vec<String>>;
}

/// Looks up the current content digest of a tag
#[async_trait]
pub trait DigestResolver: Send + Sync {
    /// `Ok(None)` when the tag does not exist upstream. Transient failures,
    /// timeouts included, are `Err`.
    async fn resolve(&self, tag: &str) -> Result<Option<String>>;
}

/// Outcome of one build-and-publish invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Success,
    /// `exit_code` is `None` when the build never produced one (spawn error,
    /// timeout, signal).
    Failure { exit_code: Option<i32> },
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Success)
    }
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildOutcome::Success => write!(f, "success"),
            BuildOutcome::Failure {
                exit_code: Some(code),
            } => write!(f, "failure (exit {})", code),
            BuildOutcome::Failure { exit_code: None } => write!(f, "failure"),
        }
    }
}

/// Builds a tag and publishes it to every destination repository
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    /// Must be safe to call repeatedly for the same tag
    async fn build(&self, tag: &str) -> BuildOutcome;
}
