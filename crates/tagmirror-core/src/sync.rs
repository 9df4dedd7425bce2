//! One discover → filter → diff → build pass
//!
//! The stored digest is the only signal for "needs rebuild": a tag whose
//! upstream digest equals the recorded one is skipped, anything else is
//! built. Failed builds leave the digest untouched so the next cycle retries.

use crate::error::{Error, Result};
use crate::filter::TagFilter;
use crate::shutdown::Shutdown;
use crate::source::{BuildExecutor, DigestResolver, TagSource};
use crate::state::{StateStore, TagRecord};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Run-scoped limits and restrictions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Only this tag is considered, if it is in scope
    pub only_tag: Option<String>,
    /// Stop after this many build attempts (0 = unbounded)
    pub max_builds: usize,
    /// Pause after each build attempt
    pub build_delay: Duration,
}

/// What happened during one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// In-scope tags considered this cycle
    pub candidates: usize,
    pub unchanged: usize,
    pub not_found: usize,
    pub resolve_errors: usize,
    /// Tags dropped by the exclusion re-check
    pub excluded: usize,
    pub built: usize,
    pub failed: usize,
    /// Tags left for the next cycle (cap reached or shutdown)
    pub deferred: usize,
    pub cap_reached: bool,
    pub interrupted: bool,
}

impl SyncReport {
    pub fn builds_attempted(&self) -> usize {
        self.built + self.failed
    }
}

/// Orchestrates tag source, filter, resolver, store and executor
pub struct SyncEngine {
    tags: Arc<dyn TagSource>,
    resolver: Arc<dyn DigestResolver>,
    executor: Arc<dyn BuildExecutor>,
    store: Box<dyn StateStore>,
    filter: TagFilter,
    options: SyncOptions,
    shutdown: Shutdown,
}

impl SyncEngine {
    pub fn new(
        tags: Arc<dyn TagSource>,
        resolver: Arc<dyn DigestResolver>,
        executor: Arc<dyn BuildExecutor>,
        store: Box<dyn StateStore>,
        filter: TagFilter,
    ) -> Self {
        Self {
            tags,
            resolver,
            executor,
            store,
            filter,
            options: SyncOptions::default(),
            shutdown: Shutdown::never(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn filter(&self) -> &TagFilter {
        &self.filter
    }

    pub fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    /// Enumerate upstream tags and return the in-scope ones, ascending,
    /// restricted to `only_tag` when set.
    pub async fn list_targets(&self) -> Result<Vec<String>> {
        let all_tags = self.tags.list_tags().await.map_err(Error::TagListing)?;
        debug!("Upstream lists {} tags", all_tags.len());

        let mut targets = self.filter.filter(&all_tags);

        if let Some(only) = &self.options.only_tag {
            targets.retain(|t| t == only);
            if targets.is_empty() {
                warn!("Requested tag {} is not an in-scope upstream tag", only);
            }
        }

        Ok(targets)
    }

    /// Run one full cycle.
    ///
    /// Tag listing and state store failures abort the cycle with an error.
    /// Resolver errors and build failures only affect the tag at hand.
    pub async fn run_cycle(&mut self) -> Result<SyncReport> {
        let targets = self.list_targets().await?;
        info!(
            "Found {} {}.x tags to mirror (>= {})",
            targets.len(),
            self.filter.major(),
            self.filter.min_version()
        );

        let mut report = SyncReport {
            candidates: targets.len(),
            ..SyncReport::default()
        };

        for (index, tag) in targets.iter().enumerate() {
            if self.shutdown.is_requested() {
                report.deferred = targets.len() - index;
                report.interrupted = true;
                info!("Shutdown requested, deferring {} tags", report.deferred);
                break;
            }

            if is_unbuildable_variant(tag) {
                warn!("Skip {}: excluded variant passed the filter", tag);
                report.excluded += 1;
                continue;
            }

            let digest = match self.resolver.resolve(tag).await {
                Ok(Some(digest)) => digest,
                Ok(None) => {
                    info!("Skip {}: no digest found", tag);
                    report.not_found += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Skip {}: failed to resolve digest: {:#}", tag, e);
                    report.resolve_errors += 1;
                    continue;
                }
            };

            let previous = self
                .store
                .get(tag)
                .map_err(|e| Error::state_store(tag.as_str(), e))?;

            if previous.as_ref().is_some_and(|r| r.matches_digest(&digest)) {
                debug!("{} unchanged ({})", tag, digest);
                report.unchanged += 1;
                continue;
            }

            info!(
                "Change detected for {}: {} -> {}",
                tag,
                previous
                    .as_ref()
                    .and_then(|r| r.digest.as_deref())
                    .unwrap_or("none"),
                digest
            );

            let outcome = self.executor.build(tag).await;
            let now = Utc::now();

            let record = if outcome.is_success() {
                info!("Build succeeded for {}", tag);
                report.built += 1;
                TagRecord::built(tag.as_str(), digest, now)
            } else {
                warn!("Build failed for {}: {}", tag, outcome);
                report.failed += 1;
                TagRecord::failed(tag.as_str(), previous.as_ref(), now)
            };

            self.store
                .upsert(record)
                .map_err(|e| Error::state_store(tag.as_str(), e))?;

            let remaining = targets.len() - index - 1;

            if self.options.max_builds > 0 && report.builds_attempted() >= self.options.max_builds {
                if remaining > 0 {
                    info!(
                        "Build cap reached for this run (max {}), deferring {} tags",
                        self.options.max_builds, remaining
                    );
                    report.cap_reached = true;
                    report.deferred = remaining;
                }
                break;
            }

            if remaining > 0 && !self.options.build_delay.is_zero() {
                debug!("Waiting {:?} before the next tag", self.options.build_delay);
                self.pause(self.options.build_delay).await;
            }
        }

        info!(
            "Cycle finished: {} built, {} failed, {} unchanged, {} skipped, {} deferred",
            report.built,
            report.failed,
            report.unchanged,
            report.not_found + report.resolve_errors + report.excluded,
            report.deferred
        );

        Ok(report)
    }

    /// Sleep for `duration`, returning early on shutdown
    async fn pause(&self, duration: Duration) {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = shutdown.wait() => {}
        }
    }
}

/// Variants that are never mirrored, independent of the configured filter
fn is_unbuildable_variant(tag: &str) -> bool {
    tag.contains("windowsservercore") || tag.ends_with("-builder")
}
