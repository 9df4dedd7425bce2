//! CLI command implementations

pub mod list;
pub mod once;
pub mod status;
pub mod watch;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tagmirror_core::config::MirrorConfig;
use tagmirror_core::shutdown::{self, Shutdown};
use tagmirror_core::{FileStateStore, SyncEngine, SyncOptions, SyncReport, TagFilter};
use tagmirror_image::{docker, BuildxExecutor, UpstreamImage};
use tracing::{info, warn};

use crate::output;

/// Open the state file the configuration points at
pub(crate) fn open_store(config: &MirrorConfig) -> Result<FileStateStore> {
    let path = config.resolved_state_path()?;
    FileStateStore::open(path.clone()).with_context(|| format!("Failed to open state store {}", path))
}

/// Wire a sync engine from configuration. `docker` is the binary the build
/// executor runs; `None` keeps the default from `PATH`.
pub(crate) fn engine_from_config(
    config: &MirrorConfig,
    only_tag: Option<String>,
    docker: Option<PathBuf>,
) -> Result<SyncEngine> {
    let upstream = Arc::new(
        UpstreamImage::from_config(&config.upstream, config.request_timeout())
            .context("Failed to set up upstream registry client")?,
    );

    let mut executor = BuildxExecutor::from_config(&config.build, &config.targets)?;
    if let Some(docker) = docker {
        executor = executor.with_program(docker);
    }

    let filter = TagFilter::from_config(&config.filter)?;
    let store = open_store(config)?;

    let options = SyncOptions {
        only_tag,
        max_builds: config.max_builds_per_run,
        build_delay: config.build_delay(),
    };

    Ok(SyncEngine::new(
        upstream.clone(),
        upstream,
        Arc::new(executor),
        Box::new(store),
        filter,
    )
    .with_options(options))
}

/// Check docker/buildx, log in when credentials are configured, and wire the
/// engine with the docker binary that was found
pub(crate) async fn prepare_builds(config: &MirrorConfig, only_tag: Option<String>) -> Result<SyncEngine> {
    let docker = docker::preflight().await?;

    if let Some((username, password)) = config.upstream.credentials() {
        // Anonymous pulls still work, only with lower rate limits
        if let Err(e) = docker::login(&docker, username, password).await {
            warn!("{:#}", e);
        }
    }

    engine_from_config(config, only_tag, Some(docker))
}

/// Shutdown handle that fires on Ctrl-C (and SIGTERM on unix)
pub(crate) fn shutdown_on_signal() -> Shutdown {
    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        termination_signal().await;
        info!("Shutdown requested, stopping after the current step");
        trigger.trigger();
    });
    shutdown
}

#[cfg(unix)]
async fn termination_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn termination_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Human-readable cycle summary
pub(crate) fn print_report(report: &SyncReport) {
    output::header("Sync cycle");
    output::kv("Candidates", &report.candidates.to_string());
    output::kv("Unchanged", &report.unchanged.to_string());
    output::kv("Built", &report.built.to_string());
    output::kv("Failed", &report.failed.to_string());
    output::kv("Not found upstream", &report.not_found.to_string());
    output::kv("Resolve errors", &report.resolve_errors.to_string());
    if report.excluded > 0 {
        output::kv("Excluded", &report.excluded.to_string());
    }
    if report.deferred > 0 {
        output::kv("Deferred", &report.deferred.to_string());
    }

    if report.interrupted {
        output::warning("Cycle interrupted by shutdown");
    } else if report.cap_reached {
        output::warning("Build cap reached; remaining tags wait for the next cycle");
    }

    if report.failed > 0 {
        output::error(&format!("{} build(s) failed; they are retried next cycle", report.failed));
    } else if report.built > 0 {
        output::success(&format!("{} tag(s) rebuilt and pushed", report.built));
    } else {
        output::success("Everything up to date");
    }
}
