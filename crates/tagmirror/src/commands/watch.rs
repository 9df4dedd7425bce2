//! Watch command

use anyhow::Result;
use camino::Utf8Path;
use tagmirror_core::config::MirrorConfig;
use tagmirror_core::Watcher;
use tracing::info;

use crate::cli::WatchArgs;

pub async fn run(args: WatchArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = MirrorConfig::load(config_path)?;
    let engine = super::prepare_builds(&config, args.tag).await?;

    info!(
        "Mirroring {} -> {}",
        config.upstream.repository,
        config.targets.repositories().join(", ")
    );

    let mut watcher =
        Watcher::new(engine, config.poll_interval()).with_shutdown(super::shutdown_on_signal());
    watcher.run().await;

    Ok(())
}
