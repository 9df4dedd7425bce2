//! Once command

use anyhow::{Context, Result};
use camino::Utf8Path;
use tagmirror_core::config::MirrorConfig;
use tagmirror_core::Watcher;

use crate::cli::OnceArgs;

pub async fn run(args: OnceArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = MirrorConfig::load(config_path)?;
    let engine = super::prepare_builds(&config, args.tag).await?;

    let mut watcher =
        Watcher::new(engine, config.poll_interval()).with_shutdown(super::shutdown_on_signal());
    let report = watcher.run_once().await.context("Sync cycle failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        super::print_report(&report);
    }

    Ok(())
}
