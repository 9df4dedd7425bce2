//! List command

use anyhow::Result;
use camino::Utf8Path;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use tagmirror_core::config::MirrorConfig;

use crate::cli::ListArgs;
use crate::output;

#[derive(Tabled, Serialize)]
struct TargetRow {
    tag: String,
    #[tabled(rename = "recorded digest")]
    digest: String,
    #[tabled(rename = "last built")]
    last_built: String,
}

pub async fn run(args: ListArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = MirrorConfig::load(config_path)?;
    let engine = super::engine_from_config(&config, None, None)?;

    let targets = engine.list_targets().await?;

    let mut rows = Vec::with_capacity(targets.len());
    for tag in targets {
        let record = engine.store().get(&tag)?;
        rows.push(TargetRow {
            digest: record
                .as_ref()
                .and_then(|r| r.digest.clone())
                .unwrap_or_else(|| "none".to_string()),
            last_built: record
                .and_then(|r| r.last_built_at)
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
            tag,
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        output::info(&format!(
            "No {}.x tags at or above {} in {}",
            engine.filter().major(),
            engine.filter().min_version(),
            config.upstream.repository
        ));
        return Ok(());
    }

    output::info(&format!(
        "{} tag(s) of {} in scope",
        rows.len(),
        config.upstream.repository
    ));
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);

    Ok(())
}
