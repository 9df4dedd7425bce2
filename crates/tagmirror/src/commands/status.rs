//! Status command

use anyhow::Result;
use camino::Utf8Path;
use tabled::{settings::Style, Table, Tabled};
use tagmirror_core::config::MirrorConfig;
use tagmirror_core::StateStore;

use crate::cli::StatusArgs;
use crate::output;

#[derive(Tabled)]
struct RecordRow {
    tag: String,
    digest: String,
    updated: String,
    #[tabled(rename = "last built")]
    last_built: String,
}

pub fn run(args: StatusArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = MirrorConfig::load(config_path)?;
    let store = super::open_store(&config)?;
    let records = store.records()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    output::header(&format!("State: {}", store.path()));
    if records.is_empty() {
        output::info("No tags recorded yet");
        return Ok(());
    }

    let built = records.iter().filter(|r| r.last_built_at.is_some()).count();
    output::kv("Tags", &records.len().to_string());
    output::kv("Built at least once", &built.to_string());

    let rows: Vec<RecordRow> = records
        .into_iter()
        .map(|r| RecordRow {
            tag: r.name,
            digest: r.digest.unwrap_or_else(|| "none".to_string()),
            updated: r.updated_at.to_rfc3339(),
            last_built: r
                .last_built_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        })
        .collect();

    println!();
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);

    Ok(())
}
