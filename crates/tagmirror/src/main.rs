//! tagmirror CLI - mirror a filtered set of upstream image tags
//!
//! This is the main entry point for the tagmirror command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider (required for rustls 0.23+)
    // This must be done before any TLS operations
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Watch(args) => commands::watch::run(args, cli.config.as_deref()).await,
        Commands::Once(args) => commands::once::run(args, cli.config.as_deref()).await,
        Commands::List(args) => commands::list::run(args, cli.config.as_deref()).await,
        Commands::Status(args) => commands::status::run(args, cli.config.as_deref()),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            // Cycle summaries and builds are logged at info
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
