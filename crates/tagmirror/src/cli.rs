//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// tagmirror - rebuild and republish upstream image tags when their digest changes
#[derive(Parser, Debug)]
#[command(name = "tagmirror")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to tagmirror.yaml config file
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll upstream forever, building tags whose digest changed
    Watch(WatchArgs),

    /// Run a single sync cycle and exit
    Once(OnceArgs),

    /// List the upstream tags that would be mirrored
    List(ListArgs),

    /// Show the persisted build state
    Status(StatusArgs),
}

// Watch command
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Only consider this tag
    #[arg(short, long)]
    pub tag: Option<String>,
}

// Once command
#[derive(Args, Debug)]
pub struct OnceArgs {
    /// Only consider this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Print the cycle report as JSON
    #[arg(long)]
    pub json: bool,
}

// List command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// Status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
