use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "config/pilot.toml";

#[derive(Debug, Parser)]
#[command(
    name = "pilot",
    about = "Plans, implements and opens pull requests for issues on request",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the configured repository and act on trigger comments
    Run {
        /// Run a single poll cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// List tasks that are not completed
    Status {
        /// Include completed tasks
        #[arg(long)]
        all: bool,
        /// Print tasks as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rewind or clear the poll checkpoint
    ResetCheckpoint {
        /// New checkpoint as RFC 3339; omitted clears it
        #[arg(long, value_parser = parse_timestamp)]
        to: Option<DateTime<Utc>>,
    },
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| format!("expected an RFC 3339 timestamp: {err}"))
}
