use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "muster")]
#[command(about = "A cloud inventory collector with versioned snapshots")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run all configured collectors and commit a snapshot
    Collect(CollectArgs),

    /// Show the status log of collection attempts
    Status(StatusArgs),

    /// Display the records of a committed snapshot
    Report(ReportArgs),

    /// Compare two snapshot versions of one source
    Diff(DiffArgs),

    /// Remove snapshots older than the retention window
    Prune(PruneArgs),
}

#[derive(Parser)]
pub struct CollectArgs {
    /// Path to the config file (defaults to the platform config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Only collect the named sources
    #[arg(long, value_delimiter = ',')]
    pub source: Option<Vec<String>>,

    /// Output the commit summary as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Show per-source progress and run metrics
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,
}

#[derive(Parser)]
pub struct StatusArgs {
    /// Path to the config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Only show attempts for this source
    #[arg(long)]
    pub source: Option<String>,

    /// Maximum number of rows to show
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct ReportArgs {
    /// Source to report on
    pub source: String,

    /// Path to the config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Snapshot version (defaults to the latest successful one)
    #[arg(long)]
    pub version: Option<i64>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct DiffArgs {
    /// Source whose snapshots to compare
    pub source: String,

    /// Path to the config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Older snapshot version (defaults to the second most recent successful one)
    #[arg(long)]
    pub from: Option<i64>,

    /// Newer snapshot version (defaults to the most recent successful one)
    #[arg(long)]
    pub to: Option<i64>,
}

#[derive(Parser)]
pub struct PruneArgs {
    /// Path to the config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Retention threshold in days (defaults to the configured window)
    #[arg(long)]
    pub days: Option<u64>,

    /// Skip confirmation and delete the expired snapshots
    #[arg(long, default_value_t = false)]
    pub yes: bool,
}

impl PruneArgs {
    /// returns true if this is a dry run (show what would be pruned)
    pub fn is_dry_run(&self) -> bool {
        !self.yes
    }
}
