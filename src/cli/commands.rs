//! CLI subcommand definitions

use clap::{Args, Subcommand};

/// Main CLI commands
#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Sync sessions into the journal once
    Sync(SyncArgs),
    /// List recently written journal files
    List {
        /// Maximum number of files to show
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
    /// Show daemon and sync status (default)
    Status,
    /// Start the sync daemon in the background
    Start {
        /// Stay in the foreground instead of detaching
        #[arg(short, long)]
        foreground: bool,
    },
    /// Run the daemon loop in the foreground
    Run,
    /// Stop the sync daemon
    Stop,
}

#[derive(Debug, Default, Args)]
pub(crate) struct SyncArgs {
    /// Report what would be synced without writing anything
    #[arg(long)]
    pub(crate) dry_run: bool,

    /// Sync a single day (YYYYMMDD or YYYY-MM-DD)
    #[arg(short, long, value_name = "DATE", conflicts_with_all = ["since", "until"])]
    pub(crate) date: Option<String>,

    /// Sync messages from this date on
    #[arg(short, long, value_name = "DATE")]
    pub(crate) since: Option<String>,

    /// Sync messages up to this date
    #[arg(short, long, value_name = "DATE")]
    pub(crate) until: Option<String>,

    /// Re-examine sessions whose logs look unchanged
    #[arg(short, long)]
    pub(crate) force: bool,

    /// Skip the git commit step
    #[arg(long)]
    pub(crate) no_commit: bool,

    /// Skip the git push step
    #[arg(long)]
    pub(crate) no_push: bool,
}
