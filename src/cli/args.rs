//! CLI argument definitions
//!
//! Global CLI options shared by every subcommand.

use clap::Parser;
use std::path::PathBuf;

use super::commands::Commands;
use crate::config::Config;
use crate::error::AppError;

#[derive(Parser)]
#[command(name = "ccsync")]
#[command(
    about = "Sync Claude Code conversation logs into a git-backed Markdown journal",
    version
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Option<Commands>,

    /// Path to the config file (default: ~/.config/ccsync/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub(crate) json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,

    /// Timezone for journal dates (e.g., "Asia/Tokyo", "UTC", "America/New_York")
    #[arg(short = 'z', long, global = true, value_name = "TZ")]
    pub(crate) timezone: Option<String>,
}

impl Cli {
    /// Apply global overrides onto the loaded configuration (CLI args
    /// take precedence over the config file).
    pub(crate) fn apply_to(&self, config: &mut Config) -> Result<(), AppError> {
        if self.timezone.is_some() {
            config.output.timezone = self.timezone.clone();
            // Reject a bad override here rather than mid-cycle.
            config.timezone()?;
        }
        Ok(())
    }
}
