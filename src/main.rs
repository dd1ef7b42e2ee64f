mod app;
mod cli;
mod config;
mod consts;
mod daemon;
mod error;
mod git;
mod mask;
mod output;
mod session;
mod sync;
mod utils;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = app::run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so piped `--json` output stays clean.
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "ccsync=debug" } else { "ccsync=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
