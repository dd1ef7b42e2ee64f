//! Command dispatch: wires parsed CLI arguments to the sync engine
//! and the daemon.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crate::cli::{Cli, Commands, SyncArgs};
use crate::config::Config;
use crate::daemon::{self, DaemonState, Scheduler};
use crate::error::AppError;
use crate::output::{print_file_list, print_report};
use crate::sync::{ReportSummary, SyncOptions, SyncState, run_sync_cycle};
use crate::utils::DateFilter;

pub(crate) fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_to(&mut config)?;
    match &cli.command {
        Some(Commands::Sync(args)) => handle_sync(&cli, &config, args),
        Some(Commands::List { limit }) => handle_list(&cli, &config, *limit),
        Some(Commands::Status) | None => handle_status(&cli, &config),
        Some(Commands::Start { foreground }) => {
            if *foreground {
                handle_run(&config)
            } else {
                handle_start(&cli, &config)
            }
        }
        Some(Commands::Run) => handle_run(&config),
        Some(Commands::Stop) => handle_stop(&config),
    }
}

fn handle_sync(cli: &Cli, config: &Config, args: &SyncArgs) -> Result<(), AppError> {
    let scope = DateFilter::from_args(
        args.date.as_deref(),
        args.since.as_deref(),
        args.until.as_deref(),
    )?;
    let options = SyncOptions {
        dry_run: args.dry_run,
        force: args.force,
        commit: !args.no_commit,
        push: !args.no_push,
    };
    let cancel = AtomicBool::new(false);
    let report = run_sync_cycle(config, &scope, &options, &cancel)?;
    print_report(&report, cli.json);
    Ok(())
}

fn handle_list(cli: &Cli, config: &Config, limit: usize) -> Result<(), AppError> {
    let repo = &config.output.repository;
    let pattern = format!("{}/**/*.md", repo.display());
    let mut entries: Vec<(PathBuf, std::time::SystemTime)> = glob::glob(&pattern)
        .map(|paths| {
            paths
                .flatten()
                .filter_map(|path| {
                    let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
                    Some((path, modified))
                })
                .collect()
        })
        .unwrap_or_default();
    entries.sort_by(|a, b| b.1.cmp(&a.1));

    let rows: Vec<(String, String)> = entries
        .into_iter()
        .take(limit)
        .map(|(path, modified)| {
            let rel = path
                .strip_prefix(repo)
                .unwrap_or(&path)
                .display()
                .to_string();
            let stamp = DateTime::<Local>::from(modified)
                .format("%Y-%m-%d %H:%M")
                .to_string();
            (rel, stamp)
        })
        .collect();
    print_file_list(&rows, cli.json);
    Ok(())
}

#[derive(Serialize)]
struct StatusView {
    daemon_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_sync: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_run: Option<DateTime<Utc>>,
    pending_push: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_cycle: Option<ReportSummary>,
}

fn handle_status(cli: &Cli, config: &Config) -> Result<(), AppError> {
    let pid = daemon::running_pid(&config.pid_file());
    let state = SyncState::load(&config.state_file());
    // An estimate: the daemon schedules the next cycle one interval
    // after the previous one finished.
    let next_run = match (pid, state.last_sync) {
        (Some(_), Some(last)) => {
            Some(last + chrono::Duration::seconds(config.sync.interval as i64))
        }
        _ => None,
    };

    if cli.json {
        let view = StatusView {
            daemon_running: pid.is_some(),
            pid,
            last_sync: state.last_sync,
            next_run,
            pending_push: state.pending_push,
            last_cycle: state.last_report.clone(),
        };
        let json = serde_json::to_string_pretty(&view)
            .map_err(|e| AppError::io("serializing status", e.into()))?;
        println!("{json}");
        return Ok(());
    }

    let tz = config.timezone()?;
    match pid {
        Some(pid) => println!("Daemon: {} (PID: {pid})", DaemonState::Running.label()),
        None => println!("Daemon: {}", DaemonState::Stopped.label()),
    }
    match state.last_sync {
        Some(at) => println!(
            "Last sync: {}",
            tz.to_fixed_offset(at).format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!("Last sync: never"),
    }
    if let Some(next) = next_run {
        println!(
            "Next run: ~{}",
            tz.to_fixed_offset(next).format("%Y-%m-%d %H:%M:%S")
        );
    }
    if state.pending_push {
        println!("Pending push: yes");
    }
    if let Some(last) = &state.last_report {
        println!(
            "Last cycle: {} synced, {} unchanged, {} errors, {} push-blocked",
            last.synced, last.skipped_unchanged, last.skipped_error, last.push_blocked
        );
    }
    Ok(())
}

fn handle_start(cli: &Cli, config: &Config) -> Result<(), AppError> {
    if let Some(pid) = daemon::running_pid(&config.pid_file()) {
        return Err(AppError::Daemon {
            reason: format!("daemon already running (PID: {pid})"),
        });
    }
    let pid = daemon::spawn_background(
        config,
        cli.config.as_deref(),
        cli.timezone.as_deref(),
        cli.verbose,
    )?;
    println!("Daemon started (PID: {pid})");
    Ok(())
}

/// Foreground daemon: owns the pid file and drains the scheduler on
/// SIGTERM/SIGINT.
fn handle_run(config: &Config) -> Result<(), AppError> {
    let pid_file = config.pid_file();
    if let Some(pid) = daemon::running_pid(&pid_file) {
        return Err(AppError::Daemon {
            reason: format!("daemon already running (PID: {pid})"),
        });
    }
    daemon::write_pid_file(&pid_file)?;
    daemon::install_signal_handlers();

    let mut scheduler = Scheduler::new(config.clone());
    if !scheduler.start() {
        daemon::remove_pid_file(&pid_file);
        return Err(AppError::Daemon {
            reason: "failed to start the scheduler".to_string(),
        });
    }
    let mut announced: Option<DateTime<Utc>> = None;
    while !daemon::shutdown_requested() && scheduler.state() != DaemonState::Stopped {
        let next = scheduler.next_run();
        if next != announced {
            if let Some(at) = next {
                tracing::debug!("next cycle scheduled for {at}");
            }
            announced = next;
        }
        std::thread::sleep(Duration::from_millis(200));
    }
    scheduler.stop();
    daemon::remove_pid_file(&pid_file);
    if scheduler.failed() {
        return Err(AppError::Daemon {
            reason: "daemon stopped after a configuration error; see the log".to_string(),
        });
    }
    Ok(())
}

fn handle_stop(config: &Config) -> Result<(), AppError> {
    let Some(pid) = daemon::running_pid(&config.pid_file()) else {
        return Err(AppError::Daemon {
            reason: "daemon is not running".to_string(),
        });
    };
    daemon::terminate(pid, Duration::from_secs(5))?;
    daemon::remove_pid_file(&config.pid_file());
    println!("Daemon stopped");
    Ok(())
}
