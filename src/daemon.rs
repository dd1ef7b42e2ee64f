//! Background scheduler running sync cycles on an interval.
//!
//! The scheduler moves through an explicit lifecycle
//! (`Stopped -> Starting -> Running -> Stopping -> Stopped`) and
//! cancels cooperatively: a stop request lets the in-flight session
//! finish, then the loop drains and exits. Transient sync errors keep
//! the loop alive; a configuration error stops it, because every later
//! cycle would fail the same way.

use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::AppError;
use crate::sync::{SyncOptions, run_sync_cycle};
use crate::utils::{DateFilter, pid_alive};

const SLEEP_SLICE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum DaemonState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl DaemonState {
    pub(crate) fn label(self) -> &'static str {
        match self {
            DaemonState::Stopped => "stopped",
            DaemonState::Starting => "starting",
            DaemonState::Running => "running",
            DaemonState::Stopping => "stopping",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => DaemonState::Starting,
            2 => DaemonState::Running,
            3 => DaemonState::Stopping,
            _ => DaemonState::Stopped,
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    cancel: AtomicBool,
    /// Set when the loop exits because of a configuration error.
    failed: AtomicBool,
    next_run: Mutex<Option<DateTime<Utc>>>,
}

/// Owns the scheduler thread. Dropping a running scheduler detaches
/// the thread; call [`Scheduler::stop`] for an orderly drain.
#[derive(Debug)]
pub(crate) struct Scheduler {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    config: Config,
}

impl Scheduler {
    pub(crate) fn new(config: Config) -> Self {
        Scheduler {
            shared: Arc::new(Shared {
                state: AtomicU8::new(DaemonState::Stopped as u8),
                cancel: AtomicBool::new(false),
                failed: AtomicBool::new(false),
                next_run: Mutex::new(None),
            }),
            handle: None,
            config,
        }
    }

    /// Starts the loop. Returns false when it is already running.
    pub(crate) fn start(&mut self) -> bool {
        let moved = self.shared.state.compare_exchange(
            DaemonState::Stopped as u8,
            DaemonState::Starting as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if moved.is_err() {
            return false;
        }
        self.shared.cancel.store(false, Ordering::SeqCst);
        self.shared.failed.store(false, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        match thread::Builder::new()
            .name("ccsync-scheduler".to_string())
            .spawn(move || run_loop(shared, config))
        {
            Ok(handle) => {
                self.handle = Some(handle);
                true
            }
            Err(e) => {
                tracing::error!("failed to spawn scheduler thread: {e}");
                self.shared
                    .state
                    .store(DaemonState::Stopped as u8, Ordering::SeqCst);
                false
            }
        }
    }

    /// Requests a stop and waits for the loop to drain.
    pub(crate) fn stop(&mut self) {
        self.shared
            .state
            .store(DaemonState::Stopping as u8, Ordering::SeqCst);
        self.shared.cancel.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("scheduler thread panicked");
        }
        self.shared
            .state
            .store(DaemonState::Stopped as u8, Ordering::SeqCst);
    }

    pub(crate) fn state(&self) -> DaemonState {
        DaemonState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    pub(crate) fn failed(&self) -> bool {
        self.shared.failed.load(Ordering::SeqCst)
    }

    pub(crate) fn next_run(&self) -> Option<DateTime<Utc>> {
        self.shared.next_run.lock().ok().and_then(|guard| *guard)
    }
}

fn run_loop(shared: Arc<Shared>, config: Config) {
    shared
        .state
        .store(DaemonState::Running as u8, Ordering::SeqCst);
    let interval = Duration::from_secs(config.sync.interval);
    tracing::info!("scheduler running, interval {}s", config.sync.interval);

    while !shared.cancel.load(Ordering::SeqCst) {
        let options = SyncOptions::default();
        match run_sync_cycle(&config, &DateFilter::default(), &options, &shared.cancel) {
            Ok(_) => {}
            Err(e) if e.is_transient() => {
                tracing::warn!("sync cycle failed, will retry: {e}");
            }
            Err(e) => {
                tracing::error!("stopping scheduler: {e}");
                shared.failed.store(true, Ordering::SeqCst);
                break;
            }
        }

        let next = Utc::now()
            + chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::seconds(300));
        if let Ok(mut guard) = shared.next_run.lock() {
            *guard = Some(next);
        }
        let deadline = Instant::now() + interval;
        while Instant::now() < deadline {
            if shared.cancel.load(Ordering::SeqCst) {
                break;
            }
            thread::sleep(SLEEP_SLICE.min(deadline.saturating_duration_since(Instant::now())));
        }
    }
    if let Ok(mut guard) = shared.next_run.lock() {
        *guard = None;
    }
    shared
        .state
        .store(DaemonState::Stopped as u8, Ordering::SeqCst);
    tracing::info!("scheduler stopped");
}

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

pub(crate) fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

#[cfg(unix)]
extern "C" fn handle_signal(_signal: libc::c_int) {
    // Only the async-signal-safe atomic store happens here; the
    // foreground loop notices and drains the scheduler.
    SHUTDOWN.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
pub(crate) fn install_signal_handlers() {
    let handler: extern "C" fn(libc::c_int) = handle_signal;
    // SAFETY: the handler touches nothing but a static atomic.
    unsafe {
        libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
pub(crate) fn install_signal_handlers() {}

pub(crate) fn write_pid_file(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io(format!("creating {}", parent.display()), e))?;
    }
    fs::write(path, std::process::id().to_string())
        .map_err(|e| AppError::io(format!("writing {}", path.display()), e))
}

pub(crate) fn remove_pid_file(path: &Path) {
    if path.exists()
        && let Err(e) = fs::remove_file(path)
    {
        tracing::warn!("failed to remove {}: {e}", path.display());
    }
}

fn read_pid_file(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Pid of a live daemon, if any. A pid file for a dead process is
/// cleaned up on the way.
pub(crate) fn running_pid(path: &Path) -> Option<u32> {
    let pid = read_pid_file(path)?;
    if pid_alive(pid) {
        return Some(pid);
    }
    tracing::debug!("removing stale pid file {}", path.display());
    remove_pid_file(path);
    None
}

/// Re-launches the current executable as `ccsync run` with stdio
/// detached and stderr appended to the daemon log. Flags that shape
/// the daemon's behavior are forwarded.
pub(crate) fn spawn_background(
    config: &Config,
    config_path: Option<&Path>,
    timezone: Option<&str>,
    verbose: bool,
) -> Result<u32, AppError> {
    let exe = std::env::current_exe()
        .map_err(|e| AppError::io("locating the ccsync executable", e))?;
    fs::create_dir_all(&config.state_dir)
        .map_err(|e| AppError::io(format!("creating {}", config.state_dir.display()), e))?;
    let log_path = config.log_file();
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| AppError::io(format!("opening {}", log_path.display()), e))?;

    let mut cmd = Command::new(exe);
    cmd.arg("run")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(log));
    if let Some(path) = config_path {
        cmd.arg("--config").arg(path);
    }
    if let Some(tz) = timezone {
        cmd.arg("--timezone").arg(tz);
    }
    if verbose {
        cmd.arg("--verbose");
    }
    let child = cmd.spawn().map_err(|e| AppError::Daemon {
        reason: format!("failed to launch daemon: {e}"),
    })?;
    Ok(child.id())
}

/// Sends SIGTERM and waits for the process to exit.
#[cfg(unix)]
pub(crate) fn terminate(pid: u32, timeout: Duration) -> Result<(), AppError> {
    // SAFETY: plain signal send; an ESRCH result just means the
    // process is already gone.
    let sent = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if sent != 0 {
        return Ok(());
    }
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if !pid_alive(pid) {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(100));
    }
    Err(AppError::Daemon {
        reason: format!(
            "daemon (pid {pid}) did not stop within {}s",
            timeout.as_secs()
        ),
    })
}

#[cfg(not(unix))]
pub(crate) fn terminate(_pid: u32, _timeout: Duration) -> Result<(), AppError> {
    Err(AppError::Daemon {
        reason: "stopping the daemon is only supported on unix".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Structure;

    #[test]
    fn state_round_trips_through_u8() {
        for state in [
            DaemonState::Stopped,
            DaemonState::Starting,
            DaemonState::Running,
            DaemonState::Stopping,
        ] {
            assert_eq!(DaemonState::from_u8(state as u8), state);
        }
        assert_eq!(DaemonState::from_u8(200), DaemonState::Stopped);
        assert_eq!(DaemonState::Running.label(), "running");
    }

    #[test]
    fn pid_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("daemon.pid");
        write_pid_file(&path).unwrap();
        assert_eq!(read_pid_file(&path), Some(std::process::id()));
        assert_eq!(running_pid(&path), Some(std::process::id()));
        remove_pid_file(&path);
        assert!(!path.exists());
    }

    #[test]
    fn stale_pid_file_is_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        fs::write(&path, "999999999").unwrap();
        assert_eq!(running_pid(&path), None);
        assert!(!path.exists());
    }

    fn test_config(root: &Path) -> Config {
        let mut config = Config::default();
        config.output.repository = root.join("journal");
        config.output.structure = Structure::Project;
        config.output.auto_push = false;
        config.sync.interval = 1;
        config.state_dir = root.join("state");
        config.projects_dir = root.join("projects");
        config
    }

    #[test]
    fn scheduler_starts_and_drains() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        fs::create_dir_all(&config.output.repository).unwrap();
        fs::create_dir_all(&config.projects_dir).unwrap();

        let mut scheduler = Scheduler::new(config);
        assert_eq!(scheduler.state(), DaemonState::Stopped);
        assert!(scheduler.start());
        assert!(!scheduler.start(), "second start must be rejected");

        thread::sleep(Duration::from_millis(300));
        assert!(matches!(
            scheduler.state(),
            DaemonState::Starting | DaemonState::Running
        ));

        scheduler.stop();
        assert_eq!(scheduler.state(), DaemonState::Stopped);
        assert!(!scheduler.failed());
        assert_eq!(scheduler.next_run(), None);
    }

    #[test]
    fn configuration_error_stops_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        // Repository directory deliberately missing.
        config.output.repository = dir.path().join("absent");

        let mut scheduler = Scheduler::new(config);
        assert!(scheduler.start());
        thread::sleep(Duration::from_millis(300));
        assert_eq!(scheduler.state(), DaemonState::Stopped);
        assert!(scheduler.failed());
        scheduler.stop();
    }
}
