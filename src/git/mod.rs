//! Thin wrapper around the `git` CLI with bounded timeouts.
//!
//! Every invocation is killed at its deadline so a hung remote can
//! never wedge a sync cycle or the daemon loop.

pub(crate) mod visibility;

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::AppError;

pub(crate) const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const STATUS_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const COMMIT_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const PUSH_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured output of a finished subprocess.
#[derive(Debug)]
pub(crate) struct CmdOutput {
    pub(crate) success: bool,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

/// Run `cmd`, killing it when `timeout` elapses. Spawn failures and
/// timeouts are transient errors; a non-zero exit is reported in the
/// returned output, not as an error.
pub(crate) fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    label: &str,
) -> Result<CmdOutput, AppError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|e| AppError::TransientSync {
        reason: format!("failed to run {label}: {e}"),
    })?;
    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stdout.join();
                    let _ = stderr.join();
                    return Err(AppError::TransientSync {
                        reason: format!("{label} timed out after {}s", timeout.as_secs()),
                    });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                let _ = child.kill();
                return Err(AppError::TransientSync {
                    reason: format!("failed to wait for {label}: {e}"),
                });
            }
        }
    };
    Ok(CmdOutput {
        success: status.success(),
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

fn spawn_reader(pipe: Option<impl Read + Send + 'static>) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut bytes = Vec::new();
        if let Some(mut pipe) = pipe
            && pipe.read_to_end(&mut bytes).is_err()
        {
            bytes.clear();
        }
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

fn git(repo: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(repo);
    cmd
}

fn failure(label: &str, out: &CmdOutput) -> AppError {
    let detail = out.stderr.lines().next().unwrap_or("").trim();
    let detail = if detail.is_empty() {
        "non-zero exit"
    } else {
        detail
    };
    AppError::TransientSync {
        reason: format!("{label} failed: {detail}"),
    }
}

/// URL of `remote`, or None when the directory is not a repository or
/// has no such remote.
pub(crate) fn remote_url(repo: &Path, remote: &str) -> Option<String> {
    let mut cmd = git(repo);
    cmd.args(["remote", "get-url", remote]);
    match run_with_timeout(cmd, LOOKUP_TIMEOUT, "git remote get-url") {
        Ok(out) if out.success => {
            let url = out.stdout.trim().to_string();
            (!url.is_empty()).then_some(url)
        }
        _ => None,
    }
}

pub(crate) fn current_branch(repo: &Path) -> Option<String> {
    let mut cmd = git(repo);
    cmd.args(["branch", "--show-current"]);
    match run_with_timeout(cmd, LOOKUP_TIMEOUT, "git branch") {
        Ok(out) if out.success => {
            let branch = out.stdout.trim().to_string();
            (!branch.is_empty()).then_some(branch)
        }
        _ => None,
    }
}

pub(crate) fn status_porcelain(repo: &Path) -> Result<String, AppError> {
    let mut cmd = git(repo);
    cmd.args(["status", "--porcelain"]);
    let out = run_with_timeout(cmd, STATUS_TIMEOUT, "git status")?;
    if !out.success {
        return Err(failure("git status", &out));
    }
    Ok(out.stdout)
}

fn add_all(repo: &Path) -> Result<(), AppError> {
    let mut cmd = git(repo);
    cmd.args(["add", "-A"]);
    let out = run_with_timeout(cmd, STATUS_TIMEOUT, "git add")?;
    if !out.success {
        return Err(failure("git add", &out));
    }
    Ok(())
}

fn commit(repo: &Path, message: &str) -> Result<(), AppError> {
    let mut cmd = git(repo);
    cmd.args(["commit", "-m", message]);
    let out = run_with_timeout(cmd, COMMIT_TIMEOUT, "git commit")?;
    if !out.success {
        return Err(failure("git commit", &out));
    }
    Ok(())
}

/// Commit the whole tree when anything is dirty. Returns whether a
/// commit was created. Picking up leftover changes here also heals
/// earlier cycles whose commit step failed partway.
pub(crate) fn commit_if_dirty(repo: &Path, message: &str) -> Result<bool, AppError> {
    if status_porcelain(repo)?.trim().is_empty() {
        return Ok(false);
    }
    add_all(repo)?;
    commit(repo, message)?;
    Ok(true)
}

pub(crate) fn push(repo: &Path, remote: &str, branch: &str) -> Result<(), AppError> {
    let mut cmd = git(repo);
    cmd.args(["push", remote, branch]);
    let out = run_with_timeout(cmd, PUSH_TIMEOUT, "git push")?;
    if !out.success {
        return Err(failure("git push", &out));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]);
        cmd
    }

    #[cfg(unix)]
    #[test]
    fn captures_both_streams() {
        let out = run_with_timeout(sh("echo out; echo err 1>&2"), Duration::from_secs(5), "sh")
            .unwrap();
        assert!(out.success);
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_not_an_error() {
        let out = run_with_timeout(sh("exit 3"), Duration::from_secs(5), "sh").unwrap();
        assert!(!out.success);
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_the_child() {
        let started = Instant::now();
        let err =
            run_with_timeout(sh("sleep 30"), Duration::from_millis(200), "sh").unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn spawn_failure_is_transient() {
        let err = run_with_timeout(
            Command::new("ccsync-no-such-binary"),
            Duration::from_secs(1),
            "missing tool",
        )
        .unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("missing tool"));
    }

    #[test]
    fn remote_url_outside_a_repository_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(remote_url(dir.path(), "origin"), None);
        assert_eq!(current_branch(dir.path()), None);
    }

    #[test]
    fn status_outside_a_repository_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(status_porcelain(dir.path()).is_err());
    }
}
