//! Fail-closed visibility gating for pushes.
//!
//! Detection can only ever err toward Unknown, never toward Private,
//! and denial is a returned value rather than an error: the cycle
//! keeps its local commit and simply reports the blocked push.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use crate::git::{self, run_with_timeout};
use crate::session::identity::normalize_remote_url;

const GH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Visibility {
    Private,
    Public,
    Unknown,
}

/// How the visibility answer was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Detection {
    GitHub,
    NonGitHub,
    NoRemote,
    QueryFailed,
}

impl Detection {
    pub(crate) fn describe(self) -> &'static str {
        match self {
            Detection::GitHub => "GitHub",
            Detection::NonGitHub => "non-GitHub remote",
            Detection::NoRemote => "no remote configured",
            Detection::QueryFailed => "gh query failed",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct VisibilityResult {
    pub(crate) visibility: Visibility,
    pub(crate) detection: Detection,
}

/// Outcome of the push gate.
#[derive(Debug, Clone)]
pub(crate) struct PushDecision {
    pub(crate) allowed: bool,
    pub(crate) visibility: VisibilityResult,
    /// Denial reason, or a warning when allowed through an override.
    pub(crate) notice: Option<String>,
}

/// Determine the visibility of the repository behind `remote`.
pub(crate) fn check_repository_visibility(repo: &Path, remote: &str) -> VisibilityResult {
    let Some(url) = git::remote_url(repo, remote) else {
        return VisibilityResult {
            visibility: Visibility::Unknown,
            detection: Detection::NoRemote,
        };
    };
    if !is_github_remote(&url) {
        return VisibilityResult {
            visibility: Visibility::Unknown,
            detection: Detection::NonGitHub,
        };
    }
    match github_is_private(repo) {
        Some(true) => VisibilityResult {
            visibility: Visibility::Private,
            detection: Detection::GitHub,
        },
        Some(false) => VisibilityResult {
            visibility: Visibility::Public,
            detection: Detection::GitHub,
        },
        None => VisibilityResult {
            visibility: Visibility::Unknown,
            detection: Detection::QueryFailed,
        },
    }
}

fn is_github_remote(url: &str) -> bool {
    // Anchored at the host; a path merely containing github.com is not
    // a GitHub remote.
    normalize_remote_url(url).starts_with("github.com/")
}

/// Ask the GitHub CLI. Any failure (gh missing, not authenticated,
/// network down, unexpected output) collapses to None.
fn github_is_private(repo: &Path) -> Option<bool> {
    let mut cmd = Command::new("gh");
    cmd.current_dir(repo);
    cmd.args(["repo", "view", "--json", "isPrivate", "--jq", ".isPrivate"]);
    let out = run_with_timeout(cmd, GH_TIMEOUT, "gh repo view").ok()?;
    if !out.success {
        return None;
    }
    match out.stdout.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// The gate itself, separated from detection so the whole decision
/// table is trivially testable.
pub(crate) fn decide_push(
    visibility: VisibilityResult,
    allow_public: bool,
    allow_unknown: bool,
) -> PushDecision {
    let (allowed, notice) = match visibility.visibility {
        Visibility::Private => (true, None),
        Visibility::Public if allow_public => (
            true,
            Some("pushing to a PUBLIC repository; make sure nothing sensitive is synced".to_string()),
        ),
        Visibility::Public => (
            false,
            Some(
                "repository is public; set output.allow_public_repository = true to push anyway"
                    .to_string(),
            ),
        ),
        Visibility::Unknown if allow_unknown => (
            true,
            Some(format!(
                "repository visibility unknown ({}); pushing because output.allow_unknown_visibility is set",
                visibility.detection.describe()
            )),
        ),
        Visibility::Unknown => (
            false,
            Some(format!(
                "repository visibility unknown ({}); set output.allow_unknown_visibility = true to push anyway",
                visibility.detection.describe()
            )),
        ),
    };
    PushDecision {
        allowed,
        visibility,
        notice,
    }
}

pub(crate) fn check_push_permission(
    repo: &Path,
    remote: &str,
    allow_public: bool,
    allow_unknown: bool,
) -> PushDecision {
    decide_push(
        check_repository_visibility(repo, remote),
        allow_public,
        allow_unknown,
    )
}
