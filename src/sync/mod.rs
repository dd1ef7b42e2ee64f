//! The sync engine and its persistent state.

pub(crate) mod engine;
pub(crate) mod lock;
pub(crate) mod state;

pub(crate) use engine::{SyncOptions, run_sync_cycle};
pub(crate) use state::{ReportSummary, SyncState};

use serde::Serialize;
use std::path::PathBuf;

/// Per-session outcome of one cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub(crate) enum SessionOutcome {
    Synced {
        files: Vec<PathBuf>,
        messages: usize,
    },
    SkippedUnchanged,
    SkippedError {
        reason: String,
    },
    PushBlocked {
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SessionReport {
    pub(crate) session: String,
    pub(crate) project: String,
    #[serde(flatten)]
    pub(crate) outcome: SessionOutcome,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct SyncReport {
    pub(crate) sessions: Vec<SessionReport>,
    pub(crate) committed: bool,
    pub(crate) pushed: bool,
    pub(crate) dry_run: bool,
    /// Set when the visibility gate denied the push.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) push_blocked: Option<String>,
    /// Transient commit/push trouble that will be retried next cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) warning: Option<String>,
}

impl SyncReport {
    pub(crate) fn synced(&self) -> usize {
        self.count(|o| matches!(o, SessionOutcome::Synced { .. }))
    }

    pub(crate) fn skipped_unchanged(&self) -> usize {
        self.count(|o| matches!(o, SessionOutcome::SkippedUnchanged))
    }

    pub(crate) fn skipped_error(&self) -> usize {
        self.count(|o| matches!(o, SessionOutcome::SkippedError { .. }))
    }

    pub(crate) fn push_blocked_count(&self) -> usize {
        self.count(|o| matches!(o, SessionOutcome::PushBlocked { .. }))
    }

    pub(crate) fn summary_line(&self) -> String {
        format!(
            "{} synced, {} unchanged, {} errors, {} push-blocked",
            self.synced(),
            self.skipped_unchanged(),
            self.skipped_error(),
            self.push_blocked_count()
        )
    }

    fn count(&self, pred: impl Fn(&SessionOutcome) -> bool) -> usize {
        self.sessions.iter().filter(|s| pred(&s.outcome)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_by_outcome() {
        let report = SyncReport {
            sessions: vec![
                SessionReport {
                    session: "a".into(),
                    project: "p".into(),
                    outcome: SessionOutcome::Synced {
                        files: vec![PathBuf::from("/r/p/2026-02-06.md")],
                        messages: 3,
                    },
                },
                SessionReport {
                    session: "b".into(),
                    project: "p".into(),
                    outcome: SessionOutcome::SkippedUnchanged,
                },
                SessionReport {
                    session: "c".into(),
                    project: "q".into(),
                    outcome: SessionOutcome::SkippedError {
                        reason: "boom".into(),
                    },
                },
            ],
            ..SyncReport::default()
        };
        assert_eq!(report.synced(), 1);
        assert_eq!(report.skipped_unchanged(), 1);
        assert_eq!(report.skipped_error(), 1);
        assert_eq!(report.push_blocked_count(), 0);
        assert_eq!(report.summary_line(), "1 synced, 1 unchanged, 1 errors, 0 push-blocked");
    }

    #[test]
    fn outcomes_serialize_with_kebab_tags() {
        let json = serde_json::to_value(SessionReport {
            session: "abc".into(),
            project: "p".into(),
            outcome: SessionOutcome::SkippedUnchanged,
        })
        .unwrap();
        assert_eq!(json["outcome"], "skipped-unchanged");
        assert_eq!(json["session"], "abc");

        let json = serde_json::to_value(SessionReport {
            session: "abc".into(),
            project: "p".into(),
            outcome: SessionOutcome::PushBlocked {
                reason: "repository is public".into(),
            },
        })
        .unwrap();
        assert_eq!(json["outcome"], "push-blocked");
        assert_eq!(json["reason"], "repository is public");
    }
}
