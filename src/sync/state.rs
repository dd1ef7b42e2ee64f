//! Persistent bookkeeping for incremental syncs.
//!
//! The state file records, per session, a content fingerprint and how
//! many messages have already been written to each output file. A
//! session whose fingerprint is unchanged is skipped outright; a grown
//! one only appends the messages past the recorded counts, so committed
//! journal content is never rewritten or re-scanned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::AppError;
use crate::utils::sha256_hex;

/// What one session has already contributed to the journal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct SyncRecord {
    /// SHA-256 of the raw log file at the time of the last full sync.
    pub(crate) fingerprint: String,
    /// Output path -> number of messages written there so far.
    #[serde(default)]
    pub(crate) written: BTreeMap<String, usize>,
    pub(crate) synced_at: Option<DateTime<Utc>>,
}

/// Figures carried over from the previous cycle for `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ReportSummary {
    pub(crate) at: DateTime<Utc>,
    pub(crate) synced: usize,
    pub(crate) skipped_unchanged: usize,
    pub(crate) skipped_error: usize,
    pub(crate) push_blocked: usize,
    pub(crate) committed: bool,
    pub(crate) pushed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct SyncState {
    /// Session id -> sync record.
    #[serde(default)]
    pub(crate) records: BTreeMap<String, SyncRecord>,
    #[serde(default)]
    pub(crate) last_sync: Option<DateTime<Utc>>,
    /// A commit exists locally that has not been pushed yet.
    #[serde(default)]
    pub(crate) pending_push: bool,
    #[serde(default)]
    pub(crate) last_report: Option<ReportSummary>,
}

impl SyncState {
    /// Loads state from `path`, treating a missing or corrupt file as
    /// empty. Corruption costs one redundant re-sync, not data loss,
    /// so it is logged and tolerated.
    pub(crate) fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("ignoring unreadable state file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Writes state atomically: serialize to a sibling tmp file, then
    /// rename over the target.
    pub(crate) fn save(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::io(format!("creating {}", parent.display()), e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::io("serializing sync state", e.into()))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| AppError::io(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, path)
            .map_err(|e| AppError::io(format!("replacing {}", path.display()), e))?;
        Ok(())
    }
}

/// SHA-256 of a log file's raw bytes, used as the change fingerprint.
pub(crate) fn fingerprint_file(path: &Path) -> Result<String, AppError> {
    let bytes =
        fs::read(path).map_err(|e| AppError::io(format!("reading {}", path.display()), e))?;
    Ok(sha256_hex(&bytes))
}
