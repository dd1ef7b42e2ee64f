//! One sync cycle: discover sessions, select the changed ones, parse,
//! append to the journal, commit, and (when the gate allows) push.

use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Config;
use crate::error::AppError;
use crate::git::{self, visibility::check_push_permission};
use crate::output::{MessageFilters, SlugTable, file_header, resolve_output_path, session_block};
use crate::session::{
    Message, ParsedSession, ProjectIdentity, SessionFile, find_session_files,
    parse_session_file, resolve_project_identity,
};
use crate::sync::lock::DestinationLock;
use crate::sync::state::{ReportSummary, SyncState, fingerprint_file};
use crate::sync::{SessionOutcome, SessionReport, SyncReport};
use crate::utils::{DateFilter, Timezone};

#[derive(Debug, Clone, Copy)]
pub(crate) struct SyncOptions {
    /// Report what would be written without touching the journal,
    /// state, or git.
    pub(crate) dry_run: bool,
    /// Re-examine sessions whose fingerprint is unchanged.
    pub(crate) force: bool,
    pub(crate) commit: bool,
    pub(crate) push: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            dry_run: false,
            force: false,
            commit: true,
            push: true,
        }
    }
}

/// A session that passed selection and needs parsing.
#[derive(Debug)]
struct ParseJob {
    file: SessionFile,
    identity: ProjectIdentity,
    display: String,
    fingerprint: String,
}

/// A parsed session waiting to be written.
#[derive(Debug)]
struct WorkItem {
    row: usize,
    job: ParseJob,
    parsed: ParsedSession,
}

impl WorkItem {
    fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.parsed.messages.first().map(|m| m.timestamp)
    }
}

/// Per-cycle context shared by every session.
struct CycleContext<'a> {
    config: &'a Config,
    tz: Timezone,
    filters: MessageFilters,
    slugs: SlugTable,
}

/// One journal file a session will append to.
struct FileWrite<'m> {
    path: PathBuf,
    key: String,
    date: NaiveDate,
    fresh: Vec<&'m Message>,
    new_total: usize,
}

/// Runs one full cycle. `cancel` is checked between sessions, so a
/// shutdown request never leaves a half-written session behind.
pub(crate) fn run_sync_cycle(
    config: &Config,
    scope: &DateFilter,
    options: &SyncOptions,
    cancel: &AtomicBool,
) -> Result<SyncReport, AppError> {
    let repo = config.output.repository.clone();
    if !repo.is_dir() {
        return Err(AppError::Configuration {
            reason: format!(
                "output repository {} does not exist; create it and run `git init`",
                repo.display()
            ),
        });
    }
    let tz = config.timezone()?;

    // Dry runs never write, so they run unlocked and can overlap a
    // real sync.
    let _lock = if options.dry_run {
        None
    } else {
        Some(DestinationLock::acquire(&config.locks_dir(), &repo)?)
    };

    let mut state = SyncState::load(&config.state_file());
    let files = find_session_files(&config.projects_dir);
    tracing::debug!("{} session file(s) under {}", files.len(), config.projects_dir.display());

    // Identity resolution shells out to git, so do it once per project
    // directory rather than once per session.
    let mut identities: HashMap<String, Result<ProjectIdentity, String>> = HashMap::new();
    for file in &files {
        identities
            .entry(file.encoded_dir.clone())
            .or_insert_with(|| resolve_project_identity(&file.encoded_dir).map_err(|e| e.to_string()));
    }
    let slugs = SlugTable::build(
        identities
            .values()
            .filter_map(|r| r.as_ref().ok())
            .map(|id| (id.identity.as_str(), display_name(config, id))),
    );
    let cx = CycleContext {
        config,
        tz,
        filters: MessageFilters::from_config(&config.sync),
        slugs,
    };

    // Selection: decide per session whether to skip or parse.
    let mut rows: Vec<Option<SessionReport>> = Vec::with_capacity(files.len());
    let mut jobs: Vec<(usize, ParseJob)> = Vec::new();
    for file in files {
        let identity = match &identities[&file.encoded_dir] {
            Ok(identity) => identity.clone(),
            Err(reason) => {
                rows.push(Some(SessionReport {
                    session: file.short_id().to_string(),
                    project: file.encoded_dir.clone(),
                    outcome: SessionOutcome::SkippedError {
                        reason: reason.clone(),
                    },
                }));
                continue;
            }
        };
        let display = display_name(config, &identity).to_string();
        let fingerprint = match fingerprint_file(&file.path) {
            Ok(fp) => fp,
            Err(e) => {
                rows.push(Some(SessionReport {
                    session: file.short_id().to_string(),
                    project: display,
                    outcome: SessionOutcome::SkippedError {
                        reason: e.to_string(),
                    },
                }));
                continue;
            }
        };
        let unchanged = state
            .records
            .get(&file.record_key())
            .is_some_and(|r| r.fingerprint == fingerprint);
        if unchanged && !options.force {
            rows.push(Some(SessionReport {
                session: file.short_id().to_string(),
                project: display,
                outcome: SessionOutcome::SkippedUnchanged,
            }));
            continue;
        }
        rows.push(None);
        jobs.push((
            rows.len() - 1,
            ParseJob {
                file,
                identity,
                display,
                fingerprint,
            },
        ));
    }

    // Parse changed sessions in parallel; order is preserved.
    let parsed: Vec<Option<Result<ParsedSession, AppError>>> = jobs
        .par_iter()
        .map(|(_, job)| {
            if cancel.load(Ordering::SeqCst) {
                return None;
            }
            Some(parse_session_file(&job.file.path))
        })
        .collect();

    let mut work: Vec<WorkItem> = Vec::new();
    let mut cancelled = false;
    for ((row, job), result) in jobs.into_iter().zip(parsed) {
        match result {
            None => cancelled = true,
            Some(Ok(parsed)) => work.push(WorkItem { row, job, parsed }),
            Some(Err(e)) => {
                rows[row] = Some(SessionReport {
                    session: job.file.short_id().to_string(),
                    project: job.display,
                    outcome: SessionOutcome::SkippedError {
                        reason: e.to_string(),
                    },
                });
            }
        }
    }
    // Blocks land in session start order, so shared daily files read
    // chronologically.
    work.sort_by(|a, b| {
        a.first_timestamp()
            .cmp(&b.first_timestamp())
            .then_with(|| a.job.file.path.cmp(&b.job.file.path))
    });

    for item in &work {
        if cancelled || cancel.load(Ordering::SeqCst) {
            cancelled = true;
            break;
        }
        let outcome = sync_one_session(&cx, &mut state, item, scope, options);
        rows[item.row] = Some(SessionReport {
            session: item.job.file.short_id().to_string(),
            project: item.job.display.clone(),
            outcome,
        });
    }

    let mut report = SyncReport {
        sessions: rows.into_iter().flatten().collect(),
        dry_run: options.dry_run,
        ..SyncReport::default()
    };

    if cancelled {
        tracing::info!("sync cancelled before completion");
    } else if !options.dry_run {
        if options.commit {
            let stamp = tz.to_fixed_offset(Utc::now()).format("%Y-%m-%d %H:%M:%S");
            let message = format!("Update conversation logs ({stamp})");
            match git::commit_if_dirty(&repo, &message) {
                Ok(committed) => report.committed = committed,
                Err(e) => {
                    tracing::warn!("commit failed: {e}");
                    report.warning = Some(e.to_string());
                }
            }
        }
        let want_push = options.push
            && config.output.auto_push
            && (report.committed || state.pending_push);
        if want_push {
            match push_with_gate(config, &repo) {
                Ok(()) => {
                    report.pushed = true;
                    state.pending_push = false;
                }
                Err(AppError::PushBlocked { reason }) => {
                    tracing::warn!("push blocked: {reason}");
                    state.pending_push = true;
                    for row in &mut report.sessions {
                        if matches!(row.outcome, SessionOutcome::Synced { .. }) {
                            row.outcome = SessionOutcome::PushBlocked {
                                reason: reason.clone(),
                            };
                        }
                    }
                    report.push_blocked = Some(reason);
                }
                Err(e) => {
                    tracing::warn!("push failed: {e}");
                    state.pending_push = true;
                    report.warning = Some(e.to_string());
                }
            }
        }
    }

    if !options.dry_run {
        state.last_sync = Some(Utc::now());
        state.last_report = Some(ReportSummary {
            at: Utc::now(),
            synced: report.synced(),
            skipped_unchanged: report.skipped_unchanged(),
            skipped_error: report.skipped_error(),
            push_blocked: report.push_blocked_count(),
            committed: report.committed,
            pushed: report.pushed,
        });
        state.save(&config.state_file())?;
    }
    tracing::info!(
        "cycle done: {}{}",
        report.summary_line(),
        if report.pushed { ", pushed" } else { "" }
    );
    Ok(report)
}

/// The configured alias for a project, falling back to its identity.
/// Aliases match on the decoded path first, then on the identity
/// string, so both spellings work in the config file.
fn display_name<'a>(config: &'a Config, identity: &'a ProjectIdentity) -> &'a str {
    let path = identity.decoded_path.to_string_lossy();
    if let Some(alias) = config.projects.aliases.get(path.as_ref()) {
        return alias;
    }
    if let Some(alias) = config.projects.aliases.get(&identity.identity) {
        return alias;
    }
    &identity.identity
}

/// Pushes after consulting the visibility gate. A denied gate is a
/// `PushBlocked` error so the caller can keep the commit local and
/// mark the push as pending.
fn push_with_gate(config: &Config, repo: &Path) -> Result<(), AppError> {
    let decision = check_push_permission(
        repo,
        &config.output.remote,
        config.output.allow_public_repository,
        config.output.allow_unknown_visibility,
    );
    tracing::debug!(
        "destination visibility: {:?} ({})",
        decision.visibility.visibility,
        decision.visibility.detection.describe()
    );
    if !decision.allowed {
        return Err(AppError::PushBlocked {
            reason: decision
                .notice
                .unwrap_or_else(|| "push not allowed".to_string()),
        });
    }
    if let Some(notice) = &decision.notice {
        tracing::warn!("{notice}");
    }
    git::push(repo, &config.output.remote, &config.output.branch)
}

/// Appends a session's fresh messages to the journal, splitting them
/// across files by the date each message falls on in the configured
/// timezone. Bookkeeping advances per file as soon as that file is
/// written, so a failure partway through never double-writes on retry.
fn sync_one_session(
    cx: &CycleContext<'_>,
    state: &mut SyncState,
    item: &WorkItem,
    scope: &DateFilter,
    options: &SyncOptions,
) -> SessionOutcome {
    for err in &item.parsed.malformed {
        tracing::warn!("{err}");
    }
    let record_key = item.job.file.record_key();
    let slug = cx.slugs.slug(&item.job.identity.identity);

    let mut by_date: BTreeMap<NaiveDate, Vec<&Message>> = BTreeMap::new();
    for message in &item.parsed.messages {
        if !cx.filters.keeps(message) {
            continue;
        }
        let date = cx.tz.date_of(message.timestamp);
        if scope.contains(date) {
            by_date.entry(date).or_default().push(message);
        }
    }

    let existing: BTreeMap<String, usize> = state
        .records
        .get(&record_key)
        .map(|r| r.written.clone())
        .unwrap_or_default();

    let mut planned: Vec<FileWrite<'_>> = Vec::new();
    for (date, messages) in &by_date {
        let path = resolve_output_path(
            &cx.config.output.repository,
            cx.config.output.structure,
            slug,
            *date,
        );
        let key = path
            .strip_prefix(&cx.config.output.repository)
            .unwrap_or(&path)
            .display()
            .to_string();
        let already = existing.get(&key).copied().unwrap_or(0);
        if messages.len() < already {
            tracing::warn!(
                "session {} shrank below what {} already holds; keeping existing content",
                item.job.file.short_id(),
                path.display()
            );
            continue;
        }
        let fresh = messages[already..].to_vec();
        if fresh.is_empty() {
            continue;
        }
        planned.push(FileWrite {
            path,
            key,
            date: *date,
            fresh,
            new_total: messages.len(),
        });
    }

    if planned.is_empty() {
        if !options.dry_run && scope.is_unrestricted() {
            let record = state.records.entry(record_key).or_default();
            record.fingerprint = item.job.fingerprint.clone();
            record.synced_at = Some(Utc::now());
        }
        return SessionOutcome::SkippedUnchanged;
    }

    if options.dry_run {
        return SessionOutcome::Synced {
            messages: planned.iter().map(|w| w.fresh.len()).sum(),
            files: planned.into_iter().map(|w| w.path).collect(),
        };
    }

    let mut written_files = Vec::new();
    let mut messages_written = 0;
    for write in &planned {
        if let Err(e) = append_block(cx, item, write) {
            // Counts for the files already written above are recorded,
            // so the retry next cycle resumes exactly here.
            return SessionOutcome::SkippedError {
                reason: e.to_string(),
            };
        }
        let record = state.records.entry(record_key.clone()).or_default();
        record.written.insert(write.key.clone(), write.new_total);
        written_files.push(write.path.clone());
        messages_written += write.fresh.len();
    }

    let record = state.records.entry(record_key).or_default();
    // A restricted run leaves the fingerprint alone: dates outside the
    // range have not been synced yet, and a matching fingerprint would
    // hide them forever.
    if scope.is_unrestricted() {
        record.fingerprint = item.job.fingerprint.clone();
    }
    record.synced_at = Some(Utc::now());
    tracing::debug!(
        "session {}: {} message(s) -> {} file(s)",
        item.job.file.short_id(),
        messages_written,
        written_files.len()
    );
    SessionOutcome::Synced {
        files: written_files,
        messages: messages_written,
    }
}

/// Appends one `## Session:` block, creating the file (with its
/// header) on first touch.
fn append_block(cx: &CycleContext<'_>, item: &WorkItem, write: &FileWrite<'_>) -> Result<(), AppError> {
    if let Some(parent) = write.path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io(format!("creating {}", parent.display()), e))?;
    }
    let mut content = if write.path.exists() {
        "\n".to_string()
    } else {
        file_header(&item.job.display, write.date)
    };
    content.push_str(&session_block(
        item.job.file.short_id(),
        &item.job.identity,
        &write.fresh,
        cx.tz,
    ));
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&write.path)
        .map_err(|e| AppError::io(format!("opening {}", write.path.display()), e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| AppError::io(format!("appending to {}", write.path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Structure;

    fn test_config(root: &Path) -> Config {
        let mut config = Config::default();
        config.output.repository = root.join("journal");
        config.output.structure = Structure::Project;
        config.output.auto_push = false;
        config.state_dir = root.join("state");
        config.projects_dir = root.join("projects");
        fs::create_dir_all(&config.output.repository).unwrap();
        fs::create_dir_all(&config.projects_dir).unwrap();
        config
    }

    fn record(role: &str, ts: &str, text: &str) -> String {
        serde_json::json!({
            "type": role,
            "timestamp": ts,
            "message": { "content": text },
        })
        .to_string()
    }

    fn write_session(config: &Config, dir: &str, session: &str, lines: &[String]) -> PathBuf {
        let project = config.projects_dir.join(dir);
        fs::create_dir_all(&project).unwrap();
        let path = project.join(format!("{session}.jsonl"));
        fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    fn no_git() -> SyncOptions {
        SyncOptions {
            dry_run: false,
            force: false,
            commit: false,
            push: false,
        }
    }

    fn run(config: &Config, options: &SyncOptions) -> SyncReport {
        run_sync_cycle(
            config,
            &DateFilter::default(),
            options,
            &AtomicBool::new(false),
        )
        .unwrap()
    }

    #[test]
    fn full_cycle_writes_project_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config
            .projects
            .aliases
            .insert("/work/acme".to_string(), "acme".to_string());
        write_session(
            &config,
            "-work-acme",
            "11112222-session",
            &[
                record("user", "2026-01-15T10:00:00Z", "alpha question"),
                record("assistant", "2026-01-15T10:00:30Z", "beta answer"),
            ],
        );

        let report = run(&config, &no_git());
        assert_eq!(report.synced(), 1);
        assert!(!report.committed);

        let file = config.output.repository.join("acme").join("2026-01-15.md");
        let content = fs::read_to_string(&file).unwrap();
        assert!(content.starts_with("# acme - 2026-01-15\n"));
        assert!(content.contains("## Session: 11112222 (10:00 - 10:00)"));
        assert!(content.contains("alpha question"));
        assert!(content.contains("beta answer"));

        let state = SyncState::load(&config.state_file());
        let rec = &state.records["-work-acme/11112222-session"];
        assert!(!rec.fingerprint.is_empty());
        assert_eq!(rec.written["acme/2026-01-15.md"], 2);
    }

    #[test]
    fn second_cycle_skips_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_session(
            &config,
            "-work-acme",
            "s1",
            &[record("user", "2026-01-15T10:00:00Z", "alpha")],
        );

        run(&config, &no_git());
        let slug_dir = fs::read_dir(&config.output.repository)
            .unwrap()
            .flatten()
            .next()
            .unwrap()
            .path();
        let file = slug_dir.join("2026-01-15.md");
        let before = fs::read_to_string(&file).unwrap();

        let report = run(&config, &no_git());
        assert_eq!(report.skipped_unchanged(), 1);
        assert_eq!(report.synced(), 0);
        assert_eq!(fs::read_to_string(&file).unwrap(), before);
    }

    #[test]
    fn matching_fingerprint_short_circuits_without_reparse() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let log = write_session(
            &config,
            "-work-acme",
            "s1",
            &[record("user", "2026-01-15T10:00:00Z", "alpha")],
        );
        run(&config, &no_git());

        // Swap in different content but record its fingerprint as
        // already synced. If selection re-parsed the file, "omega"
        // would land in the journal.
        fs::write(&log, record("user", "2026-01-15T10:30:00Z", "omega")).unwrap();
        let mut state = SyncState::load(&config.state_file());
        state.records.get_mut("-work-acme/s1").unwrap().fingerprint =
            fingerprint_file(&log).unwrap();
        state.save(&config.state_file()).unwrap();

        let report = run(&config, &no_git());
        assert_eq!(report.skipped_unchanged(), 1);
        let slug_dir = config.output.repository.join("_local-acme");
        let content = fs::read_to_string(slug_dir.join("2026-01-15.md")).unwrap();
        assert!(content.contains("alpha"));
        assert!(!content.contains("omega"), "{content}");
    }

    #[test]
    fn same_stem_sessions_keep_separate_records() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_session(
            &config,
            "-work-acme",
            "s1",
            &[record("user", "2026-01-15T10:00:00Z", "acme note")],
        );
        write_session(
            &config,
            "-work-beta",
            "s1",
            &[record("user", "2026-01-15T11:00:00Z", "beta note")],
        );

        let report = run(&config, &no_git());
        assert_eq!(report.synced(), 2);
        let state = SyncState::load(&config.state_file());
        assert!(state.records.contains_key("-work-acme/s1"), "{:?}", state.records.keys());
        assert!(state.records.contains_key("-work-beta/s1"), "{:?}", state.records.keys());

        // Shared bookkeeping would thrash the fingerprint and re-append.
        let report = run(&config, &no_git());
        assert_eq!(report.skipped_unchanged(), 2);
        let acme = config.output.repository.join("_local-acme/2026-01-15.md");
        let content = fs::read_to_string(&acme).unwrap();
        assert_eq!(content.matches("acme note").count(), 1, "{content}");
    }

    #[test]
    fn grown_session_appends_only_new_messages() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let log = write_session(
            &config,
            "-work-acme",
            "s1",
            &[
                record("user", "2026-01-15T10:00:00Z", "alpha"),
                record("assistant", "2026-01-15T10:00:30Z", "beta"),
            ],
        );
        run(&config, &no_git());

        let mut lines = fs::read_to_string(&log).unwrap();
        lines.push('\n');
        lines.push_str(&record("user", "2026-01-15T11:00:00Z", "gamma"));
        fs::write(&log, lines).unwrap();
        let report = run(&config, &no_git());
        assert_eq!(report.synced(), 1);

        let slug_dir = fs::read_dir(&config.output.repository)
            .unwrap()
            .flatten()
            .next()
            .unwrap()
            .path();
        let content = fs::read_to_string(slug_dir.join("2026-01-15.md")).unwrap();
        assert_eq!(content.matches("alpha").count(), 1, "{content}");
        assert_eq!(content.matches("gamma").count(), 1, "{content}");
        assert_eq!(content.matches("## Session: s1").count(), 2, "{content}");
        assert_eq!(content.matches("### ").count(), 3, "{content}");
    }

    #[test]
    fn messages_split_across_dates() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_session(
            &config,
            "-work-acme",
            "s1",
            &[
                record("user", "2026-01-15T23:59:00Z", "late"),
                record("assistant", "2026-01-16T00:01:00Z", "early"),
            ],
        );

        let report = run(&config, &no_git());
        assert_eq!(report.synced(), 1);
        let SessionOutcome::Synced { files, messages } = &report.sessions[0].outcome else {
            panic!("expected synced outcome");
        };
        assert_eq!(*messages, 2);
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("2026-01-15.md"));
        assert!(files[1].ends_with("2026-01-16.md"));
        assert!(fs::read_to_string(&files[0]).unwrap().contains("late"));
        assert!(fs::read_to_string(&files[1]).unwrap().contains("early"));
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_session(
            &config,
            "-work-acme",
            "s1",
            &[record("user", "2026-01-15T10:00:00Z", "alpha")],
        );

        let options = SyncOptions {
            dry_run: true,
            ..no_git()
        };
        let report = run(&config, &options);
        assert!(report.dry_run);
        assert_eq!(report.synced(), 1);
        let SessionOutcome::Synced { files, .. } = &report.sessions[0].outcome else {
            panic!("expected synced outcome");
        };
        assert!(!files[0].exists());
        assert!(!config.state_file().exists());
    }

    #[test]
    fn undecodable_project_reported_alongside_good_one() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_session(
            &config,
            "no-leading-dash",
            "bad",
            &[record("user", "2026-01-15T10:00:00Z", "x")],
        );
        write_session(
            &config,
            "-work-acme",
            "good",
            &[record("user", "2026-01-15T10:00:00Z", "fine")],
        );

        let report = run(&config, &no_git());
        assert_eq!(report.synced(), 1);
        assert_eq!(report.skipped_error(), 1);
        let error_row = report
            .sessions
            .iter()
            .find(|s| matches!(s.outcome, SessionOutcome::SkippedError { .. }))
            .unwrap();
        let SessionOutcome::SkippedError { reason } = &error_row.outcome else {
            unreachable!()
        };
        assert!(reason.contains("no-leading-dash"), "{reason}");
    }

    #[test]
    fn malformed_line_does_not_lose_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_session(
            &config,
            "-work-acme",
            "s1",
            &[
                record("user", "2026-01-15T10:00:00Z", "first"),
                "{broken json".to_string(),
                record("assistant", "2026-01-15T10:01:00Z", "second"),
            ],
        );

        let report = run(&config, &no_git());
        assert_eq!(report.synced(), 1);
        let slug_dir = fs::read_dir(&config.output.repository)
            .unwrap()
            .flatten()
            .next()
            .unwrap()
            .path();
        let content = fs::read_to_string(slug_dir.join("2026-01-15.md")).unwrap();
        assert!(content.contains("first"));
        assert!(content.contains("second"));
    }

    #[test]
    fn force_does_not_duplicate_content() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_session(
            &config,
            "-work-acme",
            "s1",
            &[record("user", "2026-01-15T10:00:00Z", "alpha")],
        );
        run(&config, &no_git());

        let options = SyncOptions {
            force: true,
            ..no_git()
        };
        let report = run(&config, &options);
        assert_eq!(report.skipped_unchanged(), 1);

        let slug_dir = fs::read_dir(&config.output.repository)
            .unwrap()
            .flatten()
            .next()
            .unwrap()
            .path();
        let content = fs::read_to_string(slug_dir.join("2026-01-15.md")).unwrap();
        assert_eq!(content.matches("alpha").count(), 1);
    }

    #[test]
    fn cancel_before_start_processes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_session(
            &config,
            "-work-acme",
            "s1",
            &[record("user", "2026-01-15T10:00:00Z", "alpha")],
        );

        let report = run_sync_cycle(
            &config,
            &DateFilter::default(),
            &no_git(),
            &AtomicBool::new(true),
        )
        .unwrap();
        assert!(report.sessions.is_empty());
        let entries: Vec<_> = fs::read_dir(&config.output.repository)
            .unwrap()
            .flatten()
            .collect();
        assert!(entries.is_empty(), "nothing should be written: {entries:?}");
    }

    #[test]
    fn restricted_scope_keeps_fingerprint_open() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_session(
            &config,
            "-work-acme",
            "s1",
            &[
                record("user", "2026-01-15T10:00:00Z", "day one"),
                record("user", "2026-01-16T10:00:00Z", "day two"),
            ],
        );

        let scope = DateFilter::from_args(Some("2026-01-15"), None, None).unwrap();
        let report =
            run_sync_cycle(&config, &scope, &no_git(), &AtomicBool::new(false)).unwrap();
        assert_eq!(report.synced(), 1);
        let state = SyncState::load(&config.state_file());
        assert!(state.records["-work-acme/s1"].fingerprint.is_empty());

        // The unrestricted run picks up the day left out, then seals
        // the fingerprint.
        let report = run(&config, &no_git());
        assert_eq!(report.synced(), 1);
        let SessionOutcome::Synced { files, .. } = &report.sessions[0].outcome else {
            panic!("expected synced outcome");
        };
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("2026-01-16.md"));
        let state = SyncState::load(&config.state_file());
        assert!(!state.records["-work-acme/s1"].fingerprint.is_empty());

        let report = run(&config, &no_git());
        assert_eq!(report.skipped_unchanged(), 1);

        let slug_dir = config.output.repository.join("_local-acme");
        let day_one = fs::read_to_string(slug_dir.join("2026-01-15.md")).unwrap();
        assert_eq!(day_one.matches("day one").count(), 1);
    }
}
