use glob::glob;
use std::path::{Path, PathBuf};

/// One session log on disk plus the names derived from its location.
#[derive(Debug, Clone)]
pub(crate) struct SessionFile {
    pub(crate) path: PathBuf,
    /// File stem, the Claude Code session UUID.
    pub(crate) session_id: String,
    /// Parent directory name, the encoded project path.
    pub(crate) encoded_dir: String,
}

impl SessionFile {
    /// Short form of the session UUID used in headers and reports.
    pub(crate) fn short_id(&self) -> &str {
        let end = self
            .session_id
            .char_indices()
            .nth(8)
            .map_or(self.session_id.len(), |(i, _)| i);
        &self.session_id[..end]
    }

    /// Key for this session's sync record. Includes the project
    /// directory so same-named logs in different projects never share
    /// a record.
    pub(crate) fn record_key(&self) -> String {
        format!("{}/{}", self.encoded_dir, self.session_id)
    }
}

/// Find session logs under `projects_root`, sorted by path so every
/// cycle processes them in the same order.
///
/// Layout: `<root>/<encoded-project-dir>/<session-uuid>.jsonl`
pub(crate) fn find_session_files(projects_root: &Path) -> Vec<SessionFile> {
    if !projects_root.is_dir() {
        return Vec::new();
    }
    let pattern = format!("{}/*/*.jsonl", projects_root.display());
    let mut files: Vec<SessionFile> = glob(&pattern)
        .map(|entries| entries.flatten().filter_map(session_file).collect())
        .unwrap_or_default();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

fn session_file(path: PathBuf) -> Option<SessionFile> {
    let session_id = path.file_stem()?.to_str()?.to_string();
    let encoded_dir = path.parent()?.file_name()?.to_str()?.to_string();
    Some(SessionFile {
        path,
        session_id,
        encoded_dir,
    })
}
