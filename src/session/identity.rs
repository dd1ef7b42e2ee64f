use std::path::{Path, PathBuf};

use crate::consts::UNKNOWN;
use crate::error::AppError;
use crate::git;

/// How a project is identified in the journal, independent of where
/// its checkout happens to live.
#[derive(Debug, Clone)]
pub(crate) struct ProjectIdentity {
    /// Absolute path decoded from the session directory name.
    pub(crate) decoded_path: PathBuf,
    /// Stable identity string: the normalized remote URL when the
    /// checkout has one, otherwise `_local-<dirname>`.
    pub(crate) identity: String,
    /// Current branch of the checkout, when available.
    pub(crate) branch: Option<String>,
}

/// Decode a session directory name back into the absolute project path.
///
/// Claude Code encodes `/Users/me/work` as `-Users-me-work`. The decode
/// grammar is strict: a leading `-` followed by non-empty components.
/// Consecutive dashes (produced by dotted directory names) are rejected
/// because the encoding is ambiguous there and a guessed path would be
/// silently wrong.
pub(crate) fn decode_path_identifier(encoded: &str) -> Result<PathBuf, AppError> {
    let bad = || AppError::Decode {
        encoded: encoded.to_string(),
    };
    let rest = encoded.strip_prefix('-').ok_or_else(bad)?;
    if rest.is_empty() {
        return Err(bad());
    }
    let mut path = PathBuf::from("/");
    for component in rest.split('-') {
        if component.is_empty() {
            return Err(bad());
        }
        path.push(component);
    }
    Ok(path)
}

/// Reduce the different spellings of one remote to a single
/// `host/path` form: ssh, scp-like, http(s), trailing `.git`, and
/// trailing slashes all normalize to the same string.
pub(crate) fn normalize_remote_url(url: &str) -> String {
    let trimmed = url.trim();
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    if let Some(rest) = trimmed.strip_prefix("ssh://git@") {
        return rest.to_string();
    }
    if let Some(rest) = trimmed.strip_prefix("git@") {
        if let Some((host, path)) = rest.split_once(':') {
            return format!("{host}/{path}");
        }
        return rest.to_string();
    }
    if let Some(rest) = trimmed.strip_prefix("https://") {
        return rest.to_string();
    }
    if let Some(rest) = trimmed.strip_prefix("http://") {
        return rest.to_string();
    }
    trimmed.to_string()
}

/// Resolve the identity for an encoded session directory. Decode
/// failures propagate; a missing checkout or a checkout without a
/// remote falls back to a local identity derived from the directory
/// name.
pub(crate) fn resolve_project_identity(encoded: &str) -> Result<ProjectIdentity, AppError> {
    let decoded_path = decode_path_identifier(encoded)?;
    let (identity, branch) = if decoded_path.is_dir() {
        let identity = match git::remote_url(&decoded_path, "origin") {
            Some(url) => normalize_remote_url(&url),
            None => local_identity(&decoded_path),
        };
        (identity, git::current_branch(&decoded_path))
    } else {
        (local_identity(&decoded_path), None)
    };
    Ok(ProjectIdentity {
        decoded_path,
        identity,
        branch,
    })
}

fn local_identity(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(UNKNOWN);
    format!("_local-{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_simple_path() {
        assert_eq!(
            decode_path_identifier("-Users-me-work").unwrap(),
            PathBuf::from("/Users/me/work")
        );
    }

    #[test]
    fn decode_single_component() {
        assert_eq!(decode_path_identifier("-tmp").unwrap(), PathBuf::from("/tmp"));
    }

    #[test]
    fn decode_rejects_missing_leading_dash() {
        assert!(decode_path_identifier("Users-me").is_err());
    }

    #[test]
    fn decode_rejects_empty_input() {
        assert!(decode_path_identifier("").is_err());
        assert!(decode_path_identifier("-").is_err());
    }

    #[test]
    fn decode_rejects_empty_components() {
        // "/Users/me/.config" encodes to "-Users-me--config"; the dot is
        // lost and the path cannot be recovered.
        assert!(decode_path_identifier("-Users-me--config").is_err());
        assert!(decode_path_identifier("-Users-me-").is_err());
    }

    #[test]
    fn decode_error_names_the_input() {
        let err = decode_path_identifier("bogus").unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn normalize_scp_form() {
        assert_eq!(
            normalize_remote_url("git@github.com:acme/widgets.git"),
            "github.com/acme/widgets"
        );
    }

    #[test]
    fn normalize_ssh_form() {
        assert_eq!(
            normalize_remote_url("ssh://git@github.com/acme/widgets.git"),
            "github.com/acme/widgets"
        );
    }

    #[test]
    fn normalize_https_forms() {
        assert_eq!(
            normalize_remote_url("https://github.com/acme/widgets"),
            "github.com/acme/widgets"
        );
        assert_eq!(
            normalize_remote_url("https://github.com/acme/widgets.git"),
            "github.com/acme/widgets"
        );
        assert_eq!(
            normalize_remote_url("http://gitlab.example.com/acme/widgets/"),
            "gitlab.example.com/acme/widgets"
        );
    }

    #[test]
    fn normalize_all_forms_agree() {
        let forms = [
            "git@github.com:acme/widgets.git",
            "ssh://git@github.com/acme/widgets",
            "https://github.com/acme/widgets.git",
            "https://github.com/acme/widgets/",
        ];
        for form in forms {
            assert_eq!(normalize_remote_url(form), "github.com/acme/widgets", "form: {form}");
        }
    }

    #[test]
    fn normalize_leaves_unrecognized_input_alone() {
        assert_eq!(normalize_remote_url("gitea.local/x/y"), "gitea.local/x/y");
    }

    #[test]
    fn missing_checkout_falls_back_to_local_identity() {
        let identity =
            resolve_project_identity("-definitely-missing-ccsync-test-dir").unwrap();
        assert_eq!(identity.identity, "_local-dir");
        assert_eq!(identity.branch, None);
        assert_eq!(
            identity.decoded_path,
            PathBuf::from("/definitely/missing/ccsync/test/dir")
        );
    }
}
