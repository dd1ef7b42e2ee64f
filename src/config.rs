use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::utils::Timezone;

/// Layout of the destination repository.
///
/// `date` groups files as `YYYY/MM/DD/<project>.md`, `project` groups
/// them as `<project>/YYYY-MM-DD.md`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Structure {
    Date,
    Project,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct OutputConfig {
    /// Destination git repository the journal is written into.
    pub(crate) repository: PathBuf,
    pub(crate) structure: Structure,
    pub(crate) remote: String,
    pub(crate) branch: String,
    pub(crate) auto_push: bool,
    /// Allow pushing when the destination is a public GitHub repository.
    pub(crate) allow_public_repository: bool,
    /// Allow pushing when visibility could not be determined.
    pub(crate) allow_unknown_visibility: bool,
    pub(crate) timezone: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            repository: default_repository(),
            structure: Structure::Date,
            remote: "origin".to_string(),
            branch: "main".to_string(),
            auto_push: true,
            allow_public_repository: false,
            allow_unknown_visibility: false,
            timezone: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct SyncConfig {
    /// Seconds between daemon sync cycles.
    pub(crate) interval: u64,
    pub(crate) exclude_system: bool,
    pub(crate) exclude_tool_messages: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            interval: 300,
            exclude_system: true,
            exclude_tool_messages: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ProjectsConfig {
    /// Decoded project path -> display name used in slugs and headers.
    pub(crate) aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    pub(crate) output: OutputConfig,
    pub(crate) sync: SyncConfig,
    pub(crate) projects: ProjectsConfig,

    /// Where state.json, daemon.pid, and lock directories live.
    /// Not part of the config file; overridable in tests.
    #[serde(skip, default = "default_state_dir")]
    pub(crate) state_dir: PathBuf,

    /// Root of the Claude Code session logs.
    #[serde(skip, default = "default_projects_dir")]
    pub(crate) projects_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            output: OutputConfig::default(),
            sync: SyncConfig::default(),
            projects: ProjectsConfig::default(),
            state_dir: default_state_dir(),
            projects_dir: default_projects_dir(),
        }
    }
}

impl Config {
    /// Load configuration, preferring an explicit `--config` path over
    /// the standard candidate locations. A missing explicit path or an
    /// unparsable file is fatal; no candidate present means defaults.
    pub(crate) fn load(explicit: Option<&Path>) -> Result<Self, AppError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(AppError::Configuration {
                    reason: format!("config file not found: {}", path.display()),
                });
            }
            return Self::load_file(path);
        }
        for path in Self::candidate_paths() {
            if path.exists() {
                return Self::load_file(&path);
            }
        }
        let mut config = Self::default();
        config.finalize()?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self, AppError> {
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::io(format!("reading {}", path.display()), e))?;
        let mut config: Config = toml::from_str(&content).map_err(|e| AppError::Configuration {
            reason: format!("failed to parse {}: {e}", path.display()),
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        config.finalize()?;
        Ok(config)
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. XDG config: ~/.config/ccsync/config.toml (Linux/cross-platform)
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("ccsync").join("config.toml"));
        }

        // 2. Platform config dir, e.g. ~/Library/Application Support/ccsync/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            let platform_path = config_dir.join("ccsync").join("config.toml");
            if !paths.contains(&platform_path) {
                paths.push(platform_path);
            }
        }

        // 3. Home directory: ~/.ccsync.toml
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".ccsync.toml"));
        }

        paths
    }

    /// Expand "~" in the repository path and reject settings that can
    /// never produce a working sync.
    fn finalize(&mut self) -> Result<(), AppError> {
        self.output.repository = expand_tilde(&self.output.repository);
        if self.sync.interval == 0 {
            return Err(AppError::Configuration {
                reason: "sync.interval must be at least 1 second".to_string(),
            });
        }
        if self.output.remote.trim().is_empty() || self.output.branch.trim().is_empty() {
            return Err(AppError::Configuration {
                reason: "output.remote and output.branch must not be empty".to_string(),
            });
        }
        // Fail early on a bad timezone instead of at the first cycle.
        Timezone::parse(self.output.timezone.as_deref())?;
        Ok(())
    }

    pub(crate) fn timezone(&self) -> Result<Timezone, AppError> {
        Timezone::parse(self.output.timezone.as_deref())
    }

    pub(crate) fn state_file(&self) -> PathBuf {
        self.state_dir.join("state.json")
    }

    pub(crate) fn pid_file(&self) -> PathBuf {
        self.state_dir.join("daemon.pid")
    }

    pub(crate) fn log_file(&self) -> PathBuf {
        self.state_dir.join("daemon.log")
    }

    pub(crate) fn locks_dir(&self) -> PathBuf {
        self.state_dir.join("locks")
    }
}

pub(crate) fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_repository() -> PathBuf {
    home_dir().join("Documents").join("claude-logs")
}

fn default_state_dir() -> PathBuf {
    home_dir().join(".config").join("ccsync")
}

fn default_projects_dir() -> PathBuf {
    home_dir().join(".claude").join("projects")
}

fn expand_tilde(path: &Path) -> PathBuf {
    let Some(s) = path.to_str() else {
        return path.to_path_buf();
    };
    if s == "~" {
        return home_dir();
    }
    if let Some(rest) = s.strip_prefix("~/") {
        return home_dir().join(rest);
    }
    path.to_path_buf()
}
