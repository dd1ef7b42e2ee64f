use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("Invalid date \"{input}\" (expected YYYYMMDD or YYYY-MM-DD)")]
    InvalidDate { input: String },

    #[error("Invalid timezone: {input}")]
    InvalidTimezone { input: String },

    #[error("Invalid session path identifier \"{encoded}\"")]
    Decode { encoded: String },

    #[error("Malformed record at {path}:{line}: {reason}")]
    MalformedLog {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("Push blocked: {reason}")]
    PushBlocked { reason: String },

    #[error("{reason}")]
    TransientSync { reason: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("{reason}")]
    Daemon { reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    /// True for errors that should not stop the daemon loop.
    pub(crate) fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::PushBlocked { .. } | AppError::TransientSync { .. } | AppError::Io { .. }
        )
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Io {
            context: context.into(),
            source,
        }
    }
}
