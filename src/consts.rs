/// Standard date format used throughout the codebase: "2026-01-15"
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// Replacement text for content matched by a masking rule
pub(crate) const MASK_PLACEHOLDER: &str = "[REDACTED]";

/// Fallback value when a session ID or project name is unavailable
pub(crate) const UNKNOWN: &str = "unknown";
