//! Streaming parser for Claude Code JSONL session logs.
//!
//! Each line is one JSON record. Only `user` and `assistant` records
//! become messages; a record that fails to decode is collected as
//! malformed and skipped, never aborting the session.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::consts::UNKNOWN;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    User,
    Assistant,
}

impl Role {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Message {
    pub(crate) role: Role,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) content: String,
}

#[derive(Debug, Default)]
pub(crate) struct ParsedSession {
    /// Messages in file order.
    pub(crate) messages: Vec<Message>,
    /// Records that could not be decoded, in file order.
    pub(crate) malformed: Vec<AppError>,
}

#[derive(Debug, Deserialize)]
struct LogRecord {
    #[serde(rename = "type")]
    kind: Option<String>,
    timestamp: Option<String>,
    message: Option<LogMessage>,
}

#[derive(Debug, Deserialize)]
struct LogMessage {
    content: Option<ContentField>,
}

/// `message.content` is either a plain string, a list of typed parts,
/// or (rarely) a single part object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentField {
    Text(String),
    Parts(Vec<ContentPart>),
    Part(ContentPart),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentPart {
    Typed {
        #[serde(rename = "type")]
        kind: Option<String>,
        text: Option<String>,
        name: Option<String>,
    },
    Text(String),
}

pub(crate) fn parse_session_file(path: &Path) -> Result<ParsedSession, AppError> {
    let file =
        File::open(path).map_err(|e| AppError::io(format!("opening {}", path.display()), e))?;
    let reader = BufReader::new(file);
    let mut session = ParsedSession::default();

    for (index, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                session
                    .malformed
                    .push(malformed(path, index + 1, e.to_string()));
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LogRecord>(&line) {
            Ok(record) => match message_from_record(record) {
                Ok(Some(message)) => session.messages.push(message),
                Ok(None) => {}
                Err(reason) => session.malformed.push(malformed(path, index + 1, reason)),
            },
            Err(e) => session
                .malformed
                .push(malformed(path, index + 1, e.to_string())),
        }
    }
    Ok(session)
}

fn malformed(path: &Path, line: usize, reason: String) -> AppError {
    AppError::MalformedLog {
        path: path.display().to_string(),
        line,
        reason,
    }
}

fn message_from_record(record: LogRecord) -> Result<Option<Message>, String> {
    let role = match record.kind.as_deref() {
        Some("user") => Role::User,
        Some("assistant") => Role::Assistant,
        // Summary, hook, and other record kinds are not conversation.
        _ => return Ok(None),
    };
    let Some(raw) = record.timestamp else {
        return Err("missing timestamp".to_string());
    };
    let timestamp = raw
        .parse::<DateTime<Utc>>()
        .map_err(|e| format!("bad timestamp {raw:?}: {e}"))?;
    let content = record
        .message
        .and_then(|m| m.content)
        .map(|c| extract_text(&c))
        .unwrap_or_default();
    Ok(Some(Message {
        role,
        timestamp,
        content,
    }))
}

fn extract_text(content: &ContentField) -> String {
    match content {
        ContentField::Text(s) => s.clone(),
        ContentField::Part(part) => part_text(part).unwrap_or_default(),
        ContentField::Parts(parts) => {
            let pieces: Vec<String> = parts.iter().filter_map(part_text).collect();
            pieces.join("\n")
        }
    }
}

fn part_text(part: &ContentPart) -> Option<String> {
    match part {
        ContentPart::Text(s) => Some(s.clone()),
        ContentPart::Typed { kind, text, name } => match kind.as_deref() {
            Some("text") => Some(text.clone().unwrap_or_default()),
            Some("tool_use") => Some(format!("[Tool: {}]", name.as_deref().unwrap_or(UNKNOWN))),
            Some("tool_result") => Some("[Tool Result]".to_string()),
            _ => None,
        },
    }
}

/// Markers of injected system content (reminders, local command
/// wrappers) that should not reach the journal.
const SYSTEM_MARKERS: &[&str] = &[
    "<system-reminder>",
    "</system-reminder>",
    "<local-command-",
    "</local-command-",
    "<command-name>",
    "Caveat: The messages below were generated",
];

pub(crate) fn is_system_message(content: &str) -> bool {
    SYSTEM_MARKERS.iter().any(|marker| content.contains(marker))
}

/// True when every non-empty line is tool activity, i.e. the message
/// carries no prose.
pub(crate) fn is_tool_only(content: &str) -> bool {
    let mut saw_any = false;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        saw_any = true;
        if !(line.starts_with("[Tool:") || line == "[Tool Result]") {
            return false;
        }
    }
    saw_any
}
