//! Renders session messages into the journal's Markdown shape.
//!
//! Masking happens here, at the single point where conversation text
//! is turned into file content.

use chrono::NaiveDate;

use crate::config::SyncConfig;
use crate::consts::DATE_FORMAT;
use crate::mask::mask;
use crate::session::parser::{is_system_message, is_tool_only};
use crate::session::{Message, ProjectIdentity};
use crate::utils::Timezone;

#[derive(Debug, Clone, Copy)]
pub(crate) struct MessageFilters {
    pub(crate) exclude_system: bool,
    pub(crate) exclude_tool_messages: bool,
}

impl MessageFilters {
    pub(crate) fn from_config(sync: &SyncConfig) -> Self {
        MessageFilters {
            exclude_system: sync.exclude_system,
            exclude_tool_messages: sync.exclude_tool_messages,
        }
    }

    /// Whether a message belongs in the journal. Messages with no
    /// content at all never do.
    pub(crate) fn keeps(&self, message: &Message) -> bool {
        if message.content.trim().is_empty() {
            return false;
        }
        if self.exclude_system && is_system_message(&message.content) {
            return false;
        }
        if self.exclude_tool_messages && is_tool_only(&message.content) {
            return false;
        }
        true
    }
}

/// First lines of a fresh journal file.
pub(crate) fn file_header(display_name: &str, date: NaiveDate) -> String {
    format!("# {display_name} - {}\n\n", date.format(DATE_FORMAT))
}

/// One `## Session:` block. All `messages` must fall on the same
/// journal date; the sync engine splits sessions beforehand. Empty
/// input renders nothing.
pub(crate) fn session_block(
    short_id: &str,
    identity: &ProjectIdentity,
    messages: &[&Message],
    tz: Timezone,
) -> String {
    let (Some(first), Some(last)) = (messages.first(), messages.last()) else {
        return String::new();
    };
    let mut block = format!(
        "## Session: {short_id} ({} - {})\n",
        tz.to_fixed_offset(first.timestamp).format("%H:%M"),
        tz.to_fixed_offset(last.timestamp).format("%H:%M"),
    );
    if let Some(branch) = identity.branch.as_deref() {
        block.push_str(&format!("**Branch:** {branch} | "));
    }
    block.push_str(&format!("**Path:** {}\n\n", identity.decoded_path.display()));
    for message in messages {
        let time = tz.to_fixed_offset(message.timestamp).format("%H:%M:%S");
        block.push_str(&format!("### {time} {}\n\n", message.role.label()));
        block.push_str(mask(&message.content).trim_end());
        block.push_str("\n\n");
    }
    block.push_str("---\n");
    block
}
