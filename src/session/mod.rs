//! Discovery, identity resolution, and parsing of Claude Code session logs.

pub(crate) mod discover;
pub(crate) mod identity;
pub(crate) mod parser;

pub(crate) use discover::{SessionFile, find_session_files};
pub(crate) use identity::{ProjectIdentity, resolve_project_identity};
pub(crate) use parser::{Message, ParsedSession, parse_session_file};
