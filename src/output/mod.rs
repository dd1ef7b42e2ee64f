mod markdown;
mod path;
mod report;

pub(crate) use markdown::{MessageFilters, file_header, session_block};
pub(crate) use path::{SlugTable, resolve_output_path};
pub(crate) use report::{print_file_list, print_report};
