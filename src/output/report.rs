//! Terminal rendering of sync reports and journal listings.

use comfy_table::{
    Attribute, Cell, Color, ContentArrangement, Table, TableComponent,
    modifiers::UTF8_SOLID_INNER_BORDERS, presets::UTF8_FULL,
};
use std::io::IsTerminal;

use crate::sync::{SessionOutcome, SyncReport};

fn header_cell(text: &str, use_color: bool) -> Cell {
    let mut cell = Cell::new(text).add_attribute(Attribute::Bold);
    if use_color {
        cell = cell.fg(Color::Cyan);
    }
    cell
}

/// Replace the double-line header separator (╞═╪═╡) with single-line (├─┼─┤)
fn normalize_header_separator(table: &mut Table) {
    table.set_style(TableComponent::HeaderLines, '─');
    table.set_style(TableComponent::LeftHeaderIntersection, '├');
    table.set_style(TableComponent::MiddleHeaderIntersections, '┼');
    table.set_style(TableComponent::RightHeaderIntersection, '┤');
}

fn create_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    normalize_header_separator(&mut table);
    table
}

fn use_color() -> bool {
    std::io::stdout().is_terminal()
}

pub(crate) fn print_report(report: &SyncReport, json: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(out) => println!("{out}"),
            Err(e) => eprintln!("Error: failed to serialize report: {e}"),
        }
        return;
    }
    if report.sessions.is_empty() {
        println!("No sessions found.");
        return;
    }
    let color = use_color();
    let mut table = create_styled_table();
    table.set_header(vec![
        header_cell("Session", color),
        header_cell("Project", color),
        header_cell("Outcome", color),
        header_cell("Detail", color),
    ]);
    for session in &report.sessions {
        let (label, detail, tone) = describe(&session.outcome);
        let outcome_cell = if color {
            Cell::new(label).fg(tone)
        } else {
            Cell::new(label)
        };
        table.add_row(vec![
            Cell::new(&session.session),
            Cell::new(&session.project),
            outcome_cell,
            Cell::new(detail),
        ]);
    }
    println!("{table}");

    let mut line = report.summary_line();
    if report.dry_run {
        line.push_str(" (dry run)");
    } else if report.pushed {
        line.push_str(" | pushed");
    } else if report.committed {
        line.push_str(" | committed");
    }
    println!("\n  {line}\n");
}

fn describe(outcome: &SessionOutcome) -> (&'static str, String, Color) {
    match outcome {
        SessionOutcome::Synced { files, messages } => (
            "synced",
            format!("{messages} message(s) -> {} file(s)", files.len()),
            Color::Green,
        ),
        SessionOutcome::SkippedUnchanged => ("unchanged", String::new(), Color::Grey),
        SessionOutcome::SkippedError { reason } => ("error", reason.clone(), Color::Red),
        SessionOutcome::PushBlocked { reason } => ("push-blocked", reason.clone(), Color::Yellow),
    }
}

/// `entries` pairs a repository-relative path with its mtime, newest
/// first.
pub(crate) fn print_file_list(entries: &[(String, String)], json: bool) {
    if json {
        let items: Vec<serde_json::Value> = entries
            .iter()
            .map(|(file, modified)| serde_json::json!({"file": file, "modified": modified}))
            .collect();
        match serde_json::to_string_pretty(&items) {
            Ok(out) => println!("{out}"),
            Err(e) => eprintln!("Error: failed to serialize listing: {e}"),
        }
        return;
    }
    if entries.is_empty() {
        println!("No journal files yet.");
        return;
    }
    let color = use_color();
    let mut table = create_styled_table();
    table.set_header(vec![
        header_cell("File", color),
        header_cell("Modified", color),
    ]);
    for (file, modified) in entries {
        table.add_row(vec![Cell::new(file), Cell::new(modified)]);
    }
    println!("{table}");
}
