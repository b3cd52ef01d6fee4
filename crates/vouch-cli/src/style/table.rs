//! Report tables using comfy-table.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use vouch_types::{DataTypeState, SubmissionReport};

fn header(columns: &[&str]) -> Vec<Cell> {
    columns
        .iter()
        .map(|column| {
            if super::no_color() {
                Cell::new(column)
            } else {
                Cell::new(column).add_attribute(Attribute::Bold).fg(Color::Cyan)
            }
        })
        .collect()
}

fn state_cell(state: DataTypeState) -> Cell {
    let cell = Cell::new(state);
    if super::no_color() {
        return cell;
    }
    match state {
        DataTypeState::Valid => cell.fg(Color::Green),
        DataTypeState::Invalid => cell.fg(Color::Red),
        _ => cell,
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// One row per data type: its state and error total.
pub fn data_type_table(report: &SubmissionReport) -> Table {
    let mut table = new_table();
    table.set_header(header(&["Data type", "State", "Errors"]));
    for (data_type, entry) in &report.data_types {
        table.add_row(vec![
            Cell::new(data_type),
            state_cell(entry.state),
            Cell::new(entry.error_count()),
        ]);
    }
    table
}

/// One row per file and error type; `None` when there are no errors.
pub fn error_table(report: &SubmissionReport) -> Option<Table> {
    let mut table = new_table();
    table.set_header(header(&["File", "Error", "Count"]));

    let mut rows = 0;
    for entry in report.data_types.values() {
        for (file, errors) in &entry.file_errors {
            for (error_type, count) in errors {
                table.add_row(vec![
                    Cell::new(file),
                    Cell::new(error_type),
                    Cell::new(count),
                ]);
                rows += 1;
            }
        }
    }
    (rows > 0).then_some(table)
}
