//! Console formatting for CLI commands

use chrono::{DateTime, Local, Utc};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, CellAlignment, Color, ContentArrangement, Table};
use hashdex::Difference;

const SIZE_UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

/// Binary-prefixed size with one decimal, e.g. `1536` -> `1.5 KB`
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < SIZE_UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", SIZE_UNITS[unit])
}

/// Modification time in local time
pub fn format_timestamp(modified: DateTime<Utc>) -> String {
    modified
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Suffix listing how a related file differs, e.g. " (larger, older)"
pub fn format_differences(diffs: &[Difference]) -> String {
    if diffs.is_empty() {
        return String::new();
    }
    let labels: Vec<String> = diffs.iter().map(ToString::to_string).collect();
    format!(" ({})", labels.join(", "))
}

/// Print rows under a cyan header. The first column holds counts and is
/// right-aligned.
pub fn print_table<const N: usize>(headers: [&str; N], rows: impl IntoIterator<Item = [String; N]>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.map(|h| Cell::new(h).fg(Color::Cyan)));
    for row in rows {
        table.add_row(row);
    }
    if let Some(counts) = table.column_mut(0) {
        counts.set_cell_alignment(CellAlignment::Right);
    }

    println!("{table}");
}
