//! Plain-text and JSON rendering of query results for headless mode.
//!
//! Tables are drawn with box-drawing borders and auto-sized columns.

use crate::cli::OutputFormat;
use crate::error::{ExploreError, Result};
use crate::query::QueryData;
use crate::result::{rows_from_table, RowSet};

/// Maximum width for any column.
const MAX_COLUMN_WIDTH: usize = 40;

/// Minimum width for any column.
const MIN_COLUMN_WIDTH: usize = 4;

/// Renders connector output in the requested format.
pub fn render(data: &QueryData, format: OutputFormat) -> Result<String> {
    match (data, format) {
        (QueryData::None, OutputFormat::Text) => Ok("OK".to_string()),
        (QueryData::None, OutputFormat::Json) => Ok("null".to_string()),
        (QueryData::Rows(rows), OutputFormat::Text) => Ok(render_table(rows)),
        (QueryData::Rows(rows), OutputFormat::Json) => to_json(rows),
        (QueryData::Arrow(table), OutputFormat::Text) => table.pretty(),
        (QueryData::Arrow(table), OutputFormat::Json) => to_json(&rows_from_table(table)?),
    }
}

fn to_json(rows: &RowSet) -> Result<String> {
    rows.to_json()
        .map_err(|e| ExploreError::internal(format!("Failed to serialize rows: {e}")))
}

/// Renders rows as a bordered text table followed by a row count.
pub fn render_table(rows: &RowSet) -> String {
    if rows.columns.is_empty() {
        return "(empty result)".to_string();
    }

    let widths = column_widths(rows);
    let mut lines = vec![
        border(&widths, '┌', '┬', '┐'),
        cells(rows.columns.iter().map(String::as_str), &widths),
        border(&widths, '├', '┼', '┤'),
    ];
    for row in rows {
        let values: Vec<String> = row.values().iter().map(|v| v.to_display_string()).collect();
        lines.push(cells(values.iter().map(String::as_str), &widths));
    }
    lines.push(border(&widths, '└', '┴', '┘'));
    lines.push(format!(
        "{} row{}",
        rows.len(),
        if rows.len() == 1 { "" } else { "s" }
    ));

    lines.join("\n")
}

fn column_widths(rows: &RowSet) -> Vec<usize> {
    let mut widths: Vec<usize> = rows
        .columns
        .iter()
        .map(|name| name.chars().count().max(MIN_COLUMN_WIDTH))
        .collect();

    for row in rows {
        for (width, value) in widths.iter_mut().zip(row.values()) {
            *width = (*width).max(value.to_display_string().chars().count());
        }
    }

    widths.into_iter().map(|w| w.min(MAX_COLUMN_WIDTH)).collect()
}

fn border(widths: &[usize], left: char, mid: char, right: char) -> String {
    let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    format!("{left}{}{right}", segments.join(&mid.to_string()))
}

fn cells<'a>(values: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let mut line = String::from("│");
    for (value, &width) in values.zip(widths) {
        line.push_str(&format!(" {:width$} │", truncate(value, width)));
    }
    line
}

/// Truncates to `max_width` characters, adding an ellipsis if needed.
fn truncate(s: &str, max_width: usize) -> String {
    if s.chars().count() <= max_width {
        s.to_string()
    } else if max_width <= 3 {
        s.chars().take(max_width).collect()
    } else {
        let head: String = s.chars().take(max_width - 3).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{Row, Value};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn sample_rows() -> RowSet {
        let columns: Arc<[String]> = vec!["Year".to_string(), "Complaints".to_string()].into();
        RowSet {
            columns: columns.to_vec(),
            rows: vec![
                Row::new(columns.clone(), vec![Value::Int(2021), Value::Int(5)]),
                Row::new(columns, vec![Value::Int(2022), Value::Int(9)]),
            ],
        }
    }

    #[test]
    fn test_render_table() {
        let expected = "\
┌──────┬────────────┐
│ Year │ Complaints │
├──────┼────────────┤
│ 2021 │ 5          │
│ 2022 │ 9          │
└──────┴────────────┘
2 rows";
        assert_eq!(render_table(&sample_rows()), expected);
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_table(&RowSet::new()), "(empty result)");
    }

    #[test]
    fn test_render_json() {
        let json = render(&QueryData::Rows(sample_rows()), OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!([
                {"Year": 2021, "Complaints": 5},
                {"Year": 2022, "Complaints": 9}
            ])
        );
    }

    #[test]
    fn test_render_exec() {
        assert_eq!(render(&QueryData::None, OutputFormat::Text).unwrap(), "OK");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
    }
}
