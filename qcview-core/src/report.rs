//! Text and JSON rendering of reshaped tables and cutoff reports
//!
//! Global invariants enforced:
//! - Deterministic output ordering
//! - Byte-for-byte identical output across runs

use crate::cutoff::CutoffReport;
use crate::table::Table;
use anyhow::{Context, Result};

/// Widest a text column is allowed to grow
const MAX_COLUMN_WIDTH: usize = 28;

/// Render a table as fixed-width text, one line per row
pub fn render_table_text(table: &Table) -> String {
    let headers: Vec<String> = table.columns().to_vec();
    let rows: Vec<Vec<String>> = table
        .rows()
        .map(|row| row.cells().iter().map(|v| v.to_string()).collect())
        .collect();
    render_grid(&headers, &rows)
}

/// Render a table as a pretty JSON array of records
pub fn render_table_json(table: &Table) -> Result<String> {
    serde_json::to_string_pretty(table).context("failed to serialize table")
}

/// Render the failure table under its display headers, then per-rule totals
pub fn render_cutoff_text(report: &CutoffReport) -> String {
    let mut output = String::new();

    if report.has_failures() {
        let headers: Vec<String> = report.columns.iter().map(|c| c.name.clone()).collect();
        let rows: Vec<Vec<String>> = report
            .failures
            .rows()
            .map(|row| row.cells().iter().map(|v| v.to_string()).collect())
            .collect();
        output.push_str(&render_grid(&headers, &rows));
        output.push('\n');
    } else {
        output.push_str("All rows passed every cutoff.\n\n");
    }

    output.push_str(&format!(
        "{:<width$} {:>8} {:>8}\n",
        "CUTOFF",
        "FAILED",
        "MISSING",
        width = MAX_COLUMN_WIDTH
    ));
    for summary in &report.summaries {
        output.push_str(&format!(
            "{} {:>8} {:>8}\n",
            truncate_or_pad(&summary.label, MAX_COLUMN_WIDTH),
            summary.failed,
            summary.missing
        ));
    }
    output.push_str(&format!(
        "{} of {} rows failed or are missing at least one metric\n",
        report.failure_count(),
        report.rows_evaluated
    ));
    output
}

/// Render a cutoff report as pretty JSON
pub fn render_cutoff_json(report: &CutoffReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize cutoff report")
}

fn render_grid(headers: &[String], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
                .min(MAX_COLUMN_WIDTH)
        })
        .collect();

    let mut output = String::new();
    output.push_str(&render_line(headers, &widths));
    for row in rows {
        output.push_str(&render_line(row, &widths));
    }
    output
}

fn render_line(cells: &[String], widths: &[usize]) -> String {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(c, &w)| truncate_or_pad(c, w))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{}\n", line.trim_end())
}

/// Truncate or pad string to fixed width
fn truncate_or_pad(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{:<width$}", s, width = width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cutoff::{evaluate, CutoffRule};
    use crate::table::table_from;
    use crate::value::Value;

    fn metrics() -> Table {
        table_from(
            &["sample_name", "reads"],
            vec![
                vec!["LIB1".into(), Value::Num(5.0)],
                vec!["LIB2".into(), Value::Null],
            ],
        )
    }

    #[test]
    fn test_truncate_or_pad() {
        assert_eq!(truncate_or_pad("abc", 5), "abc  ");
        assert_eq!(truncate_or_pad("abcdefgh", 6), "abc...");
        assert_eq!(truncate_or_pad("éééééé", 5), "éé...");
    }

    #[test]
    fn test_table_text() {
        let text = render_table_text(&metrics());
        assert_eq!(text, "sample_name reads\nLIB1        5\nLIB2\n");
    }

    #[test]
    fn test_table_json_uses_null_for_missing() {
        let json = render_table_json(&metrics()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["reads"], serde_json::json!(5.0));
        assert!(parsed[1]["reads"].is_null());
    }

    #[test]
    fn test_cutoff_text() {
        let rules = vec![CutoffRule::fail_below("Min Reads", "reads", Some(10.0))];
        let report = evaluate(&metrics(), &rules, &["sample_name".to_string()]).unwrap();
        let text = render_cutoff_text(&report);
        assert!(text.starts_with("sample_name Min Reads (10.000)\n"));
        assert!(text.contains("LIB1        Failed (5.000)\n"));
        assert!(text.contains("LIB2        Missing\n"));
        assert!(text.ends_with("2 of 2 rows failed or are missing at least one metric\n"));
    }

    #[test]
    fn test_cutoff_text_all_pass() {
        let rules = vec![CutoffRule::fail_below("Min Reads", "reads", Some(1.0))];
        let table = table_from(
            &["sample_name", "reads"],
            vec![vec!["LIB1".into(), Value::Num(5.0)]],
        );
        let report = evaluate(&table, &rules, &["sample_name".to_string()]).unwrap();
        assert!(render_cutoff_text(&report).starts_with("All rows passed every cutoff."));
    }

    #[test]
    fn test_cutoff_json() {
        let rules = vec![CutoffRule::fail_above("Max Reads", "reads", Some(1.0))];
        let report = evaluate(&metrics(), &rules, &["sample_name".to_string()]).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&render_cutoff_json(&report).unwrap()).unwrap();
        assert_eq!(parsed["rows_evaluated"], 2);
        assert_eq!(parsed["failures"][0]["Max Reads"], "Failed (5.000)");
        assert_eq!(parsed["columns"][1]["name"], "Max Reads (1.000)");
    }
}
