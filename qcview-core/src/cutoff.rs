//! Pass/fail cutoff evaluation
//!
//! Global invariants enforced:
//! - Rules are applied in list order; results are deterministic
//! - A missing metric is a classification ("Missing"), never an error
//! - Only rows with at least one failed or missing rule reach the failure table
//! - Displayed numbers carry exactly three decimals

use crate::table::{RowRef, Table, TableError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Header text for a threshold that is absent or zero
pub const NO_VALID_CUTOFF: &str = "No valid cutoff given";

/// Direction in which a metric fails its threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Fails when the value is strictly below the threshold
    FailBelow,
    /// Fails when the value is strictly above the threshold
    FailAbove,
}

impl Comparison {
    pub fn fails(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::FailBelow => value < threshold,
            Comparison::FailAbove => value > threshold,
        }
    }
}

/// One (label, column, threshold, comparison) cutoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CutoffRule {
    pub label: String,
    pub column: String,
    /// `None` disables the rule: every row passes
    #[serde(default)]
    pub threshold: Option<f64>,
    pub comparison: Comparison,
}

impl CutoffRule {
    pub fn fail_below(label: &str, column: &str, threshold: Option<f64>) -> Self {
        CutoffRule {
            label: label.to_string(),
            column: column.to_string(),
            threshold,
            comparison: Comparison::FailBelow,
        }
    }

    pub fn fail_above(label: &str, column: &str, threshold: Option<f64>) -> Self {
        CutoffRule {
            label: label.to_string(),
            column: column.to_string(),
            threshold,
            comparison: Comparison::FailAbove,
        }
    }

    /// Column header: `"{label} ({threshold})"`
    pub fn header(&self) -> String {
        format!("{} ({})", self.label, threshold_display(self.threshold))
    }

    /// Classify one metric value against this rule
    pub fn classify(&self, value: Option<f64>) -> CutoffStatus {
        let Some(threshold) = self.threshold else {
            return CutoffStatus::Passed(value.unwrap_or(f64::NAN));
        };
        match value {
            None => CutoffStatus::Missing,
            Some(v) if self.comparison.fails(v, threshold) => CutoffStatus::Failed(v),
            Some(v) => CutoffStatus::Passed(v),
        }
    }
}

/// Threshold rendered with three decimals; absent or zero thresholds render as
/// [`NO_VALID_CUTOFF`]
pub fn threshold_display(threshold: Option<f64>) -> String {
    match threshold {
        Some(t) if t != 0.0 && !t.is_nan() => format!("{:.3}", t),
        _ => NO_VALID_CUTOFF.to_string(),
    }
}

/// Outcome of one rule on one row
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CutoffStatus {
    Passed(f64),
    Failed(f64),
    Missing,
}

impl CutoffStatus {
    /// Failed or missing
    pub fn is_problem(&self) -> bool {
        !matches!(self, CutoffStatus::Passed(_))
    }
}

impl fmt::Display for CutoffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CutoffStatus::Passed(v) => write!(f, "Passed ({:.3})", v),
            CutoffStatus::Failed(v) => write!(f, "Failed ({:.3})", v),
            CutoffStatus::Missing => f.write_str("Missing"),
        }
    }
}

/// Data-grid column: `id` addresses the failure table, `name` is shown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayColumn {
    pub id: String,
    pub name: String,
}

/// Per-rule failure counts over every evaluated row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSummary {
    pub label: String,
    pub failed: usize,
    pub missing: usize,
}

/// Failures-only table plus its display columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutoffReport {
    pub failures: Table,
    pub columns: Vec<DisplayColumn>,
    pub summaries: Vec<RuleSummary>,
    pub rows_evaluated: usize,
}

impl CutoffReport {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Rule outcomes for one row, in rule order
pub fn classify_row(
    row: RowRef<'_>,
    rules: &[CutoffRule],
) -> Result<Vec<CutoffStatus>, TableError> {
    rules
        .iter()
        .map(|rule| Ok(rule.classify(row.get(&rule.column)?.as_f64())))
        .collect()
}

/// Evaluate `rules` over every row of `table`
///
/// The failure table holds `identity_columns` followed by one status column per
/// rule, keyed by the rule label.
pub fn evaluate(
    table: &Table,
    rules: &[CutoffRule],
    identity_columns: &[String],
) -> Result<CutoffReport, TableError> {
    let identity_idx = identity_columns
        .iter()
        .map(|c| table.column_index(c))
        .collect::<Result<Vec<_>, _>>()?;
    for rule in rules {
        table.column_index(&rule.column)?;
    }

    let mut failures = Table::new(
        identity_columns
            .iter()
            .map(String::as_str)
            .chain(rules.iter().map(|r| r.label.as_str())),
    )?;
    let mut summaries: Vec<RuleSummary> = rules
        .iter()
        .map(|r| RuleSummary {
            label: r.label.clone(),
            failed: 0,
            missing: 0,
        })
        .collect();

    for row in table.rows() {
        let statuses = classify_row(row, rules)?;
        for (summary, status) in summaries.iter_mut().zip(&statuses) {
            match status {
                CutoffStatus::Failed(_) => summary.failed += 1,
                CutoffStatus::Missing => summary.missing += 1,
                CutoffStatus::Passed(_) => {}
            }
        }
        if !statuses.iter().any(CutoffStatus::is_problem) {
            continue;
        }

        let mut cells: Vec<_> = identity_idx.iter().map(|&i| row.at(i).clone()).collect();
        cells.extend(statuses.iter().map(|s| s.to_string().into()));
        failures.push_row(cells)?;
    }

    log::debug!(
        "cutoffs: {} of {} rows failed at least one of {} rules",
        failures.len(),
        table.len(),
        rules.len()
    );

    let columns = identity_columns
        .iter()
        .map(|c| DisplayColumn {
            id: c.clone(),
            name: c.clone(),
        })
        .chain(rules.iter().map(|r| DisplayColumn {
            id: r.label.clone(),
            name: r.header(),
        }))
        .collect();

    Ok(CutoffReport {
        failures,
        columns,
        summaries,
        rows_evaluated: table.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::table_from;
    use crate::value::Value;

    fn reads_table() -> Table {
        table_from(
            &["sample_name", "reads", "duplication"],
            vec![
                vec!["S1".into(), Value::Num(5.0), Value::Num(0.1)],
                vec!["S2".into(), Value::Num(10.0), Value::Num(0.2)],
                vec!["S3".into(), Value::Num(15.0), Value::Num(0.9)],
                vec!["S4".into(), Value::Num(f64::NAN), Value::Num(0.3)],
            ],
        )
    }

    fn identity() -> Vec<String> {
        vec!["sample_name".to_string()]
    }

    fn column(table: &Table, name: &str) -> Vec<String> {
        table
            .column_values(name)
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect()
    }

    #[test]
    fn test_min_reads_classification() {
        let rule = CutoffRule::fail_below("Min Reads", "reads", Some(10.0));
        let table = reads_table();
        let statuses: Vec<String> = table
            .rows()
            .map(|row| classify_row(row, std::slice::from_ref(&rule)).unwrap()[0].to_string())
            .collect();
        assert_eq!(
            statuses,
            vec!["Failed (5.000)", "Passed (10.000)", "Passed (15.000)", "Missing"]
        );

        let report = evaluate(&table, &[rule], &identity()).unwrap();
        assert_eq!(column(&report.failures, "sample_name"), vec!["S1", "S4"]);
        assert_eq!(
            column(&report.failures, "Min Reads"),
            vec!["Failed (5.000)", "Missing"]
        );
        assert_eq!(report.failure_count(), 2);
        assert_eq!(report.rows_evaluated, 4);
    }

    #[test]
    fn test_rows_passing_every_rule_are_dropped() {
        let rules = vec![
            CutoffRule::fail_below("Min Reads", "reads", Some(1.0)),
            CutoffRule::fail_above("Max Duplication", "duplication", Some(0.5)),
        ];
        let report = evaluate(&reads_table(), &rules, &identity()).unwrap();
        assert_eq!(column(&report.failures, "sample_name"), vec!["S3", "S4"]);
        assert_eq!(
            column(&report.failures, "Max Duplication"),
            vec!["Failed (0.900)", "Passed (0.300)"]
        );
        assert_eq!(
            report.summaries,
            vec![
                RuleSummary {
                    label: "Min Reads".to_string(),
                    failed: 0,
                    missing: 1
                },
                RuleSummary {
                    label: "Max Duplication".to_string(),
                    failed: 1,
                    missing: 0
                },
            ]
        );
    }

    #[test]
    fn test_disabled_rule_always_passes() {
        let rule = CutoffRule::fail_below("Min Reads", "reads", None);
        assert_eq!(rule.classify(Some(0.0)), CutoffStatus::Passed(0.0));
        assert!(!rule.classify(None).is_problem());
        let report = evaluate(&reads_table(), &[rule], &identity()).unwrap();
        assert!(!report.has_failures());
    }

    #[test]
    fn test_zero_threshold_still_evaluates() {
        let rule = CutoffRule::fail_above("Max Errors", "reads", Some(0.0));
        assert_eq!(rule.classify(Some(1.0)), CutoffStatus::Failed(1.0));
        assert_eq!(rule.header(), "Max Errors (No valid cutoff given)");
    }

    #[test]
    fn test_threshold_display() {
        assert_eq!(threshold_display(None), NO_VALID_CUTOFF);
        assert_eq!(threshold_display(Some(0.0)), NO_VALID_CUTOFF);
        assert_eq!(threshold_display(Some(12.3456)), "12.346");
        assert_eq!(threshold_display(Some(10.0)), "10.000");
    }

    #[test]
    fn test_display_columns_identity_first() {
        let rules = vec![
            CutoffRule::fail_below("Min Reads", "reads", Some(10.0)),
            CutoffRule::fail_above("Max Duplication", "duplication", None),
        ];
        let report = evaluate(&reads_table(), &rules, &identity()).unwrap();
        let names: Vec<&str> = report.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "sample_name",
                "Min Reads (10.000)",
                "Max Duplication (No valid cutoff given)"
            ]
        );
        let ids: Vec<&str> = report.columns.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["sample_name", "Min Reads", "Max Duplication"]);
    }

    #[test]
    fn test_non_numeric_cell_is_missing() {
        let table = table_from(&["sample_name", "reads"], vec![vec!["S1".into(), "n/a".into()]]);
        let rule = CutoffRule::fail_below("Min Reads", "reads", Some(1.0));
        let report = evaluate(&table, &[rule], &identity()).unwrap();
        assert_eq!(column(&report.failures, "Min Reads"), vec!["Missing"]);
    }

    #[test]
    fn test_unknown_rule_column() {
        let rule = CutoffRule::fail_below("Min Reads", "nope", Some(1.0));
        assert_eq!(
            evaluate(&reads_table(), &[rule], &identity()).unwrap_err(),
            TableError::UnknownColumn("nope".to_string())
        );
    }

    #[test]
    fn test_rule_from_json() {
        let rule: CutoffRule = serde_json::from_str(
            r#"{"label": "Min Reads", "column": "reads", "threshold": 10, "comparison": "fail_below"}"#,
        )
        .unwrap();
        assert_eq!(rule, CutoffRule::fail_below("Min Reads", "reads", Some(10.0)));
    }
}
