//! Filter selections, date windows and highlight sets
//!
//! Global invariants enforced:
//! - An empty dimension means "no restriction"; all dimensions empty means
//!   "nothing selected"
//! - Missing cells never satisfy a membership test unless null is selected
//! - Run validity is computed once per window, never per row

use crate::schema::Dimension;
use crate::table::{Table, TableError};
use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Requested run window; either bound may be left open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateRange {
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        DateRange { start, end }
    }

    /// Inclusive window bounds
    ///
    /// An open start falls back to `earliest`, an open end to `now`. A closed
    /// end covers the whole of its day.
    pub fn bounds(
        &self,
        earliest: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let start = match self.start {
            Some(d) => d.and_time(NaiveTime::MIN),
            None => earliest?,
        };
        let end = match self.end {
            Some(d) => d
                .succ_opt()
                .and_then(|next| {
                    next.and_time(NaiveTime::MIN)
                        .checked_sub_signed(chrono::Duration::nanoseconds(1))
                })
                .unwrap_or(NaiveDateTime::MAX),
            None => now,
        };
        Some((start, end))
    }

    /// True when either bound was given
    pub fn is_set(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

/// Identifiers whose rows get the highlight colour and enlarged markers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightSet(BTreeSet<String>);

impl HighlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split free text on commas and whitespace
    pub fn parse(text: &str) -> Self {
        HighlightSet(
            text.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.0.insert(id.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for HighlightSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        HighlightSet(iter.into_iter().map(Into::into).collect())
    }
}

/// Allowed values per dimension, a date window and a highlight set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSpec {
    #[serde(default)]
    pub dimensions: BTreeMap<Dimension, BTreeSet<Value>>,
    #[serde(default)]
    pub date_range: DateRange,
    #[serde(default)]
    pub highlight: HighlightSet,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add allowed values for a dimension
    pub fn allow<V: Into<Value>>(
        mut self,
        dimension: Dimension,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.dimensions
            .entry(dimension)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = range;
        self
    }

    pub fn with_highlight(mut self, highlight: HighlightSet) -> Self {
        self.highlight = highlight;
        self
    }

    /// Allowed set for a dimension, `None` when unrestricted
    pub fn allowed(&self, dimension: Dimension) -> Option<&BTreeSet<Value>> {
        self.dimensions.get(&dimension).filter(|s| !s.is_empty())
    }

    /// True when no dimension has a selection
    pub fn is_empty_selection(&self) -> bool {
        self.dimensions.values().all(BTreeSet::is_empty)
    }
}

/// Start and completion of one sequencing run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunDates {
    pub start: Option<NaiveDateTime>,
    pub completion: Option<NaiveDateTime>,
}

/// Run name -> run dates, from the run registry cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRegistry {
    runs: BTreeMap<String, RunDates>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, run: impl Into<String>, dates: RunDates) {
        self.runs.insert(run.into(), dates);
    }

    /// Build from a registry table; rows without a run name are skipped
    pub fn from_table(
        table: &Table,
        run_column: &str,
        start_column: &str,
        completion_column: &str,
    ) -> Result<Self, TableError> {
        let run_idx = table.column_index(run_column)?;
        let start_idx = table.column_index(start_column)?;
        let completion_idx = table.column_index(completion_column)?;

        let mut registry = RunRegistry::new();
        for row in table.rows() {
            let run = row.at(run_idx);
            if run.is_missing() {
                continue;
            }
            registry.insert(
                run.to_string(),
                RunDates {
                    start: row.at(start_idx).as_date(),
                    completion: row.at(completion_idx).as_date(),
                },
            );
        }
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn earliest_start(&self) -> Option<NaiveDateTime> {
        self.runs.values().filter_map(|r| r.start).min()
    }

    /// Runs that both started and completed inside the window
    ///
    /// Runs with no completion date are still in flight and never valid.
    pub fn valid_runs(&self, range: &DateRange, now: NaiveDateTime) -> HashSet<String> {
        let Some((lo, hi)) = range.bounds(self.earliest_start(), now) else {
            return HashSet::new();
        };
        self.runs
            .iter()
            .filter(|(_, dates)| match (dates.start, dates.completion) {
                (Some(start), Some(done)) => lo <= start && start <= hi && lo <= done && done <= hi,
                _ => false,
            })
            .map(|(run, _)| run.clone())
            .collect()
    }
}
