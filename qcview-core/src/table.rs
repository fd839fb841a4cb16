//! In-memory metrics tables
//!
//! Global invariants enforced:
//! - Every row has exactly one cell per column
//! - Column order is insertion order and never changes implicitly
//! - Filtering and selection build new tables; the source is left untouched

use crate::value::Value;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

/// Column lookup and shape errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),
    #[error("row has {got} cells but table has {expected} columns")]
    RowWidth { expected: usize, got: usize },
    #[error("column has {got} cells but table has {expected} rows")]
    ColumnLength { expected: usize, got: usize },
}

/// Ordered rows sharing one column set
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,
}

/// Borrowed view of one row
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    table: &'a Table,
    cells: &'a [Value],
}

impl<'a> RowRef<'a> {
    /// Cell for a column name
    pub fn get(&self, column: &str) -> Result<&'a Value, TableError> {
        let idx = self.table.column_index(column)?;
        Ok(&self.cells[idx])
    }

    /// Cell by position
    pub fn at(&self, idx: usize) -> &'a Value {
        &self.cells[idx]
    }

    pub fn cells(&self) -> &'a [Value] {
        self.cells
    }
}

impl Table {
    /// Create an empty table with the given columns
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Result<Self, TableError> {
        let mut table = Table::default();
        for column in columns {
            let column = column.into();
            if table.index.contains_key(&column) {
                return Err(TableError::DuplicateColumn(column));
            }
            table.index.insert(column.clone(), table.columns.len());
            table.columns.push(column);
        }
        Ok(table)
    }

    /// Same columns, zero rows
    pub fn empty_like(&self) -> Table {
        Table {
            columns: self.columns.clone(),
            index: self.index.clone(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    pub fn column_index(&self, column: &str) -> Result<usize, TableError> {
        self.index
            .get(column)
            .copied()
            .ok_or_else(|| TableError::UnknownColumn(column.to_string()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<RowRef<'_>> {
        self.rows.get(idx).map(|cells| RowRef {
            table: self,
            cells: cells.as_slice(),
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows.iter().map(move |cells| RowRef {
            table: self,
            cells: cells.as_slice(),
        })
    }

    /// Cell at (row, column)
    pub fn get(&self, row: usize, column: &str) -> Result<Option<&Value>, TableError> {
        let idx = self.column_index(column)?;
        Ok(self.rows.get(row).map(|cells| &cells[idx]))
    }

    /// All cells of one column, in row order
    pub fn column_values(&self, column: &str) -> Result<Vec<&Value>, TableError> {
        let idx = self.column_index(column)?;
        Ok(self.rows.iter().map(|cells| &cells[idx]).collect())
    }

    /// Distinct non-missing values of a column in first-seen order
    pub fn distinct(&self, column: &str) -> Result<Vec<Value>, TableError> {
        let idx = self.column_index(column)?;
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for cells in &self.rows {
            let value = &cells[idx];
            if !value.is_missing() && seen.insert(value.clone()) {
                out.push(value.clone());
            }
        }
        Ok(out)
    }

    /// New table holding the rows accepted by `keep`
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(RowRef<'_>) -> bool,
    {
        let mut out = self.empty_like();
        out.rows = self
            .rows
            .iter()
            .filter(|cells| {
                keep(RowRef {
                    table: self,
                    cells: cells.as_slice(),
                })
            })
            .cloned()
            .collect();
        out
    }

    /// New table holding rows whose `column` value is a member of `allowed`
    ///
    /// A cell matches an allowed value equal to it or rendering the same, so
    /// `"0042"` selects a cell read as text and `"42"` one read as a number.
    /// Missing cells only match when the set contains [`Value::Null`].
    pub fn retain_in(&self, column: &str, allowed: &BTreeSet<Value>) -> Result<Table, TableError> {
        let idx = self.column_index(column)?;
        let rendered: HashSet<String> = allowed
            .iter()
            .filter(|v| !v.is_missing())
            .map(|v| v.to_string())
            .collect();
        Ok(self.filter_rows(|row| {
            let value = row.at(idx);
            allowed.contains(value)
                || (!value.is_missing() && rendered.contains(&value.to_string()))
        }))
    }

    /// New table holding rows whose `column` rendering is in `allowed`
    pub fn retain_rendered_in(
        &self,
        column: &str,
        allowed: &HashSet<String>,
    ) -> Result<Table, TableError> {
        let idx = self.column_index(column)?;
        Ok(self.filter_rows(|row| {
            let value = row.at(idx);
            !value.is_missing() && allowed.contains(&value.to_string())
        }))
    }

    /// Stable ascending sort by the given columns in priority order, missing last
    pub fn sort_by_columns(&mut self, columns: &[&str]) -> Result<(), TableError> {
        let indices = columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<Result<Vec<_>, _>>()?;
        self.rows.sort_by(|a, b| {
            indices
                .iter()
                .map(|&i| a[i].cmp(&b[i]))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(())
    }

    /// Replace a column's cells, appending the column if it does not exist
    pub fn set_column(&mut self, column: &str, values: Vec<Value>) -> Result<(), TableError> {
        if values.len() != self.rows.len() {
            return Err(TableError::ColumnLength {
                expected: self.rows.len(),
                got: values.len(),
            });
        }
        match self.index.get(column).copied() {
            Some(idx) => {
                for (cells, value) in self.rows.iter_mut().zip(values) {
                    cells[idx] = value;
                }
            }
            None => {
                self.index.insert(column.to_string(), self.columns.len());
                self.columns.push(column.to_string());
                for (cells, value) in self.rows.iter_mut().zip(values) {
                    cells.push(value);
                }
            }
        }
        Ok(())
    }

    /// New table with only the given columns, in the given order
    pub fn select(&self, columns: &[&str]) -> Result<Table, TableError> {
        let indices = columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<Result<Vec<_>, _>>()?;
        let mut out = Table::new(columns.iter().copied())?;
        out.rows = self
            .rows
            .iter()
            .map(|cells| indices.iter().map(|&i| cells[i].clone()).collect())
            .collect();
        Ok(out)
    }
}

struct RecordSer<'a> {
    columns: &'a [String],
    cells: &'a [Value],
}

impl Serialize for RecordSer<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.cells) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Serialized as an array of records, keys in column order
impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for cells in &self.rows {
            seq.serialize_element(&RecordSer {
                columns: &self.columns,
                cells,
            })?;
        }
        seq.end()
    }
}

#[cfg(test)]
pub(crate) fn table_from(columns: &[&str], rows: Vec<Vec<Value>>) -> Table {
    let mut table = Table::new(columns.iter().copied()).unwrap();
    for row in rows {
        table.push_row(row).unwrap();
    }
    table
}
