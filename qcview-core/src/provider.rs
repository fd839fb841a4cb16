//! Cached metrics tables read from a directory of CSV files.
//!
//! Each `name.csv` (plain) or `name.csv.zst` (zstd-compressed) file becomes
//! the table `name`. Nothing is read until [`CacheProvider::load`] is called;
//! [`CacheProvider::refresh`] re-reads the directory from scratch.
//!
//! Global invariants enforced:
//! - Tables are keyed and listed by name, so load order never shows
//! - A table is either fully parsed or absent; partial reads are never kept

use crate::palette::domain_universe;
use crate::table::{Table, TableError};
use crate::value::{CellKind, Value};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::{Path, PathBuf};

const CSV_SUFFIX: &str = ".csv";
const ZST_SUFFIX: &str = ".csv.zst";

/// Source of named metrics tables
pub trait DataProvider {
    /// Table by name
    fn table(&self, name: &str) -> Result<&Table>;

    /// Distinct non-missing values of one column, sorted case-insensitively
    fn unique_set(&self, name: &str, column: &str) -> Result<Vec<String>> {
        let table = self.table(name)?;
        domain_universe(table, column)
            .with_context(|| format!("cannot list values of table {}", name))
    }
}

/// Directory-backed table cache
#[derive(Debug, Clone)]
pub struct CacheProvider {
    dir: PathBuf,
    tables: Option<BTreeMap<String, Table>>,
}

impl CacheProvider {
    /// Point at a cache directory without reading it
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            anyhow::bail!("cache directory does not exist: {}", dir.display());
        }
        Ok(CacheProvider { dir, tables: None })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_loaded(&self) -> bool {
        self.tables.is_some()
    }

    /// Read every cache file once; later calls are no-ops
    ///
    /// Returns the number of tables available.
    pub fn load(&mut self) -> Result<usize> {
        if let Some(ref tables) = self.tables {
            return Ok(tables.len());
        }
        self.refresh()
    }

    /// Re-read the directory, replacing whatever was loaded before
    pub fn refresh(&mut self) -> Result<usize> {
        let files = cache_files(&self.dir)?;
        log::debug!("reading {} cache files from {}", files.len(), self.dir.display());

        let parsed: Vec<(String, PathBuf, Result<Table>)> = files
            .into_par_iter()
            .map(|(name, path)| {
                let table = read_table(&path);
                (name, path, table)
            })
            .collect();

        let mut tables = BTreeMap::new();
        for (name, path, table) in parsed {
            match table {
                Ok(table) => {
                    log::debug!("loaded table {} ({} rows)", name, table.len());
                    tables.insert(name, table);
                }
                Err(e) => log::warn!("skipping cache file {}: {:#}", path.display(), e),
            }
        }

        let count = tables.len();
        self.tables = Some(tables);
        Ok(count)
    }

    /// Loaded table names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.tables
            .iter()
            .flat_map(|t| t.keys())
            .map(String::as_str)
            .collect()
    }
}

impl DataProvider for CacheProvider {
    fn table(&self, name: &str) -> Result<&Table> {
        let Some(ref tables) = self.tables else {
            anyhow::bail!("cache {} has not been loaded", self.dir.display());
        };
        tables.get(name).with_context(|| {
            format!(
                "no table named {} in {} (available: {})",
                name,
                self.dir.display(),
                self.names().join(", ")
            )
        })
    }
}

/// Cache files in `dir` as (table name, path), sorted by name
///
/// A name present both plain and compressed is an error.
fn cache_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read cache directory: {}", dir.display()))?;

    let mut files: BTreeMap<String, PathBuf> = BTreeMap::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(table_name)
        else {
            continue;
        };
        if let Some(previous) = files.insert(name.to_string(), path.clone()) {
            anyhow::bail!(
                "table {} is cached twice: {} and {}",
                name,
                previous.display(),
                path.display()
            );
        }
    }
    Ok(files.into_iter().collect())
}

fn table_name(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(ZST_SUFFIX)
        .or_else(|| file_name.strip_suffix(CSV_SUFFIX))
        .filter(|n| !n.is_empty())
}

/// Read one cache file, decompressing `.csv.zst`
pub fn read_table(path: &Path) -> Result<Table> {
    let raw = std::fs::read(path)
        .with_context(|| format!("failed to read cache file: {}", path.display()))?;
    let is_compressed = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(ZST_SUFFIX));

    let bytes = if is_compressed {
        zstd::decode_all(raw.as_slice())
            .with_context(|| format!("failed to decompress cache file: {}", path.display()))?
    } else {
        raw
    };
    parse_csv(bytes.as_slice()).with_context(|| format!("failed to parse {}", path.display()))
}

/// Parse CSV text with a header row into a table
///
/// Each column gets one type: numbers or dates only when every non-missing
/// cell parses as one, text otherwise.
pub fn parse_csv<R: Read>(reader: R) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers().context("failed to read CSV header")?.clone();
    let mut table = Table::new(headers.iter())?;

    let mut records = Vec::new();
    for (i, record) in reader.records().enumerate() {
        // line 1 is the header
        let record = record.with_context(|| format!("malformed CSV record on line {}", i + 2))?;
        records.push(record);
    }

    let kinds: Vec<CellKind> = (0..headers.len())
        .map(|col| {
            let cells: Vec<&str> = records.iter().map(|r| r.get(col).unwrap_or("")).collect();
            CellKind::infer(&cells)
        })
        .collect();

    for record in &records {
        table.push_row(record.iter().zip(&kinds).map(|(c, k)| k.parse(c)).collect())?;
    }
    Ok(table)
}

/// Inner join on `keys`, which must exist in both tables
///
/// Output columns are the left columns followed by the right's non-key
/// columns. Rows keep left order, then right order within one key. A row whose
/// key has a missing cell never matches. Keys compare by their rendered text.
pub fn join(left: &Table, right: &Table, keys: &[&str]) -> Result<Table, TableError> {
    let left_keys = indices(left, keys)?;
    let right_keys = indices(right, keys)?;

    let key_set: HashSet<&str> = keys.iter().copied().collect();
    let carried: Vec<usize> = right
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| !key_set.contains(c.as_str()))
        .map(|(i, _)| i)
        .collect();

    let columns = left
        .columns()
        .iter()
        .chain(carried.iter().map(|&i| &right.columns()[i]))
        .cloned();
    let mut out = Table::new(columns)?;

    let mut lookup: BTreeMap<Vec<String>, Vec<usize>> = BTreeMap::new();
    for (pos, row) in right.rows().enumerate() {
        if let Some(key) = key_of(row.cells(), &right_keys) {
            lookup.entry(key).or_default().push(pos);
        }
    }

    for row in left.rows() {
        let Some(key) = key_of(row.cells(), &left_keys) else {
            continue;
        };
        let Some(matches) = lookup.get(&key) else {
            continue;
        };
        for &pos in matches {
            if let Some(other) = right.row(pos) {
                let mut cells = row.cells().to_vec();
                cells.extend(carried.iter().map(|&i| other.at(i).clone()));
                out.push_row(cells)?;
            }
        }
    }
    Ok(out)
}

fn indices(table: &Table, columns: &[&str]) -> Result<Vec<usize>, TableError> {
    columns.iter().map(|c| table.column_index(c)).collect()
}

/// Rendered key cells, so a key typed as a number on one side still matches
/// the same text on the other
fn key_of(cells: &[Value], idx: &[usize]) -> Option<Vec<String>> {
    if idx.iter().any(|&i| cells[i].is_missing()) {
        return None;
    }
    Some(idx.iter().map(|&i| cells[i].to_string()).collect())
}
