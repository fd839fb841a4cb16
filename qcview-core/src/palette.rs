//! Visual-attribute assignment: colours and marker shapes
//!
//! Global invariants enforced:
//! - Assignment depends only on the order of the input values
//! - The i-th value and the (i + len)-th value share a property
//! - A palette is never empty

use crate::table::{Table, TableError};
use anyhow::Result;
use std::collections::{BTreeMap, HashSet};

/// Default colour cycle
pub const COLOURS: &[&str] = &[
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b",
];

/// Colour forced onto highlighted rows
pub const HIGHLIGHT_COLOUR: &str = "#f51ae5";

/// Marker symbols that take every fill variant
const FILLED_SYMBOLS: &[&str] = &[
    "circle",
    "square",
    "diamond",
    "cross",
    "x",
    "triangle-up",
    "triangle-down",
    "triangle-left",
    "triangle-right",
    "triangle-ne",
    "triangle-se",
    "triangle-sw",
    "triangle-nw",
    "pentagon",
    "hexagon",
    "hexagon2",
    "octagon",
    "star",
    "hexagram",
    "star-triangle-up",
    "star-triangle-down",
    "star-square",
    "star-diamond",
    "diamond-tall",
    "diamond-wide",
    "hourglass",
    "bowtie",
    "circle-cross",
    "circle-x",
    "square-cross",
    "square-x",
    "diamond-cross",
    "diamond-x",
    "hash",
];

/// Stroke-only symbols, no dot variants
const LINE_SYMBOLS: &[&str] = &[
    "cross-thin",
    "x-thin",
    "asterisk",
    "y-up",
    "y-down",
    "y-left",
    "y-right",
    "line-ew",
    "line-ns",
    "line-ne",
    "line-nw",
    "arrow-up",
    "arrow-down",
    "arrow-left",
    "arrow-right",
    "arrow-bar-up",
    "arrow-bar-down",
    "arrow-bar-left",
    "arrow-bar-right",
];

/// Symbols whose dotted form stays legible at default marker size
const DOTTED_CURATED: &[&str] = &[
    "circle",
    "square",
    "diamond",
    "triangle-up",
    "triangle-down",
    "pentagon",
    "hexagon",
    "octagon",
    "star",
    "hexagram",
    "hourglass",
    "bowtie",
];

/// Ordered, non-empty, cyclic list of visual properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<String>,
}

impl Palette {
    pub fn new<S: Into<String>>(entries: impl IntoIterator<Item = S>) -> Result<Self> {
        let entries: Vec<String> = entries.into_iter().map(Into::into).collect();
        if entries.is_empty() {
            anyhow::bail!("palette must contain at least one entry");
        }
        Ok(Palette { entries })
    }

    /// The six-colour default cycle
    pub fn colours() -> Self {
        Palette::from_static(COLOURS)
    }

    /// Every marker symbol with its open/dot/open-dot variants
    pub fn shapes_full() -> Self {
        let mut entries = Vec::new();
        for suffix in ["", "-open", "-dot", "-open-dot"] {
            entries.extend(FILLED_SYMBOLS.iter().map(|s| format!("{}{}", s, suffix)));
        }
        for suffix in ["", "-open"] {
            entries.extend(LINE_SYMBOLS.iter().map(|s| format!("{}{}", s, suffix)));
        }
        Palette { entries }
    }

    /// Filled and open forms of the area symbols plus a handful of dotted ones
    pub fn shapes_curated() -> Self {
        let mut entries: Vec<String> = FILLED_SYMBOLS.iter().map(|s| s.to_string()).collect();
        entries.extend(FILLED_SYMBOLS.iter().map(|s| format!("{}-open", s)));
        entries.extend(DOTTED_CURATED.iter().map(|s| format!("{}-dot", s)));
        Palette { entries }
    }

    fn from_static(entries: &[&str]) -> Self {
        Palette {
            entries: entries.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Property handed to values outside the assigned universe
    pub fn first(&self) -> &str {
        &self.entries[0]
    }

    /// Endless iterator over the palette, wrapping at the end
    pub fn cycle(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str).cycle()
    }

    /// Pair each value with the next property of the cycle
    ///
    /// `values` must already be de-duplicated and in the order stability is
    /// wanted in; see [`domain_universe`].
    pub fn assign<S: AsRef<str>>(&self, values: &[S]) -> Assignment {
        let mapping = values
            .iter()
            .zip(self.cycle())
            .map(|(v, p)| (v.as_ref().to_string(), p.to_string()))
            .collect();
        Assignment {
            mapping,
            fallback: self.first().to_string(),
        }
    }
}

/// Value -> property mapping produced by [`Palette::assign`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    mapping: BTreeMap<String, String>,
    fallback: String,
}

impl Assignment {
    pub fn get(&self, value: &str) -> Option<&str> {
        self.mapping.get(value).map(String::as_str)
    }

    /// Property for `value`, or the palette's first entry when unassigned
    pub fn get_or_fallback(&self, value: &str) -> &str {
        self.get(value).unwrap_or(&self.fallback)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.mapping.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Distinct non-missing values of `column`, sorted case-insensitively
///
/// Values equal ignoring case keep their first-seen order.
pub fn domain_universe(table: &Table, column: &str) -> Result<Vec<String>, TableError> {
    let mut seen = HashSet::new();
    let mut values: Vec<String> = table
        .column_values(column)?
        .into_iter()
        .filter(|v| !v.is_missing())
        .map(|v| v.to_string())
        .filter(|s| seen.insert(s.clone()))
        .collect();
    values.sort_by_key(|s| s.to_lowercase());
    Ok(values)
}
