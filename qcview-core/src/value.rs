//! Scalar cells of a metrics table
//!
//! Global invariants enforced:
//! - Total ordering: numbers < dates < strings < null
//! - NaN is indistinguishable from null for every consumer

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Text written for dates when rendering or serializing
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cache spellings of a missing value
const MISSING_SPELLINGS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "None", "null", "NULL"];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// One cell of a [`crate::table::Table`]
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Num(f64),
    Str(String),
    Date(NaiveDateTime),
}

impl Value {
    /// Infer a typed value from the text of a single cache cell
    ///
    /// Whole columns should go through [`CellKind::infer`] instead, so one
    /// column never mixes numbers and text.
    pub fn parse_cell(raw: &str) -> Value {
        let text = raw.trim();
        if is_missing_text(text) {
            return Value::Null;
        }
        if let Some(n) = parse_number(text) {
            return Value::Num(n);
        }
        if let Some(date) = parse_date(text) {
            return Value::Date(date);
        }
        Value::Str(text.to_string())
    }

    /// True for null cells and NaN numbers
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Num(n) => n.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of the cell, `None` when missing or not a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(n) if !n.is_nan() => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        if self.is_missing() {
            return 3;
        }
        match self {
            Value::Num(_) => 0,
            Value::Date(_) => 1,
            Value::Str(_) => 2,
            Value::Null => 3,
        }
    }
}

/// Type shared by every non-missing cell of one column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Num,
    Date,
    Str,
}

impl CellKind {
    /// Narrowest kind every non-missing cell parses as; text otherwise
    pub fn infer(cells: &[&str]) -> CellKind {
        let present: Vec<&str> = cells
            .iter()
            .map(|c| c.trim())
            .filter(|c| !is_missing_text(c))
            .collect();
        if present.iter().all(|c| parse_number(c).is_some()) {
            CellKind::Num
        } else if present.iter().all(|c| parse_date(c).is_some()) {
            CellKind::Date
        } else {
            CellKind::Str
        }
    }

    /// Parse one cell of a column of this kind
    pub fn parse(self, raw: &str) -> Value {
        let text = raw.trim();
        if is_missing_text(text) {
            return Value::Null;
        }
        let parsed = match self {
            CellKind::Num => parse_number(text).map(Value::Num),
            CellKind::Date => parse_date(text).map(Value::Date),
            CellKind::Str => None,
        };
        parsed.unwrap_or_else(|| Value::Str(text.to_string()))
    }
}

fn is_missing_text(text: &str) -> bool {
    MISSING_SPELLINGS.contains(&text)
}

/// Finite number without a zero-padded integer part
///
/// "01" and "0042" are identifiers; reading them as numbers would lose the
/// padding when rendered.
fn parse_number(text: &str) -> Option<f64> {
    let digits = text.trim_start_matches(['+', '-']);
    let mut chars = digits.chars();
    if chars.next() == Some('0') && chars.next().is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    // "inf" and friends are names, not measurements
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_date(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            _ if self.rank() != other.rank() => self.rank().cmp(&other.rank()),
            (Value::Num(a), Value::Num(b)) => a.total_cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            // Both missing
            _ => Ordering::Equal,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            _ if self.is_missing() => Ok(()),
            Value::Num(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Null => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            _ if self.is_missing() => serializer.serialize_none(),
            Value::Num(n) => serializer.serialize_f64(*n),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Date(d) => serializer.collect_str(&d.format(DATE_FORMAT)),
            Value::Null => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Scalar {
            Num(f64),
            Str(String),
        }

        Ok(match Option::<Scalar>::deserialize(deserializer)? {
            None => Value::Null,
            Some(Scalar::Num(n)) => Value::Num(n),
            Some(Scalar::Str(s)) => Value::Str(s),
        })
    }
}
