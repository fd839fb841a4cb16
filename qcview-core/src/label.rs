//! Hover labels built from a prioritized list of columns

use crate::schema::{
    BARCODES, DONOR, GROUP_ID, LANE, LIBRARY_DESIGN, MERGED_LIBRARY, PROJECT, RUN, SAMPLE,
    TISSUE_ORIGIN, TISSUE_TYPE,
};
use crate::table::{Table, TableError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separator between label parts
pub const LABEL_SEPARATOR: &str = "<br>";

/// Ordering and prefixes applied to label columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelScheme {
    /// Columns with a fixed position, first to last
    pub priority: Vec<String>,
    /// Human-readable prefix per column, e.g. `group_id` -> `Group ID: `
    pub prefixes: BTreeMap<String, String>,
}

impl Default for LabelScheme {
    fn default() -> Self {
        let priority = [
            MERGED_LIBRARY,
            SAMPLE,
            RUN,
            LANE,
            BARCODES,
            PROJECT,
            DONOR,
            GROUP_ID,
            TISSUE_TYPE,
            TISSUE_ORIGIN,
            LIBRARY_DESIGN,
        ];
        let prefixes = [
            (LANE, "Lane: "),
            (GROUP_ID, "Group ID: "),
            (TISSUE_TYPE, "Tissue Type: "),
            (TISSUE_ORIGIN, "Tissue Origin: "),
            (LIBRARY_DESIGN, "Library Design: "),
        ];
        LabelScheme {
            priority: priority.iter().map(|c| c.to_string()).collect(),
            prefixes: prefixes
                .iter()
                .map(|(c, p)| (c.to_string(), p.to_string()))
                .collect(),
        }
    }
}

impl LabelScheme {
    /// Requested columns in label order: prioritized ones by priority, the rest
    /// afterwards in the order they were requested
    pub fn order<'a>(&'a self, requested: &'a [String]) -> Vec<&'a str> {
        let mut ordered: Vec<&str> = self
            .priority
            .iter()
            .filter(|p| requested.contains(p))
            .map(String::as_str)
            .collect();
        for column in requested {
            if !self.priority.contains(column) && !ordered.contains(&column.as_str()) {
                ordered.push(column);
            }
        }
        ordered
    }
}

/// One label per row of `table`
///
/// Missing cells are left out of the label. With no columns requested every
/// label is the free text alone, or empty.
pub fn create_data_label(
    table: &Table,
    columns: Option<&[String]>,
    free_text: Option<&str>,
    scheme: &LabelScheme,
) -> Result<Vec<String>, TableError> {
    let requested = columns.unwrap_or(&[]);
    let ordered = scheme.order(requested);
    let indices = ordered
        .iter()
        .map(|c| table.column_index(c))
        .collect::<Result<Vec<_>, _>>()?;

    let labels = table
        .rows()
        .map(|row| {
            let mut parts: Vec<String> = ordered
                .iter()
                .zip(&indices)
                .filter(|(_, idx)| !row.at(**idx).is_missing())
                .map(|(column, &idx)| {
                    let prefix = scheme.prefixes.get(*column).map_or("", String::as_str);
                    format!("{}{}", prefix, row.at(idx))
                })
                .collect();
            if let Some(text) = free_text.filter(|t| !t.is_empty()) {
                parts.push(text.to_string());
            }
            parts.join(LABEL_SEPARATOR)
        })
        .collect();
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::table_from;
    use crate::value::Value;

    fn sample() -> Table {
        table_from(
            &[SAMPLE, GROUP_ID, "reads", RUN],
            vec![
                vec!["LIB1".into(), "G1".into(), Value::Num(5.0), "RUN_A".into()],
                vec!["LIB2".into(), Value::Null, Value::Num(7.0), "RUN_B".into()],
            ],
        )
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_priority_then_requested_order() {
        let scheme = LabelScheme::default();
        let requested = cols(&["reads", GROUP_ID, RUN, SAMPLE]);
        assert_eq!(scheme.order(&requested), vec![SAMPLE, RUN, GROUP_ID, "reads"]);
    }

    #[test]
    fn test_labels_with_prefix_and_free_text() {
        let requested = cols(&["reads", GROUP_ID, SAMPLE]);
        let labels = create_data_label(
            &sample(),
            Some(requested.as_slice()),
            Some("flagged"),
            &LabelScheme::default(),
        )
        .unwrap();
        assert_eq!(labels[0], "LIB1<br>Group ID: G1<br>5<br>flagged");
        assert_eq!(labels[1], "LIB2<br>7<br>flagged");
    }

    #[test]
    fn test_no_columns() {
        let scheme = LabelScheme::default();
        let labels = create_data_label(&sample(), None, None, &scheme).unwrap();
        assert_eq!(labels, vec!["", ""]);
        let none: Vec<String> = Vec::new();
        let labels =
            create_data_label(&sample(), Some(none.as_slice()), Some("note"), &scheme).unwrap();
        assert_eq!(labels, vec!["note", "note"]);
    }

    #[test]
    fn test_unknown_column_is_an_error() {
        let requested = cols(&["nope"]);
        let result = create_data_label(
            &sample(),
            Some(requested.as_slice()),
            None,
            &LabelScheme::default(),
        );
        assert_eq!(
            result.unwrap_err(),
            TableError::UnknownColumn("nope".to_string())
        );
    }
}
