//! Table reshape pipeline: filter, restrict by date, sort, encode, highlight
//!
//! Global invariants enforced:
//! - The source table is never mutated; every call returns a new table
//! - Nothing selected yields an empty table with the source's columns
//! - Colour and shape come from the caller's value universe, never from the
//!   filtered subset, so a value keeps its encoding across filter states
//! - Highlight colour and size take precedence over the normal encoding
//! - Reshaping a reshaped table with the same request is a no-op

use crate::filter::{FilterSpec, HighlightSet, RunRegistry};
use crate::palette::{domain_universe, Assignment, Palette, HIGHLIGHT_COLOUR};
use crate::schema::{ReportSchema, Variant, DONOR, KIT, MERGED_LIBRARY, PROJECT, RUN};
use crate::table::{Table, TableError};
use crate::value::Value;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const SHAPE_COLUMN: &str = "shape";
pub const COLOUR_COLUMN: &str = "colour";
pub const SIZE_COLUMN: &str = "markersize";

/// Default marker size
pub const MARKER_SIZE: f64 = 12.0;
/// Marker size of highlighted rows
pub const HIGHLIGHT_MARKER_SIZE: f64 = 18.0;

/// Two-level ascending sort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortKeys {
    pub primary: String,
    pub secondary: String,
}

impl SortKeys {
    pub fn new(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        SortKeys {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }

    pub fn default_for(variant: Variant) -> Self {
        match variant {
            Variant::SingleLane => SortKeys::new(PROJECT, RUN),
            Variant::CallReady => SortKeys::new(PROJECT, DONOR),
        }
    }
}

/// Columns driving marker colour and shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Encoding {
    pub colour_by: String,
    pub shape_by: String,
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding {
            colour_by: PROJECT.to_string(),
            shape_by: KIT.to_string(),
        }
    }
}

/// Ordered value lists colours and shapes are assigned against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodingUniverse {
    pub colours: Vec<String>,
    pub shapes: Vec<String>,
}

impl EncodingUniverse {
    /// Universe of an unfiltered table, each list sorted case-insensitively
    pub fn from_table(table: &Table, encoding: &Encoding) -> Result<Self, TableError> {
        Ok(EncodingUniverse {
            colours: domain_universe(table, &encoding.colour_by)?,
            shapes: domain_universe(table, &encoding.shape_by)?,
        })
    }
}

/// Palettes and marker sizes
#[derive(Debug, Clone, PartialEq)]
pub struct VisualStyle {
    pub colours: Palette,
    pub shapes: Palette,
    pub highlight_colour: String,
    pub marker_size: f64,
    pub highlight_marker_size: f64,
}

impl Default for VisualStyle {
    fn default() -> Self {
        VisualStyle {
            colours: Palette::colours(),
            shapes: Palette::shapes_curated(),
            highlight_colour: HIGHLIGHT_COLOUR.to_string(),
            marker_size: MARKER_SIZE,
            highlight_marker_size: HIGHLIGHT_MARKER_SIZE,
        }
    }
}

/// Everything the UI layer collects for one reshape
#[derive(Debug, Clone, PartialEq)]
pub struct ReshapeRequest {
    pub filters: FilterSpec,
    pub sort: SortKeys,
    pub encoding: Encoding,
    pub universe: EncodingUniverse,
}

/// Reshape a per-lane table
///
/// `runs` supplies the date restriction; without it the date window is ignored.
pub fn reshape_single_lane(
    table: &Table,
    schema: &ReportSchema,
    request: &ReshapeRequest,
    style: &VisualStyle,
    runs: Option<&RunRegistry>,
    now: NaiveDateTime,
) -> Result<Table, TableError> {
    let schema = schema.bind(table)?;

    if is_nothing_selected(&request.filters, &schema) {
        log::debug!("no filter selection, returning empty table");
        return Ok(table.empty_like());
    }

    let mut reshaped = filter_dimensions(table, &request.filters, &schema)?;

    if runs.is_none() && needs_run_registry(&request.filters, &schema) {
        log::warn!("date range given but no run registry supplied; date window not applied");
    }

    if let (Some(run_column), Some(runs)) = (schema.run_column.as_deref(), runs) {
        let valid = runs.valid_runs(&request.filters.date_range, now);
        reshaped = reshaped.retain_rendered_in(run_column, &valid)?;
        log::debug!(
            "{} of {} registered runs inside date window, {} rows remain",
            valid.len(),
            runs.len(),
            reshaped.len()
        );
    }

    finish(reshaped, &schema, request, style)
}

/// True when the filter's date window can only be applied with a run registry
pub fn needs_run_registry(filters: &FilterSpec, schema: &ReportSchema) -> bool {
    schema.run_column.is_some() && filters.date_range.is_set()
}

/// Reshape a merged-library table
///
/// Same pipeline as [`reshape_single_lane`] keyed on the synthesized
/// [`MERGED_LIBRARY`] column, with no run or date restriction.
pub fn reshape_call_ready(
    table: &Table,
    schema: &ReportSchema,
    request: &ReshapeRequest,
    style: &VisualStyle,
) -> Result<Table, TableError> {
    let schema = schema.bind(table)?;

    if is_nothing_selected(&request.filters, &schema) {
        log::debug!("no filter selection, returning empty table");
        return Ok(table.empty_like());
    }

    let merged = add_merged_library_col(table, &schema)?;
    let reshaped = filter_dimensions(&merged, &request.filters, &schema)?;
    finish(reshaped, &schema, request, style)
}

/// Copy of `table` with the [`MERGED_LIBRARY`] column filled in
///
/// The label is the schema's merged-library columns joined with `_`; missing
/// parts render empty.
pub fn add_merged_library_col(table: &Table, schema: &ReportSchema) -> Result<Table, TableError> {
    let indices = schema
        .merged_library_columns
        .iter()
        .map(|c| table.column_index(c))
        .collect::<Result<Vec<_>, _>>()?;

    let labels = table
        .rows()
        .map(|row| {
            let parts: Vec<String> = indices.iter().map(|&i| row.at(i).to_string()).collect();
            Value::Str(parts.join("_"))
        })
        .collect();

    let mut out = table.clone();
    out.set_column(MERGED_LIBRARY, labels)?;
    Ok(out)
}

/// Dimensions this report knows about all have empty selections
fn is_nothing_selected(filters: &FilterSpec, schema: &ReportSchema) -> bool {
    schema
        .dimensions
        .keys()
        .all(|d| filters.allowed(*d).is_none())
}

/// Conjunctive membership filtering over every selected dimension
fn filter_dimensions(
    table: &Table,
    filters: &FilterSpec,
    schema: &ReportSchema,
) -> Result<Table, TableError> {
    let mut filtered = table.clone();
    for (dimension, column) in &schema.dimensions {
        if let Some(allowed) = filters.allowed(*dimension) {
            filtered = filtered.retain_in(column, allowed)?;
            log::debug!(
                "filter {}: {} values selected, {} rows remain",
                dimension.as_str(),
                allowed.len(),
                filtered.len()
            );
        }
    }
    for dimension in filters.dimensions.keys() {
        if schema.column(*dimension).is_none() && filters.allowed(*dimension).is_some() {
            log::debug!(
                "ignoring {} selection, report has no such dimension",
                dimension.as_str()
            );
        }
    }
    Ok(filtered)
}

fn finish(
    mut table: Table,
    schema: &ReportSchema,
    request: &ReshapeRequest,
    style: &VisualStyle,
) -> Result<Table, TableError> {
    table.sort_by_columns(&[request.sort.primary.as_str(), request.sort.secondary.as_str()])?;
    add_graphable_cols(
        &mut table,
        &request.encoding,
        &request.universe,
        style,
        &request.filters.highlight,
        &schema.sample_column,
    )?;
    Ok(table)
}

/// Add the shape, colour and marker size columns
pub fn add_graphable_cols(
    table: &mut Table,
    encoding: &Encoding,
    universe: &EncodingUniverse,
    style: &VisualStyle,
    highlight: &HighlightSet,
    sample_column: &str,
) -> Result<(), TableError> {
    let shapes = style.shapes.assign(&universe.shapes);
    let colours = style.colours.assign(&universe.colours);
    fill_in_shape_col(table, &encoding.shape_by, &shapes)?;
    fill_in_colour_col(
        table,
        &encoding.colour_by,
        &colours,
        highlight,
        sample_column,
        &style.highlight_colour,
    )?;
    fill_in_size_col(
        table,
        highlight,
        sample_column,
        style.marker_size,
        style.highlight_marker_size,
    )
}

pub fn fill_in_shape_col(
    table: &mut Table,
    shape_by: &str,
    shapes: &Assignment,
) -> Result<(), TableError> {
    let idx = table.column_index(shape_by)?;
    let values = table
        .rows()
        .map(|row| Value::from(shapes.get_or_fallback(&row.at(idx).to_string())))
        .collect();
    table.set_column(SHAPE_COLUMN, values)
}

/// Colour by `colour_by`, overridden for highlighted rows
pub fn fill_in_colour_col(
    table: &mut Table,
    colour_by: &str,
    colours: &Assignment,
    highlight: &HighlightSet,
    sample_column: &str,
    highlight_colour: &str,
) -> Result<(), TableError> {
    let idx = table.column_index(colour_by)?;
    let sample_idx = table.column_index(sample_column)?;
    let values = table
        .rows()
        .map(|row| {
            if highlight.contains(&row.at(sample_idx).to_string()) {
                Value::from(highlight_colour)
            } else {
                Value::from(colours.get_or_fallback(&row.at(idx).to_string()))
            }
        })
        .collect();
    table.set_column(COLOUR_COLUMN, values)
}

pub fn fill_in_size_col(
    table: &mut Table,
    highlight: &HighlightSet,
    sample_column: &str,
    size: f64,
    highlight_size: f64,
) -> Result<(), TableError> {
    let sample_idx = table.column_index(sample_column)?;
    let values = table
        .rows()
        .map(|row| {
            if highlight.contains(&row.at(sample_idx).to_string()) {
                Value::Num(highlight_size)
            } else {
                Value::Num(size)
            }
        })
        .collect();
    table.set_column(SIZE_COLUMN, values)
}
