//! Report schemas: logical fields mapped to physical cache columns
//!
//! Filters, identity columns and highlight lookups address columns through a
//! schema so that a bad column name is reported once, when the schema is bound
//! to a table, instead of deep inside a reshape.

use crate::table::{Table, TableError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PROJECT: &str = "project";
pub const RUN: &str = "run";
pub const LANE: &str = "lane";
pub const BARCODES: &str = "barcodes";
pub const SAMPLE: &str = "sample_name";
pub const KIT: &str = "prep_kit";
pub const INSTRUMENT: &str = "instrument";
pub const LIBRARY_DESIGN: &str = "library_design";
pub const REFERENCE: &str = "reference";
pub const INSTITUTE: &str = "institute";
pub const SAMPLE_TYPE: &str = "sample_type";
pub const TISSUE_MATERIAL: &str = "tissue_material";
pub const TISSUE_TYPE: &str = "tissue_type";
pub const TISSUE_ORIGIN: &str = "tissue_origin";
pub const DONOR: &str = "donor";
pub const GROUP_ID: &str = "group_id";

/// Synthesized by the call-ready pipeline from [`ReportSchema::merged_library_columns`]
pub const MERGED_LIBRARY: &str = "Merged Library";

/// Run registry columns
pub const RUN_START: &str = "start_date";
pub const RUN_COMPLETION: &str = "completion_date";

/// Filterable dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Project,
    Run,
    Kit,
    Instrument,
    LibraryDesign,
    Reference,
    Institute,
    SampleType,
    TissueMaterial,
    TissueType,
    TissueOrigin,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Project => "project",
            Dimension::Run => "run",
            Dimension::Kit => "kit",
            Dimension::Instrument => "instrument",
            Dimension::LibraryDesign => "library_design",
            Dimension::Reference => "reference",
            Dimension::Institute => "institute",
            Dimension::SampleType => "sample_type",
            Dimension::TissueMaterial => "tissue_material",
            Dimension::TissueType => "tissue_type",
            Dimension::TissueOrigin => "tissue_origin",
        }
    }
}

/// Row identity a report is keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// One row per run + lane + barcode
    SingleLane,
    /// One row per merged library, spanning runs
    CallReady,
}

/// Logical-to-physical column mapping for one report
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSchema {
    pub variant: Variant,
    pub dimensions: BTreeMap<Dimension, String>,
    /// Column holding the identifier matched against the highlight set
    pub sample_column: String,
    /// Column restricted by the date window; `None` disables the restriction
    pub run_column: Option<String>,
    /// Columns copied into failure tables so failures can be traced back
    pub identity_columns: Vec<String>,
    /// Columns joined into [`MERGED_LIBRARY`] (call-ready only)
    pub merged_library_columns: Vec<String>,
}

impl ReportSchema {
    /// Per-lane sequencing report
    pub fn single_lane() -> Self {
        let dimensions = [
            (Dimension::Project, PROJECT),
            (Dimension::Run, RUN),
            (Dimension::Kit, KIT),
            (Dimension::Instrument, INSTRUMENT),
            (Dimension::LibraryDesign, LIBRARY_DESIGN),
            (Dimension::Reference, REFERENCE),
            (Dimension::Institute, INSTITUTE),
            (Dimension::SampleType, SAMPLE_TYPE),
            (Dimension::TissueMaterial, TISSUE_MATERIAL),
        ];
        ReportSchema {
            variant: Variant::SingleLane,
            dimensions: to_map(&dimensions),
            sample_column: SAMPLE.to_string(),
            run_column: Some(RUN.to_string()),
            identity_columns: to_strings(&[SAMPLE, PROJECT, RUN, LANE, BARCODES]),
            merged_library_columns: Vec::new(),
        }
    }

    /// Merged-library (call-ready) report: no run, instrument or date filters
    pub fn call_ready() -> Self {
        let dimensions = [
            (Dimension::Project, PROJECT),
            (Dimension::Kit, KIT),
            (Dimension::LibraryDesign, LIBRARY_DESIGN),
            (Dimension::Reference, REFERENCE),
            (Dimension::Institute, INSTITUTE),
            (Dimension::SampleType, SAMPLE_TYPE),
            (Dimension::TissueMaterial, TISSUE_MATERIAL),
            (Dimension::TissueType, TISSUE_TYPE),
            (Dimension::TissueOrigin, TISSUE_ORIGIN),
        ];
        ReportSchema {
            variant: Variant::CallReady,
            dimensions: to_map(&dimensions),
            sample_column: MERGED_LIBRARY.to_string(),
            run_column: None,
            identity_columns: to_strings(&[
                MERGED_LIBRARY,
                PROJECT,
                DONOR,
                TISSUE_ORIGIN,
                TISSUE_TYPE,
                LIBRARY_DESIGN,
                GROUP_ID,
            ]),
            merged_library_columns: to_strings(&[
                DONOR,
                TISSUE_ORIGIN,
                TISSUE_TYPE,
                LIBRARY_DESIGN,
                GROUP_ID,
            ]),
        }
    }

    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::SingleLane => Self::single_lane(),
            Variant::CallReady => Self::call_ready(),
        }
    }

    /// Physical column for a dimension, if the report filters on it
    pub fn column(&self, dimension: Dimension) -> Option<&str> {
        self.dimensions.get(&dimension).map(String::as_str)
    }

    fn is_synthesized(&self, column: &str) -> bool {
        self.variant == Variant::CallReady && column == MERGED_LIBRARY
    }

    /// Check every referenced column exists in `table`
    pub fn bind<'a>(&'a self, table: &Table) -> Result<BoundSchema<'a>, TableError> {
        let referenced = self
            .dimensions
            .values()
            .chain(std::iter::once(&self.sample_column))
            .chain(self.run_column.iter())
            .chain(self.identity_columns.iter())
            .chain(self.merged_library_columns.iter());

        for column in referenced {
            if !self.is_synthesized(column) {
                table.column_index(column)?;
            }
        }
        Ok(BoundSchema { schema: self })
    }
}

/// A schema whose columns were checked against a source table
#[derive(Debug, Clone, Copy)]
pub struct BoundSchema<'a> {
    schema: &'a ReportSchema,
}

impl<'a> BoundSchema<'a> {
    pub fn schema(&self) -> &'a ReportSchema {
        self.schema
    }
}

impl std::ops::Deref for BoundSchema<'_> {
    type Target = ReportSchema;

    fn deref(&self) -> &ReportSchema {
        self.schema
    }
}

fn to_map(pairs: &[(Dimension, &str)]) -> BTreeMap<Dimension, String> {
    pairs
        .iter()
        .map(|(d, c)| (*d, (*c).to_string()))
        .collect()
}

fn to_strings(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| (*c).to_string()).collect()
}
