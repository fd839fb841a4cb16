//! qcview core library - filtering, visual encoding and cutoff evaluation for
//! sequencing QC metrics reports

#![deny(warnings)]

// Global invariants enforced in this crate:
// - No global mutable state; source tables are owned by a provider object
// - Every reshape returns a new table, the source table is never mutated
// - No randomness; palette assignment depends only on input order
// - Deterministic row and column ordering
// - Identical input yields byte-for-byte identical output

pub mod config;
pub mod cutoff;
pub mod filter;
pub mod label;
pub mod palette;
pub mod provider;
pub mod report;
pub mod reshape;
pub mod schema;
pub mod table;
pub mod value;

pub use config::ResolvedConfig;
pub use cutoff::{evaluate, CutoffReport, CutoffRule};
pub use filter::{DateRange, FilterSpec, HighlightSet, RunRegistry};
pub use palette::{Assignment, Palette};
pub use provider::{CacheProvider, DataProvider};
pub use reshape::{reshape_call_ready, reshape_single_lane, ReshapeRequest};
pub use schema::{Dimension, ReportSchema};
pub use table::{Table, TableError};
pub use value::Value;
