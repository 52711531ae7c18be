//! Filtering of peptide-spectrum matches ahead of retention time alignment.
//!
//! The pipeline converts search-engine output tables into a canonical
//! working table, flags PSMs with a configurable list of filters, drops
//! peptides without enough support across experiments and flags likely
//! decoy peptides. The result is written as alignment-ready tables.

pub mod aggregate;
pub mod classifier;
pub mod config;
pub mod convert;
pub mod errors;
pub mod filters;
pub mod ids;
pub mod io;
pub mod ml;
pub mod models;
pub mod output;
pub mod pipeline;

pub use config::{
    ColumnNames,
    ExclusionPolicy,
    FilterSpec,
    OutputConfig,
    RtFilterConfig,
    Strictness,
};
pub use errors::{
    Result,
    RtFilterError,
};
pub use models::{
    CanonicalColumn,
    Psm,
    PsmTable,
    RawTable,
};
pub use output::{
    AlignmentRow,
    AlignmentTable,
    AnnotatedInput,
};
pub use pipeline::{
    PipelineOutput,
    process,
};
