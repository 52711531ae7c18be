//! Composable exclusion filters.
//!
//! Every filter looks at the working table and returns a mask aligned to its
//! rows (`true` = exclude) or asks to be skipped. The [`FilterPipeline`] ORs
//! all masks into the running flag of the table, in configuration order.

pub mod confidence;
pub mod filename;
pub mod protein;
pub mod retention;

pub use confidence::{
    NumExpsFilter,
    PepFilter,
    peptide_support,
    support_mask,
};
pub use filename::{
    FilenameFilter,
    FilenameMode,
};
pub use protein::{
    TagFilter,
    TagTarget,
    UniprotExclusionFilter,
};
pub use retention::{
    RetentionLengthFilter,
    RtThreshold,
    SmearFilter,
};

use tracing::{
    info,
    warn,
};

use crate::config::{
    FilterSpec,
    RtFilterConfig,
    Strictness,
};
use crate::errors::{
    Result,
    RtFilterError,
};
use crate::models::{
    CanonicalColumn,
    PsmTable,
};

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    Mask(Vec<bool>),
    Skip,
}

/// Run-wide settings the filters depend on.
#[derive(Debug, Clone)]
pub struct FilterContext {
    pub pep_threshold: f64,
    pub strictness: Strictness,
    pub span: tracing::Span,
}

impl FilterContext {
    pub fn new(pep_threshold: f64, strictness: Strictness) -> Self {
        Self {
            pep_threshold,
            strictness,
            span: tracing::info_span!("rtfilter_run"),
        }
    }

    pub fn from_config(config: &RtFilterConfig) -> Self {
        Self::new(config.pep_threshold, config.strictness)
    }

    /// A failure that is never fatal: warn and skip the filter.
    pub fn skip(&self, msg: impl AsRef<str>) -> Result<FilterOutcome> {
        warn!("{} Skipping this filter.", msg.as_ref());
        Ok(FilterOutcome::Skip)
    }

    /// A failure that aborts the run in strict mode and skips the filter otherwise.
    pub fn strict_or_skip(&self, key: &str, msg: impl AsRef<str>) -> Result<FilterOutcome> {
        match self.strictness {
            Strictness::Strict => Err(RtFilterError::config(key, msg.as_ref())),
            Strictness::Lenient => self.skip(msg),
        }
    }
}

pub trait PsmFilter: std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Canonical columns that must exist in the table for this filter to run.
    fn required_columns(&self) -> &'static [CanonicalColumn] {
        &[]
    }

    fn apply(&self, table: &PsmTable, ctx: &FilterContext) -> Result<FilterOutcome>;
}

pub fn build_filter(spec: &FilterSpec) -> Box<dyn PsmFilter> {
    match spec.clone() {
        FilterSpec::ExcludeFilename { expr } => Box::new(FilenameFilter {
            expr,
            mode: FilenameMode::Exclude,
        }),
        FilterSpec::IncludeFilename { expr } => Box::new(FilenameFilter {
            expr,
            mode: FilenameMode::Include,
        }),
        FilterSpec::UniprotExclusion { file, list } => {
            Box::new(UniprotExclusionFilter { file, list })
        }
        FilterSpec::Contaminant { tag } => Box::new(TagFilter {
            tag,
            target: TagTarget::Contaminant,
        }),
        FilterSpec::Decoy { tag } => Box::new(TagFilter {
            tag,
            target: TagTarget::Decoy,
        }),
        FilterSpec::RetentionLength { value, dynamic } => {
            Box::new(RetentionLengthFilter { value, dynamic })
        }
        FilterSpec::Smears { value, dynamic } => Box::new(SmearFilter { value, dynamic }),
        FilterSpec::NumExps { value } => Box::new(NumExpsFilter { value }),
        FilterSpec::Pep { value } => Box::new(PepFilter { value }),
    }
}

/// Ordered list of filters built from the configuration.
#[derive(Debug, Default)]
pub struct FilterPipeline {
    filters: Vec<Box<dyn PsmFilter>>,
}

impl FilterPipeline {
    pub fn from_specs(specs: &[FilterSpec]) -> Self {
        Self {
            filters: specs.iter().map(build_filter).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Every filter's required columns must exist before anything runs.
    pub fn validate_columns(&self, table: &PsmTable) -> Result<()> {
        for (i, filter) in self.filters.iter().enumerate() {
            for column in filter.required_columns() {
                if !table.has_column(*column) {
                    return Err(RtFilterError::config(
                        format!("filters[{}]", i),
                        format!(
                            "Filter {} requires a data column {}, but this was not found in the input data. Configure \"col_names.{}\".",
                            filter.name(),
                            column,
                            column
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Runs every filter in order, OR-ing the masks into the table's flag.
    pub fn run(&self, table: &mut PsmTable, ctx: &FilterContext) -> Result<()> {
        if self.is_empty() {
            info!("No filters configured");
            return Ok(());
        }
        info!("Running {} filters...", self.len());
        self.validate_columns(table)?;

        for filter in self.filters.iter() {
            match filter.apply(table, ctx)? {
                FilterOutcome::Mask(mask) => {
                    let flagged = mask.iter().filter(|&&x| x).count();
                    let newly = table.apply_mask(&mask);
                    info!(
                        "Filter {} flagged {} PSMs ({} not previously flagged)",
                        filter.name(),
                        flagged,
                        newly
                    );
                }
                FilterOutcome::Skip => {
                    info!("Filter {} skipped", filter.name());
                }
            }
        }
        Ok(())
    }
}
