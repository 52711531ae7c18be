use std::collections::HashSet;
use tracing::{
    info,
    warn,
};

use super::{
    FilterContext,
    FilterOutcome,
    PsmFilter,
};
use crate::errors::Result;
use crate::models::PsmTable;

/// Number of distinct experiments every peptide is confidently seen in,
/// indexed by peptide_id. Only unflagged rows with pep below the threshold count.
pub fn peptide_support(table: &PsmTable, pep_threshold: f64) -> Vec<usize> {
    let pairs: HashSet<(usize, usize)> = table
        .psms
        .iter()
        .filter(|p| p.is_confident_unflagged(pep_threshold))
        .map(|p| (p.peptide_id, p.exp_id))
        .collect();

    let mut support = vec![0; table.num_peptides()];
    for (peptide_id, _) in pairs {
        support[peptide_id] += 1;
    }
    support
}

/// Row mask of peptides supported by fewer than `min_experiments` experiments.
pub fn support_mask(table: &PsmTable, pep_threshold: f64, min_experiments: usize) -> Vec<bool> {
    let support = peptide_support(table, pep_threshold);
    table
        .psms
        .iter()
        .map(|p| support[p.peptide_id] < min_experiments)
        .collect()
}

/// Flags peptides observed confidently in too few experiments.
#[derive(Debug, Clone)]
pub struct NumExpsFilter {
    pub value: Option<usize>,
}

impl PsmFilter for NumExpsFilter {
    fn name(&self) -> &'static str {
        "num_exps"
    }

    fn apply(&self, table: &PsmTable, ctx: &FilterContext) -> Result<FilterOutcome> {
        let value = match self.value {
            Some(v) if v >= 1 => v,
            Some(v) => {
                return ctx.skip(format!(
                    "Number of experiments {} for the num_exps filter must be at least 1.",
                    v
                ));
            }
            None => return ctx.skip("No value provided to the num_exps filter."),
        };
        if value == 1 {
            warn!(
                "num_exps filter with a value of 1 only removes peptides without any confident observation"
            );
        }
        info!(
            "Filtering peptides observed with PEP < {} in fewer than {} experiments",
            ctx.pep_threshold, value
        );
        Ok(FilterOutcome::Mask(support_mask(
            table,
            ctx.pep_threshold,
            value,
        )))
    }
}

/// Flags PSMs with a PEP above a fixed value.
#[derive(Debug, Clone)]
pub struct PepFilter {
    pub value: Option<f64>,
}

impl PsmFilter for PepFilter {
    fn name(&self) -> &'static str {
        "pep"
    }

    fn apply(&self, table: &PsmTable, ctx: &FilterContext) -> Result<FilterOutcome> {
        let value = match self.value {
            Some(v) if v > 0.0 && v <= 1.0 => v,
            Some(v) => {
                return ctx.skip(format!("PEP filter value {} is outside of (0, 1].", v));
            }
            None => return ctx.skip("No value provided to the pep filter."),
        };
        Ok(FilterOutcome::Mask(
            table.psms.iter().map(|p| p.pep > value).collect(),
        ))
    }
}
