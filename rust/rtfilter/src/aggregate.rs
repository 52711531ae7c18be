//! Per-peptide summary statistics of the surviving PSMs.

use std::collections::BTreeMap;
use tracing::debug;

use crate::models::{
    CanonicalColumn,
    PsmTable,
};

pub const MIN_NUM_OBS: usize = 3;
pub const MIN_PEP_CV: f64 = 1e-5;
pub const MIN_PEP_MEAN: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub struct PeptideAggregate {
    pub sequence: String,
    pub peptide_id: usize,
    pub pep_mean: f64,
    /// Population standard deviation over the mean, NaN with fewer than 3 observations.
    pub pep_cv: f64,
    pub pep_min: f64,
    pub num_obs: usize,
    /// `None` when no decoy labels are available.
    pub is_decoy: Option<bool>,
}

impl PeptideAggregate {
    fn from_peps(
        sequence: &str,
        peptide_id: usize,
        peps: &[f64],
        is_decoy: Option<bool>,
    ) -> Self {
        let n = peps.len() as f64;
        let mean = peps.iter().sum::<f64>() / n;
        let min = peps.iter().copied().fold(f64::INFINITY, f64::min);
        let cv = if peps.len() < 3 {
            f64::NAN
        } else {
            let var = peps.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            var.sqrt() / mean
        };
        Self {
            sequence: sequence.to_string(),
            peptide_id,
            pep_mean: mean,
            pep_cv: cv,
            pep_min: min,
            num_obs: peps.len(),
            is_decoy,
        }
    }

    /// Qualifies for the decoy classification.
    pub fn is_qualifying(&self) -> bool {
        // NaN comparisons are false, so short groups fall out here as well.
        self.num_obs > MIN_NUM_OBS && self.pep_cv > MIN_PEP_CV && self.pep_mean > MIN_PEP_MEAN
    }
}

#[derive(Default)]
struct Accumulator<'a> {
    peptide_id: usize,
    peps: Vec<f64>,
    leading_proteins: Vec<&'a str>,
}

/// Aggregates unflagged PSMs by sequence, sorted by sequence.
///
/// Only peptides passing [`PeptideAggregate::is_qualifying`] are returned.
pub fn aggregate_peptides(table: &PsmTable, decoy_tag: Option<&str>) -> Vec<PeptideAggregate> {
    let decoy_tag = decoy_tag.filter(|_| table.has_column(CanonicalColumn::LeadingProtein));

    let mut groups: BTreeMap<&str, Accumulator> = BTreeMap::new();
    for psm in table.psms.iter().filter(|p| !p.flagged) {
        let acc = groups.entry(psm.sequence.as_str()).or_default();
        acc.peptide_id = psm.peptide_id;
        acc.peps.push(psm.pep);
        if let Some(lp) = psm.leading_protein.as_deref() {
            acc.leading_proteins.push(lp);
        }
    }

    let num_groups = groups.len();
    let out: Vec<PeptideAggregate> = groups
        .into_iter()
        .map(|(seq, acc)| {
            let is_decoy =
                decoy_tag.map(|tag| acc.leading_proteins.iter().any(|lp| lp.contains(tag)));
            PeptideAggregate::from_peps(seq, acc.peptide_id, &acc.peps, is_decoy)
        })
        .filter(|x| x.is_qualifying())
        .collect();
    debug!(
        "Aggregated {} peptides, {} qualify for decoy classification",
        num_groups,
        out.len()
    );
    out
}
