use std::collections::HashMap;
use tracing::info;

use super::{
    FilterContext,
    FilterOutcome,
    PsmFilter,
};
use crate::errors::Result;
use crate::models::{
    CanonicalColumn,
    PsmTable,
};

/// Threshold on a retention-time quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RtThreshold {
    /// Same threshold for every experiment, in retention time units.
    Constant(f64),
    /// Fraction of the maximum retention time of each experiment.
    Dynamic(f64),
}

impl RtThreshold {
    /// Builds the threshold from the raw filter parameters, validating its range.
    ///
    /// Returns `Ok(None)` if the filter should be skipped.
    fn resolve(
        filter_name: &str,
        value: Option<f64>,
        dynamic: Option<bool>,
        max_rt: f64,
        constant_upper_bound: Option<f64>,
        ctx: &FilterContext,
    ) -> Result<Option<Self>> {
        let value = match value {
            Some(v) => v,
            None => {
                ctx.skip(format!("No value provided to the {} filter.", filter_name))?;
                return Ok(None);
            }
        };

        if dynamic.unwrap_or(false) {
            if !(value > 0.0 && value <= 1.0) {
                ctx.skip(format!(
                    "Dynamic {} fraction {} is outside of (0, 1].",
                    filter_name, value
                ))?;
                return Ok(None);
            }
            info!(
                "Filtering {} with a dynamic threshold of {} of the maximum retention time of every experiment",
                filter_name, value
            );
            return Ok(Some(RtThreshold::Dynamic(value)));
        }

        let in_range = value > 0.0 && constant_upper_bound.is_none_or(|ub| value <= ub);
        if !in_range {
            let msg = match constant_upper_bound {
                Some(ub) => format!(
                    "Threshold {} for the {} filter must be in (0, {}], the maximum retention time.",
                    value, filter_name, ub
                ),
                None => format!(
                    "Threshold {} for the {} filter must be greater than 0.",
                    value, filter_name
                ),
            };
            ctx.strict_or_skip(&format!("filters.{}.value", filter_name), msg)?;
            return Ok(None);
        }
        info!(
            "Filtering {} with a constant threshold of {} (max retention time {})",
            filter_name, value, max_rt
        );
        Ok(Some(RtThreshold::Constant(value)))
    }

    /// Threshold for each experiment, indexed by exp_id.
    pub fn per_experiment(&self, max_rts: &[f64]) -> Vec<f64> {
        match self {
            RtThreshold::Constant(v) => vec![*v; max_rts.len()],
            RtThreshold::Dynamic(frac) => max_rts.iter().map(|m| m * frac).collect(),
        }
    }
}

/// Flags PSMs eluting over a window longer than the threshold.
#[derive(Debug, Clone)]
pub struct RetentionLengthFilter {
    pub value: Option<f64>,
    pub dynamic: Option<bool>,
}

impl PsmFilter for RetentionLengthFilter {
    fn name(&self) -> &'static str {
        "retention_length"
    }

    fn required_columns(&self) -> &'static [CanonicalColumn] {
        &[CanonicalColumn::RetentionLength]
    }

    fn apply(&self, table: &PsmTable, ctx: &FilterContext) -> Result<FilterOutcome> {
        let max_rt = table.max_rt();
        let threshold = match RtThreshold::resolve(
            self.name(),
            self.value,
            self.dynamic,
            max_rt,
            Some(max_rt),
            ctx,
        )? {
            Some(t) => t,
            None => return Ok(FilterOutcome::Skip),
        };
        let thresholds = threshold.per_experiment(&table.max_rt_per_experiment());

        let mask = table
            .psms
            .iter()
            .map(|p| {
                p.retention_length
                    .is_some_and(|len| len > thresholds[p.exp_id])
            })
            .collect();
        Ok(FilterOutcome::Mask(mask))
    }
}

/// Flags peptides observed over a wide retention time range within one experiment.
#[derive(Debug, Clone)]
pub struct SmearFilter {
    pub value: Option<f64>,
    pub dynamic: Option<bool>,
}

/// Max minus min retention time of every (exp_id, peptide_id) pair.
pub fn rt_ranges(table: &PsmTable) -> HashMap<(usize, usize), f64> {
    let mut bounds: HashMap<(usize, usize), (f64, f64)> = HashMap::new();
    for psm in table.psms.iter() {
        let entry = bounds
            .entry((psm.exp_id, psm.peptide_id))
            .or_insert((psm.retention_time, psm.retention_time));
        entry.0 = entry.0.min(psm.retention_time);
        entry.1 = entry.1.max(psm.retention_time);
    }
    bounds
        .into_iter()
        .map(|(k, (lo, hi))| (k, hi - lo))
        .collect()
}

impl PsmFilter for SmearFilter {
    fn name(&self) -> &'static str {
        "smears"
    }

    fn apply(&self, table: &PsmTable, ctx: &FilterContext) -> Result<FilterOutcome> {
        let threshold = match RtThreshold::resolve(
            self.name(),
            self.value,
            self.dynamic,
            table.max_rt(),
            None,
            ctx,
        )? {
            Some(t) => t,
            None => return Ok(FilterOutcome::Skip),
        };
        let thresholds = threshold.per_experiment(&table.max_rt_per_experiment());
        let ranges = rt_ranges(table);

        let mask = table
            .psms
            .iter()
            .map(|p| ranges[&(p.exp_id, p.peptide_id)] > thresholds[p.exp_id])
            .collect();
        Ok(FilterOutcome::Mask(mask))
    }
}
