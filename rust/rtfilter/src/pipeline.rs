use tracing::{
    info,
    warn,
};

use crate::aggregate::aggregate_peptides;
use crate::classifier::{
    ClassifierReport,
    classify,
    flag_peptides,
};
use crate::config::RtFilterConfig;
use crate::convert::convert;
use crate::errors::{
    Result,
    RtFilterError,
};
use crate::filters::{
    FilterContext,
    FilterPipeline,
    support_mask,
};
use crate::models::{
    PsmTable,
    RawTable,
};

/// Everything computed by a run, before any output is assembled.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: PsmTable,
    /// Merged-row ids dropped during conversion (null PEP).
    pub dropped_ids: Vec<usize>,
    pub classifier: ClassifierReport,
}

fn check_experiments(table: &PsmTable, config: &RtFilterConfig) -> Result<()> {
    let n = table.num_experiments();
    if n < 2 {
        return Err(RtFilterError::config(
            "input",
            format!(
                "Only {} experiment(s) found in the input data. At least 2 experiments are needed for alignment.",
                n
            ),
        ));
    }
    if config.num_experiments > n {
        return Err(RtFilterError::config(
            "num_experiments",
            format!(
                "Number of experiments filter threshold {} is greater than the number of experiments in the input list ({}).",
                config.num_experiments, n
            ),
        ));
    }
    Ok(())
}

/// Experiments with too few unflagged confident PSMs, by exp_id.
fn sparse_experiments(table: &PsmTable, pep_threshold: f64, min_psms: usize) -> Vec<usize> {
    let mut counts = vec![0usize; table.num_experiments()];
    for psm in table
        .psms
        .iter()
        .filter(|p| p.is_confident_unflagged(pep_threshold))
    {
        counts[psm.exp_id] += 1;
    }
    counts
        .iter()
        .enumerate()
        .filter(|(_, &c)| c < min_psms)
        .map(|(i, _)| i)
        .collect()
}

/// The stages that run after the configured filters, whatever they were.
///
/// Peptide support is recomputed once after experiments are dropped and
/// never iterated further.
pub fn refine_flags(table: &mut PsmTable, config: &RtFilterConfig) -> Result<()> {
    check_experiments(table, config)?;

    let mask = support_mask(table, config.pep_threshold, config.num_experiments);
    let newly = table.apply_mask(&mask);
    info!(
        "Flagged {} PSMs of peptides with PEP < {} in fewer than {} experiments",
        newly, config.pep_threshold, config.num_experiments
    );

    let sparse = sparse_experiments(table, config.pep_threshold, config.min_psms_per_experiment);
    if !sparse.is_empty() {
        let mut names: Vec<&str> = Vec::new();
        for psm in table.psms.iter() {
            if sparse.contains(&psm.exp_id) && !names.contains(&psm.raw_file.as_str()) {
                names.push(psm.raw_file.as_str());
            }
        }
        warn!(
            "Experiments {:?} have fewer than {} confident PSMs and will be excluded",
            names, config.min_psms_per_experiment
        );
        let mask: Vec<bool> = table
            .psms
            .iter()
            .map(|p| sparse.contains(&p.exp_id))
            .collect();
        table.apply_mask(&mask);
    }

    let mask = support_mask(table, config.pep_threshold, config.num_experiments);
    let newly = table.apply_mask(&mask);
    info!("Flagged {} more PSMs on the second support pass", newly);
    Ok(())
}

/// Runs the full flagging pipeline over the raw input tables.
pub fn process(raw_tables: &[RawTable], config: &RtFilterConfig) -> Result<PipelineOutput> {
    config.validate()?;
    let ctx = FilterContext::from_config(config);
    let _entered = ctx.span.enter();

    let conversion = convert(raw_tables, config)?;
    let mut table = conversion.table;

    if conversion.seeded_flags {
        info!("Removal flags provided in the input, skipping the configured filters");
    } else {
        FilterPipeline::from_specs(&config.filters).run(&mut table, &ctx)?;
    }
    refine_flags(&mut table, config)?;

    let aggs = aggregate_peptides(&table, config.protein_decoy_tag.as_deref());
    let classifier = classify(&aggs);
    let newly = flag_peptides(&mut table, &classifier.flagged_peptides);
    info!(
        "Flagged {} PSMs of {} decoy peptides",
        newly,
        classifier.flagged_peptides.len()
    );
    info!(
        "{} of {} PSMs flagged in total",
        table.num_flagged(),
        table.len()
    );

    Ok(PipelineOutput {
        table,
        dropped_ids: conversion.dropped_ids,
        classifier,
    })
}
