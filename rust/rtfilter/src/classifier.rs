//! Decoy peptide classification.
//!
//! With decoy labels, a linear SVM on `[log10(pep_mean), log10(pep_cv)]`
//! learns to separate decoy from target peptides and the cutoff is picked
//! on a held out half of the peptides. Without labels, a fixed PEP rule
//! flags peptides that are never confidently identified yet very stable.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use tracing::{
    info,
    warn,
};

use crate::aggregate::PeptideAggregate;
use crate::ml::{
    LinearSvm,
    PlattScaling,
    StandardScaler,
    SvmConfig,
    TargetDecoy,
    roc_curve,
};
use crate::models::PsmTable;

/// Minimum true positive rate of the decoy cutoff.
pub const MIN_TPR: f64 = 0.8;
pub const FALLBACK_MIN_PEP: f64 = 0.01;
pub const FALLBACK_MAX_PEP_CV: f64 = 0.1;
const SPLIT_SEED: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierMethod {
    Svm,
    Heuristic,
    /// Nothing was flagged, the input was degenerate.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierReport {
    pub method: ClassifierMethod,
    pub num_qualifying: usize,
    pub auc: Option<f64>,
    pub inverted: bool,
    pub cutoff: Option<f64>,
    /// Peptide ids of the peptides flagged as decoys.
    pub flagged_peptides: Vec<usize>,
}

impl ClassifierReport {
    fn skipped(num_qualifying: usize) -> Self {
        Self {
            method: ClassifierMethod::Skipped,
            num_qualifying,
            auc: None,
            inverted: false,
            cutoff: None,
            flagged_peptides: Vec::new(),
        }
    }
}

pub fn features(agg: &PeptideAggregate) -> [f64; 2] {
    [agg.pep_mean.log10(), agg.pep_cv.log10()]
}

#[derive(Debug, Clone)]
pub struct DecoyClassifierModel {
    pub scaler: StandardScaler<2>,
    pub svm: LinearSvm<2>,
    pub platt: PlattScaling,
    pub auc: f64,
    pub inverted: bool,
    pub cutoff: f64,
}

/// Permutation of `0..n` split in a test half (rounded up) and a train half.
pub fn split_indices(n: usize, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut perm: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    perm.shuffle(&mut rng);
    let n_test = n.div_ceil(2);
    let train = perm.split_off(n_test);
    (perm, train)
}

fn count_label(labels: &[TargetDecoy], idx: &[usize], label: TargetDecoy) -> usize {
    idx.iter().filter(|&&i| labels[i] == label).count()
}

impl DecoyClassifierModel {
    /// Trains on labelled aggregates, `None` if the data cannot support a model.
    pub fn train(aggs: &[PeptideAggregate]) -> Option<Self> {
        let labels: Vec<TargetDecoy> = aggs
            .iter()
            .map(|a| TargetDecoy::from_is_decoy(a.is_decoy.unwrap_or(false)))
            .collect();
        let raw: Vec<[f64; 2]> = aggs.iter().map(features).collect();
        let (scaler, x) = StandardScaler::fit_transform(&raw);

        let (test, train) = split_indices(aggs.len(), SPLIT_SEED);
        for label in [TargetDecoy::Target, TargetDecoy::Decoy] {
            let in_train = count_label(&labels, &train, label);
            if in_train < 2 {
                warn!(
                    "Only {} {:?} peptides in the training half, skipping decoy classification",
                    in_train, label
                );
                return None;
            }
            if count_label(&labels, &test, label) == 0 {
                warn!(
                    "No {:?} peptides in the test half, skipping decoy classification",
                    label
                );
                return None;
            }
        }

        let x_train: Vec<[f64; 2]> = train.iter().map(|&i| x[i]).collect();
        let y_train: Vec<TargetDecoy> = train.iter().map(|&i| labels[i]).collect();
        let svm = LinearSvm::fit(&x_train, &y_train, TargetDecoy::Decoy, &SvmConfig::default());

        let train_scores: Vec<f64> = x_train.iter().map(|xi| svm.decision_function(xi)).collect();
        let train_decoy: Vec<bool> = y_train.iter().map(|l| *l == TargetDecoy::Decoy).collect();
        let platt = PlattScaling::fit(&train_scores, &train_decoy);

        let test_scores: Vec<f64> = test.iter().map(|&i| svm.decision_function(&x[i])).collect();
        let test_decoy: Vec<bool> = test
            .iter()
            .map(|&i| labels[i] == TargetDecoy::Decoy)
            .collect();

        let mut roc = roc_curve(&test_scores, &test_decoy);
        let mut auc = roc.auc();
        let mut inverted = false;
        if auc < 0.5 {
            info!("Correcting inverted ROC curve");
            inverted = true;
            let flipped: Vec<bool> = test_decoy.iter().map(|x| !x).collect();
            roc = roc_curve(&test_scores, &flipped);
            auc = roc.auc();
        }
        info!("AUC: {:.3}", auc);

        let cutoff_idx = roc.cutoff_index(MIN_TPR);
        info!(
            "ROC Cutoff: FPR = {:.2}, TPR = {:.2}",
            roc.fpr[cutoff_idx], roc.tpr[cutoff_idx]
        );

        Some(Self {
            scaler,
            svm,
            platt,
            auc,
            inverted,
            cutoff: roc.thresholds[cutoff_idx],
        })
    }

    pub fn score(&self, agg: &PeptideAggregate) -> f64 {
        self.svm
            .decision_function(&self.scaler.transform(&features(agg)))
    }

    /// Platt-scaled probability of the peptide being a decoy.
    pub fn decoy_probability(&self, agg: &PeptideAggregate) -> f64 {
        self.platt.probability(self.score(agg))
    }

    pub fn is_decoy(&self, agg: &PeptideAggregate) -> bool {
        let above = self.score(agg) >= self.cutoff;
        above != self.inverted
    }
}

/// Rule used when no decoy labels are available.
pub fn heuristic_is_decoy(agg: &PeptideAggregate) -> bool {
    agg.pep_min > FALLBACK_MIN_PEP && agg.pep_cv < FALLBACK_MAX_PEP_CV
}

/// Decides which qualifying peptides are decoys.
pub fn classify(aggs: &[PeptideAggregate]) -> ClassifierReport {
    if aggs.is_empty() {
        warn!("No peptides qualify for decoy classification, no peptides will be flagged");
        return ClassifierReport::skipped(0);
    }

    let labelled = aggs.iter().all(|a| a.is_decoy.is_some());
    if !labelled {
        let flagged: Vec<usize> = aggs
            .iter()
            .filter(|a| heuristic_is_decoy(a))
            .map(|a| a.peptide_id)
            .collect();
        info!(
            "Removing {} peptides for min(PEP) > {:.3} and CV(PEP) < {:.3}",
            flagged.len(),
            FALLBACK_MIN_PEP,
            FALLBACK_MAX_PEP_CV
        );
        return ClassifierReport {
            method: ClassifierMethod::Heuristic,
            num_qualifying: aggs.len(),
            auc: None,
            inverted: false,
            cutoff: None,
            flagged_peptides: flagged,
        };
    }

    info!("Decoy peptide information present, training a classifier to avoid aligning decoy peptides");
    let model = match DecoyClassifierModel::train(aggs) {
        Some(m) => m,
        None => return ClassifierReport::skipped(aggs.len()),
    };

    let flagged: Vec<usize> = aggs
        .iter()
        .filter(|a| model.is_decoy(a))
        .map(|a| a.peptide_id)
        .collect();
    let likely_decoys = aggs
        .iter()
        .filter(|a| model.decoy_probability(a) > 0.5)
        .count();
    info!(
        "Classifier is removing {} peptides ({} with a decoy probability above 0.5)",
        flagged.len(),
        likely_decoys
    );

    ClassifierReport {
        method: ClassifierMethod::Svm,
        num_qualifying: aggs.len(),
        auc: Some(model.auc),
        inverted: model.inverted,
        cutoff: Some(model.cutoff),
        flagged_peptides: flagged,
    }
}

/// Flags every PSM of the flagged peptides, returns how many were newly flagged.
pub fn flag_peptides(table: &mut PsmTable, peptide_ids: &[usize]) -> usize {
    let flagged: HashSet<usize> = peptide_ids.iter().copied().collect();
    let mask: Vec<bool> = table
        .psms
        .iter()
        .map(|p| flagged.contains(&p.peptide_id))
        .collect();
    table.apply_mask(&mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agg(id: usize, mean: f64, cv: f64, min: f64, is_decoy: Option<bool>) -> PeptideAggregate {
        PeptideAggregate {
            sequence: format!("PEP{:04}", id),
            peptide_id: id,
            pep_mean: mean,
            pep_cv: cv,
            pep_min: min,
            num_obs: 5,
            is_decoy,
        }
    }

    #[test]
    fn test_heuristic() {
        let aggs = vec![
            agg(0, 0.2, 0.05, 0.02, None),
            agg(1, 0.2, 0.05, 0.01, None),
            agg(2, 0.2, 0.1, 0.5, None),
            agg(3, 0.001, 0.5, 0.0001, None),
        ];
        let report = classify(&aggs);
        assert_eq!(report.method, ClassifierMethod::Heuristic);
        assert_eq!(report.flagged_peptides, vec![0]);
    }

    #[test]
    fn test_empty_is_noop() {
        let report = classify(&[]);
        assert_eq!(report.method, ClassifierMethod::Skipped);
        assert!(report.flagged_peptides.is_empty());
    }

    #[test]
    fn test_single_class_is_noop() {
        let aggs: Vec<_> = (0..20)
            .map(|i| agg(i, 0.01 * (i + 1) as f64, 0.5, 0.001, Some(false)))
            .collect();
        let report = classify(&aggs);
        assert_eq!(report.method, ClassifierMethod::Skipped);
        assert!(report.flagged_peptides.is_empty());
    }

    /// Decoys sit at high PEP in the training half and at low PEP in the test half.
    fn swapped_halves(n: usize) -> Vec<PeptideAggregate> {
        let (test, train) = split_indices(n, SPLIT_SEED);
        let mut aggs: Vec<Option<PeptideAggregate>> = vec![None; n];
        for (half, decoy_mean) in [(&train, 0.3), (&test, 0.01)] {
            for (j, &i) in half.iter().enumerate() {
                let is_decoy = j % 2 == 0;
                let base = if is_decoy { decoy_mean } else { 0.31 - decoy_mean };
                let jitter = 1.0 + 0.01 * j as f64;
                aggs[i] = Some(agg(i, base * jitter, 0.2 * jitter, base / 2.0, Some(is_decoy)));
            }
        }
        aggs.into_iter().flatten().collect()
    }

    #[test]
    fn test_inverted_roc_flips_the_cutoff() {
        let aggs = swapped_halves(40);
        assert_eq!(aggs.len(), 40);
        let model = DecoyClassifierModel::train(&aggs).unwrap();
        assert!(model.inverted);
        assert!(model.auc >= 0.5);
        for a in aggs.iter() {
            assert_eq!(model.is_decoy(a), model.score(a) < model.cutoff);
        }

        let report = classify(&aggs);
        assert_eq!(report.method, ClassifierMethod::Svm);
        assert!(report.inverted);
        let expected: Vec<usize> = aggs
            .iter()
            .filter(|a| model.score(a) < model.cutoff)
            .map(|a| a.peptide_id)
            .collect();
        assert_eq!(report.flagged_peptides, expected);
    }

    #[test]
    fn test_cutoff_reaches_min_tpr_on_test_half() {
        use rand::Rng;

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let aggs: Vec<PeptideAggregate> = (0..80)
            .map(|i| {
                let is_decoy = i % 2 == 0;
                let (mean, cv) = if is_decoy {
                    (rng.gen_range(0.05..0.5), rng.gen_range(0.02..0.3))
                } else {
                    (rng.gen_range(0.001..0.1), rng.gen_range(0.1..1.0))
                };
                agg(i, mean, cv, mean / 2.0, Some(is_decoy))
            })
            .collect();

        let model = DecoyClassifierModel::train(&aggs).unwrap();
        let (test, _) = split_indices(aggs.len(), SPLIT_SEED);
        let scores: Vec<f64> = test.iter().map(|&i| model.score(&aggs[i])).collect();
        let positive: Vec<bool> = test
            .iter()
            .map(|&i| aggs[i].is_decoy.unwrap_or(false) != model.inverted)
            .collect();

        let roc = roc_curve(&scores, &positive);
        let idx = roc.cutoff_index(MIN_TPR);
        assert_eq!(roc.thresholds[idx], model.cutoff);
        assert!(roc.tpr[idx] >= MIN_TPR);

        let num_pos = positive.iter().filter(|&&p| p).count();
        let above = scores
            .iter()
            .zip(positive.iter())
            .filter(|(s, p)| **p && **s >= model.cutoff)
            .count();
        assert!(above as f64 / num_pos as f64 >= MIN_TPR);
    }

    #[test]
    fn test_split_halves() {
        let (test, train) = split_indices(7, 0);
        assert_eq!(test.len(), 4);
        assert_eq!(train.len(), 3);
        let mut all: Vec<usize> = test.iter().chain(train.iter()).copied().collect();
        all.sort();
        assert_eq!(all, (0..7).collect::<Vec<_>>());
        assert_eq!(split_indices(7, 0), (test, train));
    }
}
