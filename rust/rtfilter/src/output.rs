//! Assembly of the tables handed to the alignment stage.
//!
//! Everything here is pure; writing to disk lives in [`crate::io`].

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{
    info,
    warn,
};

use crate::config::ExclusionPolicy;
use crate::models::{
    PsmTable,
    RawTable,
};
use crate::pipeline::PipelineOutput;

/// Columns written by this pipeline or by the alignment run downstream of it.
///
/// Stale copies in the input are dropped before annotating.
pub const DERIVED_COLUMNS: [&str; 16] = [
    "exp_id",
    "peptide_id",
    "input_id",
    "id",
    "exclude",
    "remove",
    "rt_minus",
    "rt_plus",
    "mu",
    "muij",
    "sigmaij",
    "pep_new",
    "stan_peptide_id",
    "residual",
    "pep_updated",
    "q-value",
];

/// One row of the alignment table, field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentRow {
    pub sequence: String,
    pub raw_file: String,
    pub retention_time: f64,
    pub pep: f64,
    pub exp_id: usize,
    pub peptide_id: usize,
    pub input_id: usize,
    pub id: usize,
    pub exclude: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentTable {
    pub rows: Vec<AlignmentRow>,
}

impl AlignmentTable {
    /// Builds the table according to the exclusion policy.
    ///
    /// Under [`ExclusionPolicy::Remove`] flagged rows are dropped and the ids
    /// re-ranked over the survivors, `exclude` then marks low confidence rows.
    pub fn build(table: &PsmTable, policy: ExclusionPolicy, pep_threshold: f64) -> Self {
        let mut rows: Vec<AlignmentRow> = match policy {
            ExclusionPolicy::Exclude => table
                .psms
                .iter()
                .map(|p| AlignmentRow {
                    sequence: p.sequence.clone(),
                    raw_file: p.raw_file.clone(),
                    retention_time: p.retention_time,
                    pep: p.pep,
                    exp_id: p.exp_id,
                    peptide_id: p.peptide_id,
                    input_id: p.input_id,
                    id: p.id,
                    exclude: p.flagged,
                })
                .collect(),
            ExclusionPolicy::Remove => {
                let survivors: Vec<_> = table.psms.iter().filter(|p| !p.flagged).cloned().collect();
                info!(
                    "Removing {} flagged PSMs, {} remain",
                    table.len() - survivors.len(),
                    survivors.len()
                );
                let reranked = PsmTable::new(survivors, table.columns());
                reranked
                    .psms
                    .into_iter()
                    .map(|p| AlignmentRow {
                        exclude: p.pep >= pep_threshold,
                        sequence: p.sequence,
                        raw_file: p.raw_file,
                        retention_time: p.retention_time,
                        pep: p.pep,
                        exp_id: p.exp_id,
                        peptide_id: p.peptide_id,
                        input_id: p.input_id,
                        id: p.id,
                    })
                    .collect()
            }
        };
        rows.sort_by_key(|r| (r.peptide_id, r.exp_id));
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows coming from one input file, in table order.
    pub fn rows_for_input(&self, input_id: usize) -> impl Iterator<Item = &AlignmentRow> {
        self.rows.iter().filter(move |r| r.input_id == input_id)
    }
}

/// The original input rows with the run's flag attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotatedInput {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn bool_cell(x: bool) -> String {
    let out = if x { "true" } else { "false" };
    out.to_string()
}

impl AnnotatedInput {
    /// Rows dropped during conversion are reported as flagged.
    pub fn build(raw_tables: &[RawTable], output: &PipelineOutput, policy: ExclusionPolicy) -> Self {
        let total: usize = raw_tables.iter().map(|t| t.len()).sum();
        let mut flags = vec![true; total];
        for psm in output.table.psms.iter() {
            if let Some(flag) = flags.get_mut(psm.id) {
                *flag = psm.flagged;
            }
        }

        let mut headers: Vec<String> = Vec::new();
        let mut dropped: BTreeSet<&str> = BTreeSet::new();
        for t in raw_tables.iter() {
            for h in t.headers.iter() {
                if DERIVED_COLUMNS.contains(&h) {
                    dropped.insert(h);
                } else if !headers.iter().any(|x| x == h) {
                    headers.push(h.to_string());
                }
            }
        }
        if !dropped.is_empty() {
            warn!(
                "Columns {:?} already exist in the input and will be overwritten",
                dropped
            );
        }

        let mut rows = Vec::with_capacity(total);
        let mut id = 0;
        for t in raw_tables.iter() {
            let positions: Vec<Option<usize>> = headers.iter().map(|h| t.column_index(h)).collect();
            for record in t.rows.iter() {
                let mut row: Vec<String> = positions
                    .iter()
                    .map(|p| {
                        p.and_then(|i| record.get(i))
                            .unwrap_or("")
                            .to_string()
                    })
                    .collect();
                row.push(t.input_id.to_string());
                row.push(id.to_string());
                row.push(bool_cell(flags[id]));
                rows.push(row);
                id += 1;
            }
        }

        headers.push("input_id".to_string());
        headers.push("id".to_string());
        headers.push(policy.flag_column().to_string());
        Self { headers, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{
        ClassifierMethod,
        ClassifierReport,
    };
    use crate::models::Psm;

    fn table() -> PsmTable {
        let mut psms = vec![
            Psm::new(0, "BBB", "b", 10.0, 0.6),
            Psm::new(1, "AAA", "b", 11.0, 0.01),
            Psm::new(2, "CCC", "a", 12.0, 0.01),
            Psm::new(3, "AAA", "a", 13.0, 0.02),
            Psm::new(4, "CCC", "c", 14.0, 0.01),
        ];
        psms[2].flagged = true;
        PsmTable::new(psms, [])
    }

    fn keys(t: &AlignmentTable) -> Vec<(usize, usize, usize)> {
        t.rows.iter().map(|r| (r.peptide_id, r.exp_id, r.id)).collect()
    }

    #[test]
    fn test_exclude_policy_keeps_rows_sorted() {
        let out = AlignmentTable::build(&table(), ExclusionPolicy::Exclude, 0.5);
        // peptides: BBB 0, AAA 1, CCC 2; experiments: a 0, b 1, c 2
        assert_eq!(
            keys(&out),
            vec![(0, 1, 0), (1, 0, 3), (1, 1, 1), (2, 0, 2), (2, 2, 4)]
        );
        let excluded: Vec<usize> = out.rows.iter().filter(|r| r.exclude).map(|r| r.id).collect();
        assert_eq!(excluded, vec![2]);
    }

    #[test]
    fn test_remove_policy_reranks() {
        let out = AlignmentTable::build(&table(), ExclusionPolicy::Remove, 0.5);
        // Every experiment still has a survivor, only the flagged row is gone.
        assert_eq!(keys(&out), vec![(0, 1, 0), (1, 0, 3), (1, 1, 1), (2, 2, 4)]);
        // Survivor with pep above threshold is marked
        let excluded: Vec<usize> = out.rows.iter().filter(|r| r.exclude).map(|r| r.id).collect();
        assert_eq!(excluded, vec![0]);

        let mut t = table();
        t.apply_mask(&[false, false, false, true, false]);
        let out = AlignmentTable::build(&t, ExclusionPolicy::Remove, 0.5);
        // Experiment "a" vanishes, "b" and "c" shift down.
        assert_eq!(keys(&out), vec![(0, 0, 0), (1, 0, 1), (2, 1, 4)]);
    }

    #[test]
    fn test_stale_alignment_columns_are_dropped() {
        let raw = vec![RawTable::new(
            0,
            ["seq", "mu", "pep_new", "q-value", "residual"],
            [["AAA", "12.5", "0.001", "0.01", "0.3"]],
        )];
        let output = PipelineOutput {
            table: PsmTable::new(vec![Psm::new(0, "AAA", "a", 1.0, 0.01)], []),
            dropped_ids: vec![],
            classifier: ClassifierReport {
                method: ClassifierMethod::Skipped,
                num_qualifying: 0,
                auc: None,
                inverted: false,
                cutoff: None,
                flagged_peptides: vec![],
            },
        };
        let annotated = AnnotatedInput::build(&raw, &output, ExclusionPolicy::Exclude);
        assert_eq!(annotated.headers, vec!["seq", "input_id", "id", "exclude"]);
        assert_eq!(annotated.rows, vec![vec!["AAA", "0", "0", "false"]]);
    }

    #[test]
    fn test_annotated_input() {
        let raw = vec![
            RawTable::new(0, ["seq", "pep", "exclude"], [["AAA", "0.01", "x"], ["BBB", "", "x"]]),
            RawTable::new(1, ["pep", "seq", "extra"], [["0.02", "CCC", "e"]]),
        ];
        let mut psms = vec![
            Psm::new(0, "AAA", "a", 1.0, 0.01),
            Psm::new(2, "CCC", "b", 1.0, 0.02),
        ];
        psms[1].input_id = 1;
        psms[1].flagged = true;
        let output = PipelineOutput {
            table: PsmTable::new(psms, []),
            dropped_ids: vec![1],
            classifier: ClassifierReport {
                method: ClassifierMethod::Skipped,
                num_qualifying: 0,
                auc: None,
                inverted: false,
                cutoff: None,
                flagged_peptides: vec![],
            },
        };
        let annotated = AnnotatedInput::build(&raw, &output, ExclusionPolicy::Remove);
        assert_eq!(
            annotated.headers,
            vec!["seq", "pep", "extra", "input_id", "id", "remove"]
        );
        assert_eq!(
            annotated.rows,
            vec![
                vec!["AAA", "0.01", "", "0", "0", "false"],
                vec!["BBB", "", "", "0", "1", "true"],
                vec!["CCC", "0.02", "e", "1", "2", "true"],
            ]
        );
    }
}
