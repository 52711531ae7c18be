//! Dense integer ids for experiments and peptides.
//!
//! Experiments are ranked by the lexicographic order of their raw file name,
//! peptides by the order in which their sequence first shows up in the
//! merged table. Downstream alignment relies on exactly this numbering.

use std::collections::{
    BTreeMap,
    HashMap,
};

use crate::models::PsmTable;

/// Rank of every distinct value under lexicographic sort.
pub fn sorted_ranks<'a>(values: impl Iterator<Item = &'a str>) -> BTreeMap<&'a str, usize> {
    let mut ranks: BTreeMap<&str, usize> = values.map(|v| (v, 0)).collect();
    for (i, (_, rank)) in ranks.iter_mut().enumerate() {
        *rank = i;
    }
    ranks
}

/// Rank of every distinct value under first appearance.
pub fn first_appearance_ranks<'a>(values: impl Iterator<Item = &'a str>) -> HashMap<&'a str, usize> {
    let mut ranks = HashMap::new();
    for v in values {
        let next = ranks.len();
        ranks.entry(v).or_insert(next);
    }
    ranks
}

/// Assigns `exp_id` and `peptide_id` to every row of the table.
pub fn assign_ids(table: &mut PsmTable) {
    let (exp_ids, peptide_ids, num_exps, num_peptides) = {
        let exp_ranks = sorted_ranks(table.psms.iter().map(|p| p.raw_file.as_str()));
        let peptide_ranks =
            first_appearance_ranks(table.psms.iter().map(|p| p.sequence.as_str()));

        let exp_ids: Vec<usize> = table
            .psms
            .iter()
            .map(|p| exp_ranks[p.raw_file.as_str()])
            .collect();
        let peptide_ids: Vec<usize> = table
            .psms
            .iter()
            .map(|p| peptide_ranks[p.sequence.as_str()])
            .collect();
        (exp_ids, peptide_ids, exp_ranks.len(), peptide_ranks.len())
    };

    for ((psm, exp_id), peptide_id) in table
        .psms
        .iter_mut()
        .zip(exp_ids.into_iter())
        .zip(peptide_ids.into_iter())
    {
        psm.exp_id = exp_id;
        psm.peptide_id = peptide_id;
    }
    table.set_id_counts(num_exps, num_peptides);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Psm;

    #[test]
    fn test_exp_ids_are_lexicographic() {
        let psms = vec![
            Psm::new(0, "PEPA", "run_c", 1.0, 0.01),
            Psm::new(1, "PEPB", "run_a", 1.0, 0.01),
            Psm::new(2, "PEPA", "run_b", 1.0, 0.01),
            Psm::new(3, "PEPC", "run_a", 1.0, 0.01),
        ];
        let table = PsmTable::new(psms, []);
        let exp_ids: Vec<usize> = table.psms.iter().map(|p| p.exp_id).collect();
        assert_eq!(exp_ids, vec![2, 0, 1, 0]);
        assert_eq!(table.num_experiments(), 3);
    }

    #[test]
    fn test_peptide_ids_follow_first_appearance() {
        let psms = vec![
            Psm::new(0, "ZZZ", "run_a", 1.0, 0.01),
            Psm::new(1, "AAA", "run_a", 1.0, 0.01),
            Psm::new(2, "ZZZ", "run_b", 1.0, 0.01),
            Psm::new(3, "MMM", "run_b", 1.0, 0.01),
        ];
        let table = PsmTable::new(psms, []);
        let peptide_ids: Vec<usize> = table.psms.iter().map(|p| p.peptide_id).collect();
        assert_eq!(peptide_ids, vec![0, 1, 0, 2]);
        assert_eq!(table.num_peptides(), 3);
    }

    #[test]
    fn test_exp_ids_independent_of_input_order() {
        let forward = vec![
            Psm::new(0, "A", "x2", 1.0, 0.01),
            Psm::new(1, "B", "x10", 1.0, 0.01),
            Psm::new(2, "C", "x1", 1.0, 0.01),
        ];
        let mut backward = forward.clone();
        backward.reverse();

        let forward = PsmTable::new(forward, []);
        let backward = PsmTable::new(backward, []);
        for psm in forward.psms.iter() {
            let other = backward.psms.iter().find(|p| p.id == psm.id).unwrap();
            assert_eq!(psm.exp_id, other.exp_id);
        }
        // "x1" < "x10" < "x2" as strings
        let by_file: BTreeMap<&str, usize> = forward
            .psms
            .iter()
            .map(|p| (p.raw_file.as_str(), p.exp_id))
            .collect();
        assert_eq!(by_file["x1"], 0);
        assert_eq!(by_file["x10"], 1);
        assert_eq!(by_file["x2"], 2);
    }
}
