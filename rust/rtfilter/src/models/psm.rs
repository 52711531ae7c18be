use std::collections::BTreeSet;

/// Canonical fields a working table can carry.
///
/// `Sequence`, `RawFile`, `RetentionTime` and `Pep` are always present
/// after conversion, the rest depend on the column mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalColumn {
    Sequence,
    RawFile,
    RetentionTime,
    RetentionLength,
    Pep,
    Proteins,
    LeadingProtein,
    Charge,
    Remove,
}

impl CanonicalColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalColumn::Sequence => "sequence",
            CanonicalColumn::RawFile => "raw_file",
            CanonicalColumn::RetentionTime => "retention_time",
            CanonicalColumn::RetentionLength => "retention_length",
            CanonicalColumn::Pep => "pep",
            CanonicalColumn::Proteins => "proteins",
            CanonicalColumn::LeadingProtein => "leading_protein",
            CanonicalColumn::Charge => "charge",
            CanonicalColumn::Remove => "remove",
        }
    }
}

impl std::fmt::Display for CanonicalColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One peptide-spectrum match of the working dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Psm {
    /// Row index in the merged raw input, stable across the whole run.
    pub id: usize,
    pub input_id: usize,
    pub sequence: String,
    pub raw_file: String,
    pub retention_time: f64,
    pub retention_length: Option<f64>,
    pub pep: f64,
    pub proteins: Option<String>,
    pub leading_protein: Option<String>,
    pub charge: Option<i32>,
    pub exp_id: usize,
    pub peptide_id: usize,
    pub flagged: bool,
}

impl Psm {
    /// Minimal record, mostly useful to build tables by hand.
    pub fn new(
        id: usize,
        sequence: impl Into<String>,
        raw_file: impl Into<String>,
        retention_time: f64,
        pep: f64,
    ) -> Self {
        Self {
            id,
            input_id: 0,
            sequence: sequence.into(),
            raw_file: raw_file.into(),
            retention_time,
            retention_length: None,
            pep,
            proteins: None,
            leading_protein: None,
            charge: None,
            exp_id: 0,
            peptide_id: 0,
            flagged: false,
        }
    }

    pub fn with_retention_length(mut self, retention_length: f64) -> Self {
        self.retention_length = Some(retention_length);
        self
    }

    pub fn with_proteins(mut self, proteins: impl Into<String>) -> Self {
        self.proteins = Some(proteins.into());
        self
    }

    pub fn with_leading_protein(mut self, leading_protein: impl Into<String>) -> Self {
        self.leading_protein = Some(leading_protein.into());
        self
    }

    /// Confident and not yet flagged by any filter.
    pub fn is_confident_unflagged(&self, pep_threshold: f64) -> bool {
        !self.flagged && self.pep < pep_threshold
    }
}

/// The in-memory working dataset.
///
/// Ids are only meaningful after [`crate::ids::assign_ids`] ran.
#[derive(Debug, Clone, Default)]
pub struct PsmTable {
    pub psms: Vec<Psm>,
    columns: BTreeSet<CanonicalColumn>,
    num_experiments: usize,
    num_peptides: usize,
}

impl PsmTable {
    pub fn new(psms: Vec<Psm>, columns: impl IntoIterator<Item = CanonicalColumn>) -> Self {
        let mut columns: BTreeSet<CanonicalColumn> = columns.into_iter().collect();
        columns.extend([
            CanonicalColumn::Sequence,
            CanonicalColumn::RawFile,
            CanonicalColumn::RetentionTime,
            CanonicalColumn::Pep,
        ]);
        let mut out = Self {
            psms,
            columns,
            num_experiments: 0,
            num_peptides: 0,
        };
        crate::ids::assign_ids(&mut out);
        out
    }

    pub fn len(&self) -> usize {
        self.psms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.psms.is_empty()
    }

    pub fn has_column(&self, column: CanonicalColumn) -> bool {
        self.columns.contains(&column)
    }

    pub fn columns(&self) -> impl Iterator<Item = CanonicalColumn> + '_ {
        self.columns.iter().copied()
    }

    pub fn num_experiments(&self) -> usize {
        self.num_experiments
    }

    pub fn num_peptides(&self) -> usize {
        self.num_peptides
    }

    pub(crate) fn set_id_counts(&mut self, num_experiments: usize, num_peptides: usize) {
        self.num_experiments = num_experiments;
        self.num_peptides = num_peptides;
    }

    pub fn flags(&self) -> Vec<bool> {
        self.psms.iter().map(|p| p.flagged).collect()
    }

    pub fn num_flagged(&self) -> usize {
        self.psms.iter().filter(|p| p.flagged).count()
    }

    /// OR a mask into the running flag, returns how many rows were newly flagged.
    ///
    /// # Panics
    /// If the mask is not aligned to the table rows.
    pub fn apply_mask(&mut self, mask: &[bool]) -> usize {
        assert_eq!(
            mask.len(),
            self.psms.len(),
            "Exclusion mask must be aligned to the table rows"
        );
        let mut newly = 0;
        for (psm, &m) in self.psms.iter_mut().zip(mask.iter()) {
            if m && !psm.flagged {
                newly += 1;
            }
            psm.flagged |= m;
        }
        newly
    }

    /// Maximum retention time of every experiment, indexed by exp_id.
    pub fn max_rt_per_experiment(&self) -> Vec<f64> {
        let mut out = vec![f64::NEG_INFINITY; self.num_experiments];
        for psm in self.psms.iter() {
            let curr = &mut out[psm.exp_id];
            *curr = curr.max(psm.retention_time);
        }
        out
    }

    pub fn max_rt(&self) -> f64 {
        self.psms
            .iter()
            .map(|p| p.retention_time)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}
