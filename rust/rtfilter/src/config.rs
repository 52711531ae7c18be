use serde::{
    Deserialize,
    Serialize,
};
use std::path::PathBuf;

use crate::errors::RtFilterError;

/// Top level configuration of a filtering run.
///
/// Every field except `col_names` has a default, so a minimal config
/// only needs the column mapping and the input files.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RtFilterConfig {
    #[serde(default)]
    pub input: Vec<PathBuf>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default = "default_sep")]
    pub sep: char,
    #[serde(default)]
    pub low_memory: bool,
    pub col_names: ColumnNames,
    #[serde(default)]
    pub use_unmodified_sequence: bool,
    #[serde(default)]
    pub add_charge_to_sequence: bool,
    #[serde(default = "default_pep_threshold")]
    pub pep_threshold: f64,
    #[serde(default = "default_num_experiments")]
    pub num_experiments: usize,
    #[serde(default = "default_min_psms_per_experiment")]
    pub min_psms_per_experiment: usize,
    #[serde(default)]
    pub protein_decoy_tag: Option<String>,
    #[serde(default)]
    pub policy: ExclusionPolicy,
    #[serde(default)]
    pub strictness: Strictness,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
}

fn default_sep() -> char {
    '\t'
}

fn default_pep_threshold() -> f64 {
    0.5
}

fn default_num_experiments() -> usize {
    3
}

fn default_min_psms_per_experiment() -> usize {
    50
}

/// Source column names for every canonical field.
///
/// `None` means the field is not available in the input and will be
/// omitted from the working table.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ColumnNames {
    #[serde(default)]
    pub sequence: Option<String>,
    #[serde(default)]
    pub modified_sequence: Option<String>,
    #[serde(default)]
    pub raw_file: Option<String>,
    #[serde(default)]
    pub retention_time: Option<String>,
    #[serde(default)]
    pub retention_length: Option<String>,
    #[serde(default)]
    pub pep: Option<String>,
    #[serde(default)]
    pub proteins: Option<String>,
    #[serde(default)]
    pub leading_protein: Option<String>,
    #[serde(default)]
    pub charge: Option<String>,
    /// Pre-computed removal flag. When set, the configured filters are skipped.
    #[serde(default)]
    pub remove: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OutputConfig {
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub save_combined_output: bool,
    #[serde(default = "default_combined_output_name")]
    pub combined_output_name: String,
    #[serde(default)]
    pub save_separate_output: bool,
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
    #[serde(default)]
    pub save_annotated_input: bool,
    #[serde(default = "default_annotated_input_name")]
    pub annotated_input_name: String,
}

fn default_true() -> bool {
    true
}

fn default_combined_output_name() -> String {
    "converted.txt".to_string()
}

fn default_output_suffix() -> String {
    "_converted".to_string()
}

fn default_annotated_input_name() -> String {
    "annotated_input.txt".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            save_combined_output: true,
            combined_output_name: default_combined_output_name(),
            save_separate_output: false,
            output_suffix: default_output_suffix(),
            save_annotated_input: false,
            annotated_input_name: default_annotated_input_name(),
        }
    }
}

/// What happens to flagged rows when the alignment table is assembled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionPolicy {
    /// Keep every row, the flag is written as the `exclude` column.
    #[default]
    Exclude,
    /// Drop flagged rows and re-rank the ids over the survivors.
    Remove,
}

impl ExclusionPolicy {
    pub fn flag_column(&self) -> &'static str {
        match self {
            ExclusionPolicy::Exclude => "exclude",
            ExclusionPolicy::Remove => "remove",
        }
    }
}

impl std::fmt::Display for ExclusionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.flag_column())
    }
}

/// How out-of-range filter parameters are handled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Abort the run with a configuration error.
    #[default]
    Strict,
    /// Log a warning and skip the filter.
    Lenient,
}

/// A single entry of the configured filter list.
///
/// All parameters are optional at parse time, a missing parameter
/// makes the filter a no-op with a warning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum FilterSpec {
    ExcludeFilename {
        #[serde(default)]
        expr: Option<String>,
    },
    IncludeFilename {
        #[serde(default)]
        expr: Option<String>,
    },
    UniprotExclusion {
        #[serde(default)]
        file: Option<PathBuf>,
        #[serde(default)]
        list: Vec<String>,
    },
    Contaminant {
        #[serde(default)]
        tag: Option<String>,
    },
    Decoy {
        #[serde(default)]
        tag: Option<String>,
    },
    RetentionLength {
        #[serde(default)]
        value: Option<f64>,
        #[serde(default)]
        dynamic: Option<bool>,
    },
    Smears {
        #[serde(default)]
        value: Option<f64>,
        #[serde(default)]
        dynamic: Option<bool>,
    },
    NumExps {
        #[serde(default)]
        value: Option<usize>,
    },
    Pep {
        #[serde(default)]
        value: Option<f64>,
    },
}

impl RtFilterConfig {
    /// Config with the given column mapping and every other setting at its default.
    pub fn with_columns(col_names: ColumnNames) -> Self {
        Self {
            input: Vec::new(),
            output: OutputConfig::default(),
            sep: default_sep(),
            low_memory: false,
            col_names,
            use_unmodified_sequence: false,
            add_charge_to_sequence: false,
            pep_threshold: default_pep_threshold(),
            num_experiments: default_num_experiments(),
            min_psms_per_experiment: default_min_psms_per_experiment(),
            protein_decoy_tag: None,
            policy: ExclusionPolicy::default(),
            strictness: Strictness::default(),
            filters: Vec::new(),
        }
    }

    /// A MaxQuant `evidence.txt` flavoured template.
    pub fn template() -> Self {
        let mut config = Self::with_columns(ColumnNames {
            sequence: Some("Sequence".to_string()),
            modified_sequence: Some("Modified sequence".to_string()),
            raw_file: Some("Raw file".to_string()),
            retention_time: Some("Retention time".to_string()),
            retention_length: Some("Retention length".to_string()),
            pep: Some("PEP".to_string()),
            proteins: Some("Proteins".to_string()),
            leading_protein: Some("Leading razor protein".to_string()),
            charge: Some("Charge".to_string()),
            remove: None,
        });
        config.input = vec![PathBuf::from("evidence.txt")];
        config.output.directory = Some(PathBuf::from("rtfilter_out"));
        config.protein_decoy_tag = Some("REV__".to_string());
        config.filters = vec![
            FilterSpec::Contaminant {
                tag: Some("CON__".to_string()),
            },
            FilterSpec::RetentionLength {
                value: Some(0.01),
                dynamic: Some(true),
            },
            FilterSpec::Smears {
                value: Some(0.01),
                dynamic: Some(true),
            },
        ];
        config
    }

    /// The delimiter as a single byte, the csv reader only accepts ascii delimiters.
    pub fn delimiter(&self) -> Result<u8, RtFilterError> {
        if self.sep.is_ascii() {
            Ok(self.sep as u8)
        } else {
            Err(RtFilterError::config(
                "sep",
                format!("Delimiter {:?} is not a single ascii character", self.sep),
            ))
        }
    }

    /// Checks that do not depend on the data.
    pub fn validate(&self) -> Result<(), RtFilterError> {
        self.delimiter()?;
        if !(self.pep_threshold > 0.0 && self.pep_threshold <= 1.0) {
            return Err(RtFilterError::config(
                "pep_threshold",
                format!(
                    "PEP threshold {} must be a number in (0, 1]",
                    self.pep_threshold
                ),
            ));
        }
        if self.num_experiments < 1 {
            return Err(RtFilterError::config(
                "num_experiments",
                "Please provide an integer greater than or equal to 1",
            ));
        }
        if !self.use_unmodified_sequence && self.col_names.modified_sequence.is_none() {
            return Err(RtFilterError::config(
                "col_names.modified_sequence",
                "Modified sequence selected but no modified sequence column is configured. Set \"use_unmodified_sequence\" or provide the column.",
            ));
        }
        if self.use_unmodified_sequence && self.col_names.sequence.is_none() {
            return Err(RtFilterError::config(
                "col_names.sequence",
                "Unmodified sequence selected but no sequence column is configured.",
            ));
        }
        Ok(())
    }
}
