//! Schema conversion from search-engine tables to the canonical [`PsmTable`].

use tracing::{
    debug,
    info,
    warn,
};

use crate::config::RtFilterConfig;
use crate::errors::{
    DataReadingError,
    Result,
    RtFilterError,
};
use crate::models::{
    CanonicalColumn,
    Psm,
    PsmTable,
    RawTable,
};

/// Result of converting all the inputs of a run.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub table: PsmTable,
    /// Ids of rows dropped from the working table (missing PEP).
    pub dropped_ids: Vec<usize>,
    /// Whether the flag was seeded from a pre-computed `remove` column.
    pub seeded_flags: bool,
}

/// Source column index of every canonical field for one input.
#[derive(Debug, Default)]
struct ColumnIndices {
    sequence: usize,
    raw_file: usize,
    retention_time: usize,
    pep: usize,
    retention_length: Option<usize>,
    proteins: Option<usize>,
    leading_protein: Option<usize>,
    charge: Option<usize>,
    remove: Option<usize>,
}

fn is_null(value: &str) -> bool {
    matches!(
        value.trim(),
        "" | "NA" | "N/A" | "NaN" | "nan" | "null" | "NULL" | "None"
    )
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "t"
    )
}

fn parse_f64(value: &str, column: &str, row: usize) -> Result<Option<f64>> {
    if is_null(value) {
        return Ok(None);
    }
    match value.trim().parse::<f64>() {
        Ok(x) if x.is_nan() => Ok(None),
        Ok(x) => Ok(Some(x)),
        Err(_) => Err(DataReadingError::UnparseableValue {
            column: column.to_string(),
            value: value.to_string(),
            row,
        }
        .into()),
    }
}

fn required_f64(value: &str, column: &str, row: usize) -> Result<f64> {
    match parse_f64(value, column, row)? {
        Some(x) => Ok(x),
        None => Err(DataReadingError::UnparseableValue {
            column: column.to_string(),
            value: value.to_string(),
            row,
        }
        .into()),
    }
}

/// Charges are often written as floats ("2.0"), normalize them to integers.
fn parse_charge(value: &str, column: &str, row: usize) -> Result<Option<i32>> {
    match parse_f64(value, column, row)? {
        Some(x) if x.fract() == 0.0 => Ok(Some(x as i32)),
        Some(_) => Err(DataReadingError::UnparseableValue {
            column: column.to_string(),
            value: value.to_string(),
            row,
        }
        .into()),
        None => Ok(None),
    }
}

fn optional_string(value: &str) -> Option<String> {
    if is_null(value) {
        None
    } else {
        Some(value.to_string())
    }
}

fn resolve(
    raw: &RawTable,
    key: &'static str,
    column: &Option<String>,
) -> Result<Option<usize>> {
    match column {
        None => {
            debug!(
                "Column \"{}\" is left empty in the config file. Skipping...",
                key
            );
            Ok(None)
        }
        Some(name) => match raw.column_index(name) {
            Some(idx) => Ok(Some(idx)),
            None => Err(RtFilterError::config(
                format!("col_names.{}", key),
                format!(
                    "Column \"{}\" not found in input file #{}. Please check that this column exists, or leave the field for {} empty in the config file.",
                    name, raw.input_id, key
                ),
            )),
        },
    }
}

fn resolve_required(
    raw: &RawTable,
    key: &'static str,
    column: &Option<String>,
) -> Result<usize> {
    match resolve(raw, key, column)? {
        Some(idx) => Ok(idx),
        None => Err(RtFilterError::config(
            format!("col_names.{}", key),
            format!("The canonical field {} is required but not configured", key),
        )),
    }
}

impl ColumnIndices {
    fn resolve(raw: &RawTable, config: &RtFilterConfig) -> Result<Self> {
        let names = &config.col_names;
        let sequence = if config.use_unmodified_sequence {
            resolve_required(raw, "sequence", &names.sequence)?
        } else {
            resolve_required(raw, "modified_sequence", &names.modified_sequence)?
        };

        Ok(Self {
            sequence,
            raw_file: resolve_required(raw, "raw_file", &names.raw_file)?,
            retention_time: resolve_required(raw, "retention_time", &names.retention_time)?,
            pep: resolve_required(raw, "pep", &names.pep)?,
            retention_length: resolve(raw, "retention_length", &names.retention_length)?,
            proteins: resolve(raw, "proteins", &names.proteins)?,
            leading_protein: resolve(raw, "leading_protein", &names.leading_protein)?,
            charge: resolve(raw, "charge", &names.charge)?,
            remove: resolve(raw, "remove", &names.remove)?,
        })
    }
}

/// Canonical columns the configuration promises for every input.
fn configured_columns(config: &RtFilterConfig) -> Vec<CanonicalColumn> {
    let names = &config.col_names;
    let mut out = Vec::new();
    if names.retention_length.is_some() {
        out.push(CanonicalColumn::RetentionLength);
    }
    if names.proteins.is_some() {
        out.push(CanonicalColumn::Proteins);
    }
    if names.leading_protein.is_some() {
        out.push(CanonicalColumn::LeadingProtein);
    }
    if names.charge.is_some() {
        out.push(CanonicalColumn::Charge);
    }
    if names.remove.is_some() {
        out.push(CanonicalColumn::Remove);
    }
    out
}

/// Converts every input into one working table.
///
/// Rows get their `id` from their position in the concatenated inputs, so
/// the ids line up with the rows of the original tables. Rows without a
/// PEP are dropped here and reported in [`Conversion::dropped_ids`], any
/// other PEP value is kept.
pub fn convert(raw_tables: &[RawTable], config: &RtFilterConfig) -> Result<Conversion> {
    if config.use_unmodified_sequence {
        info!("Using unmodified peptide sequence instead of modified peptide sequence");
    }
    let add_charge = config.add_charge_to_sequence && config.col_names.charge.is_some();
    if add_charge {
        info!("Appending charge to peptide sequence, to align different charge states separately.");
    } else if config.add_charge_to_sequence {
        warn!("\"add_charge_to_sequence\" is set but no charge column is configured. Ignoring.");
    }

    let mut psms = Vec::new();
    let mut dropped_ids = Vec::new();
    let mut out_of_range = 0;
    let mut next_id = 0;

    for raw in raw_tables.iter() {
        info!(
            "Converting input #{} ({} PSMs)...",
            raw.input_id,
            raw.len()
        );
        let idx = ColumnIndices::resolve(raw, config)?;
        let headers = &raw.headers;

        for (row_num, row) in raw.rows.iter().enumerate() {
            let id = next_id;
            next_id += 1;
            let field = |i: usize| row.get(i).unwrap_or("");

            let pep = parse_f64(field(idx.pep), &headers[idx.pep], row_num)?;
            let pep = match pep {
                Some(p) => {
                    if p <= 0.0 || p > 1.0 {
                        out_of_range += 1;
                    }
                    p
                }
                None => {
                    dropped_ids.push(id);
                    continue;
                }
            };

            let charge = match idx.charge {
                Some(i) => parse_charge(field(i), &headers[i], row_num)?,
                None => None,
            };
            let mut sequence = field(idx.sequence).to_string();
            if add_charge {
                if let Some(z) = charge {
                    sequence = format!("{}_{}", sequence, z);
                }
            }

            let retention_length = match idx.retention_length {
                Some(i) => parse_f64(field(i), &headers[i], row_num)?,
                None => None,
            };

            psms.push(Psm {
                id,
                input_id: raw.input_id,
                sequence,
                raw_file: field(idx.raw_file).to_string(),
                retention_time: required_f64(
                    field(idx.retention_time),
                    &headers[idx.retention_time],
                    row_num,
                )?,
                retention_length,
                pep,
                proteins: idx.proteins.and_then(|i| optional_string(field(i))),
                leading_protein: idx.leading_protein.and_then(|i| optional_string(field(i))),
                charge,
                exp_id: 0,
                peptide_id: 0,
                flagged: idx.remove.map(|i| is_truthy(field(i))).unwrap_or(false),
            });
        }
    }

    if !dropped_ids.is_empty() {
        info!("Removing {} PSMs with no PEP entry.", dropped_ids.len());
    }
    if out_of_range > 0 {
        warn!(
            "{} PSMs have a PEP outside of (0, 1], they are kept as they are.",
            out_of_range
        );
    }

    let table = PsmTable::new(psms, configured_columns(config));
    info!(
        "{} PSMs loaded from {} input file(s): {} experiments, {} peptide sequences",
        table.len(),
        raw_tables.len(),
        table.num_experiments(),
        table.num_peptides()
    );

    Ok(Conversion {
        table,
        dropped_ids,
        seeded_flags: config.col_names.remove.is_some(),
    })
}
