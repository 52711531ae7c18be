use csv::StringRecord;
use regex::{
    Captures,
    Regex,
};
use std::fs::File;
use std::io::{
    BufReader,
    BufWriter,
    Write,
};
use std::path::{
    Path,
    PathBuf,
};
use tracing::{
    debug,
    info,
};

use crate::config::RtFilterConfig;
use crate::errors::{
    DataReadingError,
    Result,
    RtFilterError,
};
use crate::models::RawTable;
use crate::output::{
    AlignmentRow,
    AlignmentTable,
    AnnotatedInput,
};
use crate::pipeline::PipelineOutput;

pub const ALIGNMENT_COLUMNS: [&str; 9] = [
    "sequence",
    "raw_file",
    "retention_time",
    "pep",
    "exp_id",
    "peptide_id",
    "input_id",
    "id",
    "exclude",
];

/// Expands a leading `~` and `$VAR` / `${VAR}` references.
///
/// Undefined variables are left as they are.
pub fn expand_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let raw = path.as_ref().to_string_lossy();
    let home = std::env::var("HOME").ok();

    let with_home = match (&*raw, home) {
        ("~", Some(home)) => home,
        (x, Some(home)) if x.starts_with("~/") => format!("{}{}", home, &x[1..]),
        (x, _) => x.to_string(),
    };

    let re = Regex::new(r"\$\{(\w+)\}|\$(\w+)")
        .map_err(|e| RtFilterError::regex(e, "path expansion"))?;
    let expanded = re.replace_all(&with_home, |caps: &Captures| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
    });
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Reads one delimited file with a header row.
///
/// With `low_memory` every row is parsed through a single reused record
/// buffer and then copied into the table. Both paths produce the same table,
/// the rows are held in memory either way.
pub fn read_delimited(
    path: &Path,
    input_id: usize,
    delimiter: u8,
    low_memory: bool,
) -> Result<RawTable> {
    let file = File::open(path).map_err(|e| RtFilterError::io_at(e, path))?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(BufReader::new(file));

    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Err(DataReadingError::EmptyInput { input_id }.into());
    }

    let rows = if low_memory {
        let mut rows = Vec::new();
        let mut record = StringRecord::new();
        while rdr.read_record(&mut record)? {
            rows.push(record.clone());
        }
        rows
    } else {
        rdr.records()
            .collect::<std::result::Result<Vec<_>, csv::Error>>()?
    };
    info!(
        "Read {} rows and {} columns from {}",
        rows.len(),
        headers.len(),
        path.display()
    );

    Ok(RawTable {
        input_id,
        path: Some(path.to_path_buf()),
        headers,
        rows,
    })
}

/// Reads every configured input, in order.
pub fn read_inputs(config: &RtFilterConfig) -> Result<Vec<RawTable>> {
    if config.input.is_empty() {
        return Err(RtFilterError::config("input", "No input files provided"));
    }
    let delimiter = config.delimiter()?;
    config
        .input
        .iter()
        .enumerate()
        .map(|(i, p)| read_delimited(&expand_path(p)?, i, delimiter, config.low_memory))
        .collect()
}

fn open_writer(path: &Path, delimiter: u8) -> Result<csv::Writer<BufWriter<File>>> {
    let file = File::create(path).map_err(|e| RtFilterError::io_at(e, path))?;
    Ok(csv::WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_writer(BufWriter::new(file)))
}

pub fn write_alignment_rows<'a, W: Write>(
    wtr: &mut csv::Writer<W>,
    rows: impl Iterator<Item = &'a AlignmentRow>,
) -> Result<usize> {
    wtr.write_record(ALIGNMENT_COLUMNS)?;
    let mut n = 0;
    for row in rows {
        wtr.serialize(row)?;
        n += 1;
    }
    wtr.flush()?;
    Ok(n)
}

pub fn write_annotated<W: Write>(wtr: &mut csv::Writer<W>, annotated: &AnnotatedInput) -> Result<()> {
    wtr.write_record(&annotated.headers)?;
    for row in annotated.rows.iter() {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Assembles every requested output, then writes them under the output directory.
///
/// Returns the written paths.
pub fn write_outputs(
    raw_tables: &[RawTable],
    output: &PipelineOutput,
    config: &RtFilterConfig,
) -> Result<Vec<PathBuf>> {
    let out_config = &config.output;
    let delimiter = config.delimiter()?;
    let dir = match out_config.directory.as_ref() {
        Some(d) => expand_path(d)?,
        None => PathBuf::from("."),
    };

    let alignment = AlignmentTable::build(&output.table, config.policy, config.pep_threshold);
    let annotated = if out_config.save_annotated_input {
        Some(AnnotatedInput::build(raw_tables, output, config.policy))
    } else {
        None
    };

    std::fs::create_dir_all(&dir).map_err(|e| RtFilterError::io_at(e, &dir))?;
    let mut written = Vec::new();

    if out_config.save_combined_output {
        let path = dir.join(&out_config.combined_output_name);
        let mut wtr = open_writer(&path, delimiter)?;
        let n = write_alignment_rows(&mut wtr, alignment.rows.iter())?;
        info!("Saved {} rows of combined output to {}", n, path.display());
        written.push(path);
    }

    if out_config.save_separate_output {
        for raw in raw_tables.iter() {
            let name = format!(
                "{}{}_{}.txt",
                raw.stem(),
                out_config.output_suffix,
                raw.input_id
            );
            let path = dir.join(name);
            let mut wtr = open_writer(&path, delimiter)?;
            let n = write_alignment_rows(&mut wtr, alignment.rows_for_input(raw.input_id))?;
            debug!("Saved {} rows for input #{} to {}", n, raw.input_id, path.display());
            written.push(path);
        }
        info!("Saved separate output for {} inputs", raw_tables.len());
    }

    if let Some(annotated) = annotated {
        let path = dir.join(&out_config.annotated_input_name);
        let mut wtr = open_writer(&path, delimiter)?;
        write_annotated(&mut wtr, &annotated)?;
        info!("Saved annotated input to {}", path.display());
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_path() {
        let untouched = expand_path("data/${RTFILTER_SURELY_UNDEFINED_VAR}/x.txt").unwrap();
        assert_eq!(
            untouched,
            PathBuf::from("data/${RTFILTER_SURELY_UNDEFINED_VAR}/x.txt")
        );
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(
                expand_path("~/evidence.txt").unwrap(),
                PathBuf::from(format!("{}/evidence.txt", home))
            );
            assert_eq!(
                expand_path("$HOME/a").unwrap(),
                expand_path("${HOME}/a").unwrap()
            );
        }
    }

    #[test]
    fn test_read_delimited() {
        let dir = std::env::temp_dir().join("rtfilter_io_read_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("evidence.txt");
        std::fs::write(&path, "Sequence\tPEP\nAAA\t0.01\nBBB\t\n").unwrap();

        let default = read_delimited(&path, 3, b'\t', false).unwrap();
        let low_memory = read_delimited(&path, 3, b'\t', true).unwrap();
        assert_eq!(default, low_memory);
        for table in [default, low_memory] {
            assert_eq!(table.input_id, 3);
            assert_eq!(table.headers, StringRecord::from(vec!["Sequence", "PEP"]));
            assert_eq!(table.len(), 2);
            assert_eq!(table.rows[1].get(1), Some(""));
            assert_eq!(table.stem(), "evidence");
        }

        std::fs::write(&path, "Sequence\tPEP\nAAA\t0.01\textra\n").unwrap();
        assert!(read_delimited(&path, 0, b'\t', false).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = read_delimited(Path::new("/nonexistent/evidence.txt"), 0, b'\t', false)
            .unwrap_err();
        assert!(matches!(err, RtFilterError::Io { path: Some(_), .. }));
    }

    #[test]
    fn test_alignment_header_matches_fields() {
        let row = AlignmentRow {
            sequence: "AAA".to_string(),
            raw_file: "a".to_string(),
            retention_time: 1.5,
            pep: 0.01,
            exp_id: 0,
            peptide_id: 1,
            input_id: 0,
            id: 7,
            exclude: false,
        };
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(vec![]);
        write_alignment_rows(&mut wtr, std::iter::once(&row)).unwrap();
        let text = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "sequence\traw_file\tretention_time\tpep\texp_id\tpeptide_id\tinput_id\tid\texclude\nAAA\ta\t1.5\t0.01\t0\t1\t0\t7\tfalse\n"
        );
    }
}
