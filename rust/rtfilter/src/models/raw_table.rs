use csv::StringRecord;
use std::path::PathBuf;

/// One input file exactly as it was read, before any conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Index of the file in the configured input list.
    pub input_id: usize,
    pub path: Option<PathBuf>,
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
}

impl RawTable {
    pub fn new<H, R, C>(input_id: usize, headers: H, rows: R) -> Self
    where
        H: IntoIterator,
        H::Item: AsRef<str>,
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let headers: StringRecord = headers.into_iter().collect();
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().collect::<StringRecord>())
            .collect();
        Self {
            input_id,
            path: None,
            headers,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// File stem used to name per-input outputs.
    pub fn stem(&self) -> String {
        self.path
            .as_ref()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("input_{}", self.input_id))
    }
}
