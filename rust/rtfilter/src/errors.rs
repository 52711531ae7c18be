use std::path::PathBuf;

#[derive(Debug)]
pub enum DataReadingError {
    CsvError(csv::Error),
    UnparseableValue {
        column: String,
        value: String,
        row: usize,
    },
    EmptyInput {
        input_id: usize,
    },
}

impl std::fmt::Display for DataReadingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataReadingError::CsvError(e) => write!(f, "Error parsing delimited file: {}", e),
            DataReadingError::UnparseableValue { column, value, row } => write!(
                f,
                "Unable to parse value \"{}\" in column \"{}\" (row {})",
                value, column, row
            ),
            DataReadingError::EmptyInput { input_id } => {
                write!(f, "Input file #{} has no header row", input_id)
            }
        }
    }
}

#[derive(Debug)]
pub enum RtFilterError {
    /// Invalid or inconsistent configuration, `key` names the offending config key.
    Config {
        key: String,
        msg: String,
    },
    DataReading(DataReadingError),
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },
    /// `context` names what the expression was built for.
    Regex {
        source: regex::Error,
        context: String,
    },
}

impl RtFilterError {
    pub fn config(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Config {
            key: key.into(),
            msg: msg.into(),
        }
    }

    pub fn io_at(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: Some(path.into()),
        }
    }

    pub fn regex(source: regex::Error, context: impl Into<String>) -> Self {
        Self::Regex {
            source,
            context: context.into(),
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

impl std::fmt::Display for RtFilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RtFilterError::Config { key, msg } => {
                write!(f, "Configuration error in \"{}\": {}", key, msg)
            }
            RtFilterError::DataReading(e) => write!(f, "{}", e),
            RtFilterError::Io { source, path } => match path {
                Some(path) => write!(f, "Error accessing {}: {}", path.display(), source),
                None => write!(f, "IO error: {}", source),
            },
            RtFilterError::Regex { source, context } => {
                write!(f, "Invalid regular expression for {}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for RtFilterError {}

pub type Result<T> = std::result::Result<T, RtFilterError>;

impl From<std::io::Error> for RtFilterError {
    fn from(x: std::io::Error) -> Self {
        Self::Io {
            source: x,
            path: None,
        }
    }
}

impl From<csv::Error> for RtFilterError {
    fn from(x: csv::Error) -> Self {
        Self::DataReading(DataReadingError::CsvError(x))
    }
}

impl From<DataReadingError> for RtFilterError {
    fn from(x: DataReadingError) -> Self {
        Self::DataReading(x)
    }
}
