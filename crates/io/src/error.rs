use std::path::PathBuf;

use thiserror::Error;

/// File-level failures. Anything recoverable by skipping a row or leaving a
/// field unresolved never becomes a `LoadError`.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open workbook {}: {message}", path.display())]
    Workbook { path: PathBuf, message: String },

    #[error("malformed delimited file {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("unsupported file type: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("{} contains no sheets", path.display())]
    NoSheets { path: PathBuf },

    #[error("{} contains no rows", path.display())]
    NoRows { path: PathBuf },
}

impl LoadError {
    /// Machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Workbook { .. } => "workbook",
            Self::Csv { .. } => "csv",
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::NoSheets { .. } => "no_sheets",
            Self::NoRows { .. } => "no_rows",
        }
    }
}
