use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a source file into rows.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// None of the encodings in the chain decoded the file cleanly.
    #[error("cannot decode {path}: tried {}", tried.join(", "))]
    Encoding { path: PathBuf, tried: Vec<&'static str> },
    #[error("cannot open workbook {path}: {message}")]
    Workbook { path: PathBuf, message: String },
    #[error("workbook {0} has no sheets")]
    NoSheets(PathBuf),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}
