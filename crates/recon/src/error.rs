use serde::Serialize;
use thiserror::Error;

/// Failure reported by a persistence gateway. The whole run fails with it.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct GatewayError(pub String);

impl GatewayError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Failure reported by a backup coordinator. Always aborts before apply.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BackupError(pub String);

impl BackupError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Run-level errors. Any of these aborts the run before the store is touched,
/// or rolls back the single apply transaction.
#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (empty token list, colliding columns, ...).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// Source could not be turned into rows (unreadable, undecodable).
    #[error("source error: {0}")]
    Source(String),
    /// Snapshot could not be taken; nothing was applied.
    #[error("backup failed, nothing applied: {0}")]
    Backup(#[from] BackupError),
    /// Store rejected a load or the apply transaction; nothing was applied.
    #[error("persistence failure, nothing applied: {0}")]
    Persistence(#[from] GatewayError),
}

/// Why a row was dropped. Row problems are counted and reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum MalformedReason {
    /// The text line could not be split into fields.
    Unsplittable(String),
    /// Code column does not start with the required number of digits.
    BadCode(String),
    /// Name missing or not longer than the format minimum.
    ShortName(String),
    /// Brand/model column missing or empty.
    MissingBrand,
    /// Row after the header that is none of product, category, banner, blank.
    Unrecognized(String),
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsplittable(msg) => write!(f, "cannot split line: {msg}"),
            Self::BadCode(code) => write!(f, "invalid product code '{code}'"),
            Self::ShortName(name) => write!(f, "name too short '{name}'"),
            Self::MissingBrand => write!(f, "missing brand/model field"),
            Self::Unrecognized(first) => write!(f, "unrecognized row starting with '{first}'"),
        }
    }
}

/// A dropped row with its source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    pub line: usize,
    pub reason: MalformedReason,
}
