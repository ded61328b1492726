//! `inventa-io`: reading sources and talking to the SQLite store.

pub mod backup;
pub mod error;
pub mod export;
pub mod sheet;
pub mod source;
pub mod sqlite;
pub mod text;

pub use backup::{list_backups, BackupEntry, SqliteBackup};
pub use error::{ExportError, SourceError};
pub use source::{probe_format, TabularSource};
pub use sqlite::SqliteGateway;
