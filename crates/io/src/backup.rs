// Point-in-time copies of the SQLite store

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, DatabaseName, OpenFlags};
use serde::Serialize;
use tracing::info;

use inventa_recon::{BackupCoordinator, BackupError, BackupHandle};

const PREFIX: &str = "inventa_backup_";

/// Copies the whole database file into `dir` with SQLite's online backup,
/// so the copy is consistent even if another connection is writing.
#[derive(Debug, Clone)]
pub struct SqliteBackup {
    db_path: PathBuf,
    dir: PathBuf,
}

impl SqliteBackup {
    pub fn new(db_path: impl Into<PathBuf>, dir: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `inventa_backup_YYYYmmdd_HHMMSS.db`, suffixed when a backup with the
    /// same second already exists.
    fn target_path(&self, now: DateTime<Utc>) -> PathBuf {
        let stem = format!("{PREFIX}{}", now.format("%Y%m%d_%H%M%S"));
        let mut candidate = self.dir.join(format!("{stem}.db"));
        let mut n = 1;
        while candidate.exists() {
            candidate = self.dir.join(format!("{stem}_{n}.db"));
            n += 1;
        }
        candidate
    }
}

impl BackupCoordinator for SqliteBackup {
    fn snapshot(&mut self) -> Result<BackupHandle, BackupError> {
        if !self.db_path.exists() {
            return Err(BackupError::new(format!(
                "database {} does not exist",
                self.db_path.display()
            )));
        }
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| BackupError::new(format!("cannot create {}: {e}", self.dir.display())))?;

        let created_at = Utc::now();
        let target = self.target_path(created_at);

        let src = Connection::open_with_flags(&self.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| BackupError::new(format!("cannot open {}: {e}", self.db_path.display())))?;
        src.backup(DatabaseName::Main, &target, None)
            .map_err(|e| BackupError::new(format!("cannot write {}: {e}", target.display())))?;

        info!(path = %target.display(), "database backed up");
        Ok(BackupHandle {
            path: target,
            created_at,
        })
    }
}

/// A backup file found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupEntry {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Backups in `dir`, newest name first. A missing directory has none.
pub fn list_backups(dir: &Path) -> std::io::Result<Vec<BackupEntry>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut backups = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(PREFIX) || !name.ends_with(".db") {
            continue;
        }
        let meta = entry.metadata()?;
        backups.push(BackupEntry {
            path: entry.path(),
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        });
    }
    backups.sort_by(|a, b| b.path.cmp(&a.path));
    Ok(backups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE inventory (id INTEGER PRIMARY KEY, laboratory TEXT, name TEXT, presentation TEXT, price REAL, stock INTEGER);
             INSERT INTO inventory (laboratory, name, presentation, price, stock) VALUES ('ACME', 'Paracetamol', 'Caja', 0, 5);",
        )
        .unwrap();
    }

    #[test]
    fn snapshot_copies_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("catalog.db");
        make_db(&db);

        let mut backup = SqliteBackup::new(&db, dir.path().join("backups"));
        let handle = backup.snapshot().unwrap();
        assert!(handle.path.exists());

        let copy = Connection::open(&handle.path).unwrap();
        let n: i64 = copy.query_row("SELECT COUNT(*) FROM inventory", [], |r| r.get(0)).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn same_second_gets_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("catalog.db");
        make_db(&db);

        let mut backup = SqliteBackup::new(&db, dir.path().join("backups"));
        let first = backup.snapshot().unwrap();
        let second = backup.snapshot().unwrap();
        assert_ne!(first.path, second.path);

        let listed = list_backups(backup.dir()).unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn missing_database_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut backup = SqliteBackup::new(dir.path().join("none.db"), dir.path().join("backups"));
        assert!(backup.snapshot().is_err());
    }

    #[test]
    fn unwritable_target_fails() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("catalog.db");
        make_db(&db);
        // A file where the backup directory should be
        let blocker = dir.path().join("backups");
        std::fs::write(&blocker, b"not a dir").unwrap();

        let mut backup = SqliteBackup::new(&db, &blocker);
        let err = backup.snapshot().unwrap_err();
        assert!(err.to_string().contains("cannot create"));
    }

    #[test]
    fn list_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("inventa_backup_20260101_000000.db"), b"x").unwrap();
        let listed = list_backups(dir.path()).unwrap();
        assert_eq!(listed.len(), 1);
        assert!(list_backups(&dir.path().join("missing")).unwrap().is_empty());
    }
}
