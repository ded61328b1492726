//! In-process store and backup used for dry runs and tests.

use std::path::PathBuf;

use chrono::Utc;

use inventa_core::{PersistedId, PersistedProduct, ProductRecord};

use crate::error::{BackupError, GatewayError};
use crate::gateway::{BackupCoordinator, BackupHandle, CatalogGateway, CatalogTransaction};

/// Catalog held in a `Vec`. Transactions work on a copy and swap it in on
/// commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    rows: Vec<PersistedProduct>,
    next_id: PersistedId,
    /// Make the next transaction's inserts fail, to exercise rollback.
    pub fail_inserts: bool,
    pub fail_load: bool,
    commits: usize,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    /// Pre-populate with stored rows; ids are assigned in order.
    pub fn with_products(products: &[(&str, &str, &str, i64)]) -> Self {
        let mut gw = Self::new();
        for &(laboratory, name, presentation, stock) in products {
            gw.rows.push(PersistedProduct {
                id: gw.next_id,
                laboratory: laboratory.to_string(),
                name: name.to_string(),
                presentation: presentation.to_string(),
                price: 0.0,
                stock,
            });
            gw.next_id += 1;
        }
        gw
    }

    pub fn rows(&self) -> &[PersistedProduct] {
        &self.rows
    }

    /// Mutate stored rows directly, the way another process sharing the
    /// store would.
    pub fn rows_mut(&mut self) -> &mut [PersistedProduct] {
        &mut self.rows
    }

    pub fn commits(&self) -> usize {
        self.commits
    }
}

impl CatalogGateway for MemoryGateway {
    type Tx<'a> = MemoryTransaction<'a>;

    fn load_all(&self) -> Result<Vec<PersistedProduct>, GatewayError> {
        if self.fail_load {
            return Err(GatewayError::new("store unavailable"));
        }
        Ok(self.rows.clone())
    }

    fn begin(&mut self) -> Result<MemoryTransaction<'_>, GatewayError> {
        Ok(MemoryTransaction {
            staged: self.rows.clone(),
            next_id: self.next_id,
            store: self,
        })
    }
}

pub struct MemoryTransaction<'a> {
    store: &'a mut MemoryGateway,
    staged: Vec<PersistedProduct>,
    next_id: PersistedId,
}

impl CatalogTransaction for MemoryTransaction<'_> {
    fn insert_many(&mut self, records: &[ProductRecord]) -> Result<usize, GatewayError> {
        if self.store.fail_inserts {
            return Err(GatewayError::new("insert rejected"));
        }
        for r in records {
            self.staged.push(PersistedProduct {
                id: self.next_id,
                laboratory: r.laboratory.clone(),
                name: r.name.clone(),
                presentation: r.presentation.clone(),
                price: r.price,
                stock: r.stock,
            });
            self.next_id += 1;
        }
        Ok(records.len())
    }

    fn delete_by_persisted_id(&mut self, ids: &[PersistedId]) -> Result<usize, GatewayError> {
        let before = self.staged.len();
        self.staged.retain(|p| !ids.contains(&p.id));
        Ok(before - self.staged.len())
    }

    fn delete_out_of_stock(&mut self, ids: &[PersistedId]) -> Result<Vec<PersistedId>, GatewayError> {
        let mut deleted = Vec::new();
        self.staged.retain(|p| {
            let gone = p.stock == 0 && ids.contains(&p.id);
            if gone {
                deleted.push(p.id);
            }
            !gone
        });
        Ok(deleted)
    }

    fn delete_all(&mut self) -> Result<usize, GatewayError> {
        let n = self.staged.len();
        self.staged.clear();
        Ok(n)
    }

    fn commit(self) -> Result<(), GatewayError> {
        self.store.rows = self.staged;
        self.store.next_id = self.next_id;
        self.store.commits += 1;
        Ok(())
    }
}

/// Backup that records how often it was asked, optionally failing.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackup {
    pub fail: bool,
    pub taken: usize,
}

impl MemoryBackup {
    pub fn failing() -> Self {
        Self {
            fail: true,
            taken: 0,
        }
    }
}

impl BackupCoordinator for MemoryBackup {
    fn snapshot(&mut self) -> Result<BackupHandle, BackupError> {
        if self.fail {
            return Err(BackupError::new("backup target not writable"));
        }
        self.taken += 1;
        Ok(BackupHandle {
            path: PathBuf::from(format!("memory://backup/{}", self.taken)),
            created_at: Utc::now(),
        })
    }
}
