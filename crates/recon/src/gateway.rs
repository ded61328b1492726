use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use inventa_core::{PersistedId, PersistedProduct, ProductRecord};

use crate::error::{BackupError, GatewayError};

/// Narrow view of the catalog store.
///
/// Reads happen outside any transaction; every mutation of one run goes
/// through a single [`CatalogTransaction`].
pub trait CatalogGateway {
    type Tx<'a>: CatalogTransaction
    where
        Self: 'a;

    fn load_all(&self) -> Result<Vec<PersistedProduct>, GatewayError>;

    fn begin(&mut self) -> Result<Self::Tx<'_>, GatewayError>;
}

/// One all-or-nothing unit of catalog mutations. Dropping it without
/// [`CatalogTransaction::commit`] discards everything it did.
pub trait CatalogTransaction {
    /// Insert records; the store assigns ids. Returns rows inserted.
    fn insert_many(&mut self, records: &[ProductRecord]) -> Result<usize, GatewayError>;

    /// Returns rows deleted.
    fn delete_by_persisted_id(&mut self, ids: &[PersistedId]) -> Result<usize, GatewayError>;

    /// Delete those of `ids` whose stock is still zero when the statement
    /// runs. Returns the ids actually deleted.
    fn delete_out_of_stock(&mut self, ids: &[PersistedId]) -> Result<Vec<PersistedId>, GatewayError>;

    /// Empty the catalog table. Other tables are not touched.
    fn delete_all(&mut self) -> Result<usize, GatewayError>;

    fn commit(self) -> Result<(), GatewayError>;
}

/// Where a point-in-time copy of the store was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupHandle {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Takes a durable snapshot of the store before it is mutated.
pub trait BackupCoordinator {
    fn snapshot(&mut self) -> Result<BackupHandle, BackupError>;
}

impl<B: BackupCoordinator + ?Sized> BackupCoordinator for &mut B {
    fn snapshot(&mut self) -> Result<BackupHandle, BackupError> {
        (**self).snapshot()
    }
}
