use std::collections::BTreeMap;

use tracing::{info, warn};

use inventa_core::{PersistedId, PersistedProduct};

use crate::error::ReconError;
use crate::gateway::{BackupCoordinator, CatalogGateway, CatalogTransaction};
use crate::model::{PurgeReport, RemovedProduct};
use crate::report::per_laboratory_persisted;

/// Stored products with no stock left.
pub fn obsolete(products: &[PersistedProduct]) -> Vec<&PersistedProduct> {
    products.iter().filter(|p| p.stock == 0).collect()
}

/// Delete every product whose stock is zero.
///
/// Looks only at the store, never at a source file. Takes a backup first and
/// deletes in one transaction; does neither when nothing qualifies. Stock is
/// checked again at delete time, so a row restocked after the load survives
/// and is left out of the report.
pub fn purge_obsolete<G, B>(gateway: &mut G, backup: &mut B, dry_run: bool) -> Result<PurgeReport, ReconError>
where
    G: CatalogGateway,
    B: BackupCoordinator,
{
    let products = gateway.load_all()?;
    let candidates = obsolete(&products);

    let mut report = PurgeReport {
        run_at: chrono::Utc::now().to_rfc3339(),
        dry_run,
        existing_total: products.len(),
        remaining: products.len(),
        removed: Vec::new(),
        per_laboratory: BTreeMap::new(),
        backup: None,
    };

    if candidates.is_empty() {
        info!("no products without stock");
        return Ok(report);
    }
    if dry_run {
        report.remaining = products.len() - candidates.len();
        report.per_laboratory = per_laboratory_persisted(candidates.iter().copied());
        report.removed = candidates.into_iter().map(RemovedProduct::from).collect();
        return Ok(report);
    }

    let handle = backup.snapshot()?;
    info!(path = %handle.path.display(), "backup taken");

    let ids: Vec<PersistedId> = candidates.iter().map(|p| p.id).collect();
    let mut tx = gateway.begin()?;
    let deleted = tx.delete_out_of_stock(&ids)?;
    tx.commit()?;
    if deleted.len() < ids.len() {
        warn!(skipped = ids.len() - deleted.len(), "restocked since load, kept");
    }
    info!(deleted = deleted.len(), "purged products without stock");

    let gone: Vec<&PersistedProduct> = candidates.into_iter().filter(|p| deleted.contains(&p.id)).collect();
    report.remaining = products.len() - gone.len();
    report.per_laboratory = per_laboratory_persisted(gone.iter().copied());
    report.removed = gone.into_iter().map(RemovedProduct::from).collect();
    report.backup = Some(handle);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryBackup, MemoryGateway};

    fn store() -> MemoryGateway {
        MemoryGateway::with_products(&[
            ("LAB A", "Producto uno", "Caja", 0),
            ("LAB A", "Producto dos", "Caja", 3),
            ("LAB B", "Producto tres", "Caja", 0),
        ])
    }

    #[test]
    fn purges_only_zero_stock() {
        let mut gw = store();
        let mut backup = MemoryBackup::default();
        let report = purge_obsolete(&mut gw, &mut backup, false).unwrap();

        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.remaining, 1);
        assert_eq!(report.per_laboratory["LAB A"], 1);
        assert_eq!(report.per_laboratory["LAB B"], 1);
        assert!(report.backup.is_some());
        assert_eq!(backup.taken, 1);
        assert_eq!(gw.rows().len(), 1);
        assert_eq!(gw.rows()[0].stock, 3);
    }

    /// Restocks one product right after the purge has read the store.
    struct RestockAfterLoad {
        inner: MemoryGateway,
        name: &'static str,
    }

    impl CatalogGateway for RestockAfterLoad {
        type Tx<'a> = crate::memory::MemoryTransaction<'a>;

        fn load_all(&self) -> Result<Vec<PersistedProduct>, crate::GatewayError> {
            self.inner.load_all()
        }

        fn begin(&mut self) -> Result<Self::Tx<'_>, crate::GatewayError> {
            for p in self.inner.rows_mut() {
                if p.name == self.name {
                    p.stock = 6;
                }
            }
            self.inner.begin()
        }
    }

    #[test]
    fn restocked_between_load_and_delete_is_kept() {
        let mut gw = RestockAfterLoad {
            inner: store(),
            name: "Producto tres",
        };
        let mut backup = MemoryBackup::default();
        let report = purge_obsolete(&mut gw, &mut backup, false).unwrap();

        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.removed[0].name, "Producto uno");
        assert_eq!(report.remaining, 2);
        assert!(!report.per_laboratory.contains_key("LAB B"));

        let rows = gw.inner.rows();
        assert_eq!(rows.len(), 2);
        let tres = rows.iter().find(|p| p.name == "Producto tres").unwrap();
        assert_eq!(tres.stock, 6);
    }

    #[test]
    fn nothing_to_purge_skips_backup() {
        let mut gw = MemoryGateway::with_products(&[("LAB", "Producto", "Caja", 2)]);
        let mut backup = MemoryBackup::default();
        let report = purge_obsolete(&mut gw, &mut backup, false).unwrap();
        assert!(report.removed.is_empty());
        assert_eq!(backup.taken, 0);
        assert_eq!(gw.commits(), 0);
    }

    #[test]
    fn failed_backup_deletes_nothing() {
        let mut gw = store();
        let mut backup = MemoryBackup::failing();
        let err = purge_obsolete(&mut gw, &mut backup, false).unwrap_err();
        assert!(matches!(err, ReconError::Backup(_)));
        assert_eq!(gw.rows().len(), 3);
    }

    #[test]
    fn dry_run_lists_without_deleting() {
        let mut gw = store();
        let mut backup = MemoryBackup::default();
        let report = purge_obsolete(&mut gw, &mut backup, true).unwrap();
        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.remaining, 1);
        assert_eq!(gw.rows().len(), 3);
        assert_eq!(backup.taken, 0);
    }
}
