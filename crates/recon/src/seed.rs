use tracing::{info, warn};

use inventa_core::RowSource;

use crate::config::{IngestMode, ReconConfig};
use crate::engine::diff;
use crate::error::ReconError;
use crate::gateway::{BackupCoordinator, CatalogGateway, CatalogTransaction};
use crate::key::KeyBuilder;
use crate::model::SeedReport;
use crate::report::{per_category, per_laboratory};
use crate::scan::scan;
use crate::snapshot::InventorySnapshot;

/// Replace the whole catalog with the products in `source`.
///
/// Unlike [`crate::engine::run`], stock of existing products is not kept:
/// every product comes back at the import default. Only the catalog table
/// is emptied.
pub fn seed<G, B>(
    config: &ReconConfig,
    source: &dyn RowSource,
    gateway: &mut G,
    backup: &mut B,
    dry_run: bool,
) -> Result<SeedReport, ReconError>
where
    G: CatalogGateway,
    B: BackupCoordinator,
{
    let scanned = scan(source, config, IngestMode::Import);
    if scanned.source_missing {
        return Err(ReconError::Source("source not found; refusing to empty the catalog".into()));
    }
    if !scanned.header_found {
        return Err(ReconError::Source("no header row found in source".into()));
    }

    let keys = KeyBuilder::new(config.key_case);
    // Against an empty snapshot every unique record is "added".
    let unique = diff(&InventorySnapshot::default(), scanned.records, &keys);
    if unique.duplicate_incoming > 0 {
        warn!(count = unique.duplicate_incoming, "duplicate keys in source, last row wins");
    }

    let mut report = SeedReport {
        run_at: chrono::Utc::now().to_rfc3339(),
        dry_run,
        replaced: 0,
        inserted: unique.added.len(),
        duplicate_incoming: unique.duplicate_incoming,
        per_laboratory: per_laboratory(&unique.added),
        per_category: per_category(&unique.added),
        issues: scanned.issues,
        backup: None,
    };

    if dry_run {
        report.replaced = gateway.load_all()?.len();
        return Ok(report);
    }

    let handle = backup.snapshot()?;
    info!(path = %handle.path.display(), "backup taken");

    let mut tx = gateway.begin()?;
    report.replaced = tx.delete_all()?;
    report.inserted = tx.insert_many(&unique.added)?;
    tx.commit()?;
    info!(replaced = report.replaced, inserted = report.inserted, "catalog seeded");

    report.backup = Some(handle);
    Ok(report)
}
