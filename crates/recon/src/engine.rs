use std::collections::HashMap;

use tracing::{info, warn};

use inventa_core::{IdentityKey, ProductRecord, RowSource};

use crate::config::{IngestMode, MissingSourcePolicy, ReconConfig};
use crate::error::ReconError;
use crate::gateway::{BackupCoordinator, BackupHandle, CatalogGateway, CatalogTransaction};
use crate::key::KeyBuilder;
use crate::model::{ReconDiff, ReconMeta, ReconReport, RemovedProduct, RunStage};
use crate::report::{compute_summary, per_category, per_laboratory};
use crate::scan::{scan, ScanOutcome};
use crate::snapshot::InventorySnapshot;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Stop after classification: no backup, no mutation.
    pub dry_run: bool,
}

/// Reconcile the stored catalog with `source`.
///
/// Stored rows whose key is still in the source are never touched. New keys
/// are inserted, vanished keys are deleted, both in one transaction taken
/// after a successful backup.
pub fn run<G, B>(
    config: &ReconConfig,
    source: &dyn RowSource,
    gateway: &mut G,
    backup: &mut B,
    options: RunOptions,
) -> Result<ReconReport, ReconError>
where
    G: CatalogGateway,
    B: BackupCoordinator,
{
    let mut stage = RunStage::LoadedExisting;
    let result = run_stages(config, source, gateway, backup, options, &mut stage);
    if let Err(e) = &result {
        warn!(failed_at = %stage, stage = %RunStage::Failed, error = %e, "reconciliation aborted");
    }
    result
}

fn run_stages<G, B>(
    config: &ReconConfig,
    source: &dyn RowSource,
    gateway: &mut G,
    backup: &mut B,
    options: RunOptions,
    stage: &mut RunStage,
) -> Result<ReconReport, ReconError>
where
    G: CatalogGateway,
    B: BackupCoordinator,
{
    let keys = KeyBuilder::new(config.key_case);

    // LOADED_EXISTING
    let snapshot = InventorySnapshot::build(gateway.load_all()?, &keys);
    info!(stage = %stage, rows = snapshot.total(), keys = snapshot.len(), "loaded stored catalog");

    // SCANNED_SOURCE
    let mut scanned = scan(source, config, IngestMode::Import);
    if !scanned.source_missing && !scanned.header_found {
        return Err(ReconError::Source(
            "no header row found in source; refusing to treat it as an empty catalog".into(),
        ));
    }
    *stage = RunStage::ScannedSource;
    info!(
        stage = %stage,
        rows = scanned.rows_read,
        products = scanned.records.len(),
        malformed = scanned.issues.len(),
        "scanned source"
    );

    // CLASSIFIED
    let skip = scanned.source_missing && config.missing_source == MissingSourcePolicy::Skip;
    let incoming_total = scanned.records.len();
    let changes = if skip {
        warn!("source missing, nothing will be added or removed");
        ReconDiff::default()
    } else {
        diff(&snapshot, std::mem::take(&mut scanned.records), &keys)
    };
    *stage = RunStage::Classified;
    info!(
        stage = %stage,
        added = changes.added.len(),
        removed = changes.removed.len(),
        unchanged = changes.unchanged,
        "classified"
    );
    if changes.duplicate_incoming > 0 {
        warn!(count = changes.duplicate_incoming, "duplicate keys in source, last row wins");
    }
    if snapshot.duplicate_rows() > 0 {
        warn!(count = snapshot.duplicate_rows(), "duplicate keys in store");
    }

    if options.dry_run {
        return Ok(build_report(source, &snapshot, &scanned, incoming_total, changes, None, true, *stage));
    }

    let handle = if changes.is_empty() {
        info!("nothing to apply");
        None
    } else {
        // BACKED_UP
        let handle = backup.snapshot()?;
        *stage = RunStage::BackedUp;
        info!(stage = %stage, path = %handle.path.display(), "backup taken");

        // APPLIED
        apply(gateway, &changes)?;
        *stage = RunStage::Applied;
        info!(stage = %stage, "changes committed");
        Some(handle)
    };

    *stage = RunStage::Reported;
    let report = build_report(source, &snapshot, &scanned, incoming_total, changes, handle, false, *stage);
    info!(
        stage = %stage,
        added = report.summary.added_count,
        removed = report.summary.removed_count,
        unchanged = report.summary.unchanged_count,
        "reconciliation finished"
    );
    Ok(report)
}

/// Split incoming records into added / unchanged and find removed rows.
///
/// Within the source the last record for a key wins, keeping the position
/// of the first.
pub fn diff(snapshot: &InventorySnapshot, incoming: Vec<ProductRecord>, keys: &KeyBuilder) -> ReconDiff {
    let mut position: HashMap<IdentityKey, usize> = HashMap::new();
    let mut unique: Vec<(IdentityKey, ProductRecord)> = Vec::with_capacity(incoming.len());
    let mut duplicate_incoming = 0;

    for record in incoming {
        let key = keys.for_record(&record);
        match position.get(&key) {
            Some(&i) => {
                unique[i].1 = record;
                duplicate_incoming += 1;
            }
            None => {
                position.insert(key.clone(), unique.len());
                unique.push((key, record));
            }
        }
    }

    let mut added = Vec::new();
    let mut unchanged = 0;
    for (key, record) in unique {
        if snapshot.contains(&key) {
            unchanged += 1;
        } else {
            added.push(record);
        }
    }

    let removed = snapshot
        .iter()
        .filter(|(key, _)| !position.contains_key(*key))
        .flat_map(|(_, rows)| rows.iter().cloned())
        .collect();

    ReconDiff {
        added,
        removed,
        unchanged,
        duplicate_incoming,
    }
}

/// Insert added records and delete removed rows in one transaction.
pub(crate) fn apply<G: CatalogGateway>(gateway: &mut G, diff: &ReconDiff) -> Result<(), ReconError> {
    let mut tx = gateway.begin()?;
    let inserted = tx.insert_many(&diff.added)?;
    let deleted = tx.delete_by_persisted_id(&diff.removed_ids())?;
    tx.commit()?;
    info!(inserted, deleted, "applied diff");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn build_report(
    source: &dyn RowSource,
    snapshot: &InventorySnapshot,
    scanned: &ScanOutcome,
    incoming_total: usize,
    diff: ReconDiff,
    backup: Option<BackupHandle>,
    dry_run: bool,
    stage: RunStage,
) -> ReconReport {
    let summary = compute_summary(
        snapshot,
        incoming_total,
        &diff,
        scanned.issues.len(),
        scanned.source_missing,
    );

    ReconReport {
        meta: ReconMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            source_format: source.format(),
            dry_run,
            stage,
        },
        summary,
        per_laboratory: per_laboratory(&diff.added),
        per_category: per_category(&diff.added),
        removed: diff.removed.iter().map(RemovedProduct::from).collect(),
        added: diff.added,
        issues: scanned.issues.clone(),
        backup,
    }
}
