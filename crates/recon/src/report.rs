use std::collections::BTreeMap;

use inventa_core::{PersistedProduct, ProductRecord};

use crate::model::{ReconDiff, ReconSummary};
use crate::snapshot::InventorySnapshot;

/// Count records per laboratory.
pub fn per_laboratory<'a>(records: impl IntoIterator<Item = &'a ProductRecord>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for r in records {
        *counts.entry(r.laboratory.clone()).or_insert(0) += 1;
    }
    counts
}

/// Count records per category; records without one are skipped.
pub fn per_category<'a>(records: impl IntoIterator<Item = &'a ProductRecord>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for r in records {
        if let Some(cat) = &r.category {
            *counts.entry(cat.clone()).or_insert(0) += 1;
        }
    }
    counts
}

pub fn per_laboratory_persisted<'a>(
    products: impl IntoIterator<Item = &'a PersistedProduct>,
) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for p in products {
        *counts.entry(p.laboratory.clone()).or_insert(0) += 1;
    }
    counts
}

/// Summary counters for one run.
pub fn compute_summary(
    snapshot: &InventorySnapshot,
    incoming_total: usize,
    diff: &ReconDiff,
    malformed_rows: usize,
    source_missing: bool,
) -> ReconSummary {
    let removed_with_stock = diff.removed.iter().filter(|p| p.stock > 0).count();

    ReconSummary {
        existing_total: snapshot.total(),
        incoming_total,
        added_count: diff.added.len(),
        removed_count: diff.removed.len(),
        removed_with_stock,
        removed_without_stock: diff.removed.len() - removed_with_stock,
        unchanged_count: diff.unchanged,
        malformed_rows,
        duplicate_incoming: diff.duplicate_incoming,
        duplicate_existing: snapshot.duplicate_rows(),
        source_missing,
    }
}
