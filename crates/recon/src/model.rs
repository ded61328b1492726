use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use inventa_core::{PersistedId, PersistedProduct, ProductRecord, SourceFormat};

use crate::error::RowIssue;
use crate::gateway::BackupHandle;

// ---------------------------------------------------------------------------
// Run stages
// ---------------------------------------------------------------------------

/// Stages of a reconciliation run, in order. `Failed` is reachable from any
/// stage before `Applied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStage {
    LoadedExisting,
    ScannedSource,
    Classified,
    BackedUp,
    Applied,
    Reported,
    Failed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadedExisting => write!(f, "LOADED_EXISTING"),
            Self::ScannedSource => write!(f, "SCANNED_SOURCE"),
            Self::Classified => write!(f, "CLASSIFIED"),
            Self::BackedUp => write!(f, "BACKED_UP"),
            Self::Applied => write!(f, "APPLIED"),
            Self::Reported => write!(f, "REPORTED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Outcome of comparing incoming records to the stored snapshot.
#[derive(Debug, Clone, Default)]
pub struct ReconDiff {
    /// Incoming records whose key is not stored, in source order.
    pub added: Vec<ProductRecord>,
    /// Stored rows whose key is not incoming. Every row of a duplicated key.
    pub removed: Vec<PersistedProduct>,
    /// Distinct keys present on both sides.
    pub unchanged: usize,
    /// Incoming rows overridden by a later row with the same key.
    pub duplicate_incoming: usize,
}

impl ReconDiff {
    pub fn removed_ids(&self) -> Vec<PersistedId> {
        self.removed.iter().map(|p| p.id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// A stored product that a run deleted (or would delete).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemovedProduct {
    pub id: PersistedId,
    pub laboratory: String,
    pub name: String,
    pub presentation: String,
    pub stock: i64,
}

impl From<&PersistedProduct> for RemovedProduct {
    fn from(p: &PersistedProduct) -> Self {
        Self {
            id: p.id,
            laboratory: p.laboratory.clone(),
            name: p.name.clone(),
            presentation: p.presentation.clone(),
            stock: p.stock,
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub engine_version: String,
    pub run_at: String,
    pub source_format: SourceFormat,
    pub dry_run: bool,
    /// Last stage reached. `CLASSIFIED` for dry runs.
    pub stage: RunStage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub existing_total: usize,
    pub incoming_total: usize,
    pub added_count: usize,
    pub removed_count: usize,
    pub removed_with_stock: usize,
    pub removed_without_stock: usize,
    pub unchanged_count: usize,
    pub malformed_rows: usize,
    pub duplicate_incoming: usize,
    pub duplicate_existing: usize,
    pub source_missing: bool,
}

/// Result of one reconciliation run, for operator display.
#[derive(Debug, Clone, Serialize)]
pub struct ReconReport {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    /// Added products per laboratory.
    pub per_laboratory: BTreeMap<String, usize>,
    /// Added products per category. Uncategorized products are not counted.
    pub per_category: BTreeMap<String, usize>,
    pub added: Vec<ProductRecord>,
    pub removed: Vec<RemovedProduct>,
    pub issues: Vec<RowIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupHandle>,
}

/// Result of a fresh import that replaced the whole catalog.
#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub run_at: String,
    pub dry_run: bool,
    pub replaced: usize,
    pub inserted: usize,
    pub duplicate_incoming: usize,
    pub per_laboratory: BTreeMap<String, usize>,
    pub per_category: BTreeMap<String, usize>,
    pub issues: Vec<RowIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupHandle>,
}

/// Result of deleting products without stock.
#[derive(Debug, Clone, Serialize)]
pub struct PurgeReport {
    pub run_at: String,
    pub dry_run: bool,
    pub existing_total: usize,
    pub remaining: usize,
    pub removed: Vec<RemovedProduct>,
    pub per_laboratory: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupHandle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_serializes_screaming() {
        assert_eq!(serde_json::to_string(&RunStage::LoadedExisting).unwrap(), "\"LOADED_EXISTING\"");
        assert_eq!(RunStage::BackedUp.to_string(), "BACKED_UP");
        assert!(RunStage::Classified < RunStage::Applied);
    }

    #[test]
    fn report_without_backup_omits_field() {
        let report = PurgeReport {
            run_at: "2026-01-01T00:00:00Z".into(),
            dry_run: true,
            existing_total: 3,
            remaining: 3,
            removed: vec![RemovedProduct {
                id: 7,
                laboratory: "ACME".into(),
                name: "Paracetamol 500mg".into(),
                presentation: "Caja x10".into(),
                stock: 0,
            }],
            per_laboratory: BTreeMap::from([("ACME".to_string(), 1)]),
            backup: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("backup").is_none());
        assert_eq!(json["removed"][0]["id"], 7);
        assert_eq!(json["per_laboratory"]["ACME"], 1);
    }
}
