use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::info;

use inventa_core::{ProductRecord, RowSource};

use crate::config::{IngestMode, ReconConfig};
use crate::error::{ReconError, RowIssue};
use crate::report::{per_category, per_laboratory};
use crate::scan::scan;

/// Read-only product list loaded straight from a source file.
///
/// Owned by the caller; reload it to see a newer file. Products carry the
/// refresh stock default.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<ProductRecord>,
    issues: Vec<RowIssue>,
    source_missing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub products: usize,
    pub laboratories: usize,
    pub categories: usize,
    pub malformed_rows: usize,
    pub per_laboratory: BTreeMap<String, usize>,
    pub per_category: BTreeMap<String, usize>,
}

impl Catalog {
    /// A missing source yields an empty catalog.
    pub fn load(source: &dyn RowSource, config: &ReconConfig) -> Result<Self, ReconError> {
        let scanned = scan(source, config, IngestMode::Refresh);
        if !scanned.source_missing && !scanned.header_found {
            return Err(ReconError::Source("no header row found in source".into()));
        }
        info!(products = scanned.records.len(), "catalog loaded");
        Ok(Self {
            products: scanned.records,
            issues: scanned.issues,
            source_missing: scanned.source_missing,
        })
    }

    pub fn products(&self) -> &[ProductRecord] {
        &self.products
    }

    pub fn issues(&self) -> &[RowIssue] {
        &self.issues
    }

    pub fn source_missing(&self) -> bool {
        self.source_missing
    }

    /// Distinct laboratory names, sorted.
    pub fn laboratories(&self) -> Vec<String> {
        self.products
            .iter()
            .map(|p| p.laboratory.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Products of one laboratory. Case-insensitive; a name matches when it
    /// equals `laboratory` or starts with it.
    pub fn by_laboratory(&self, laboratory: &str) -> Vec<&ProductRecord> {
        let wanted = laboratory.trim().to_lowercase();
        if wanted.is_empty() {
            return Vec::new();
        }
        self.products
            .iter()
            .filter(|p| p.laboratory.trim().to_lowercase().starts_with(&wanted))
            .collect()
    }

    /// Case-insensitive substring search on product names.
    pub fn search(&self, term: &str) -> Vec<&ProductRecord> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Vec::new();
        }
        self.products
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&term))
            .collect()
    }

    pub fn stats(&self) -> CatalogStats {
        let per_laboratory = per_laboratory(&self.products);
        let per_category = per_category(&self.products);
        CatalogStats {
            products: self.products.len(),
            laboratories: per_laboratory.len(),
            categories: per_category.len(),
            malformed_rows: self.issues.len(),
            per_laboratory,
            per_category,
        }
    }
}
