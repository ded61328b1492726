use std::collections::BTreeMap;

use inventa_core::{IdentityKey, PersistedProduct};

use crate::key::KeyBuilder;

/// Stored catalog keyed by identity, loaded once per run and read-only
/// afterwards.
///
/// The store does not enforce key uniqueness, so one key may map to several
/// rows. They are matched, kept, or removed together.
#[derive(Debug, Clone, Default)]
pub struct InventorySnapshot {
    entries: BTreeMap<IdentityKey, Vec<PersistedProduct>>,
    total: usize,
}

impl InventorySnapshot {
    pub fn build(products: Vec<PersistedProduct>, keys: &KeyBuilder) -> Self {
        let total = products.len();
        let mut entries: BTreeMap<IdentityKey, Vec<PersistedProduct>> = BTreeMap::new();
        for p in products {
            entries.entry(keys.for_persisted(&p)).or_default().push(p);
        }
        Self { entries, total }
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&[PersistedProduct]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Stored rows, duplicates included.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Distinct identity keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rows that share their key with an earlier row.
    pub fn duplicate_rows(&self) -> usize {
        self.total - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IdentityKey, &[PersistedProduct])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }
}
