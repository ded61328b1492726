use serde::{Deserialize, Serialize};

use crate::key::IdentityKey;

/// Row identifier assigned by the store. Never derived from source data.
pub type PersistedId = i64;

/// Canonical representation of one catalog line, as produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub code: String,
    pub name: String,
    pub presentation: String,
    pub laboratory: String,
    pub category: Option<String>,
    pub price: f64,
    pub stock: i64,
}

impl ProductRecord {
    /// Identity key built from the record's fields as-is (no case folding).
    pub fn identity(&self) -> IdentityKey {
        IdentityKey::new(&self.laboratory, &self.name, &self.presentation)
    }
}

/// A catalog row as it exists in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedProduct {
    pub id: PersistedId,
    pub laboratory: String,
    pub name: String,
    pub presentation: String,
    pub price: f64,
    pub stock: i64,
}

impl PersistedProduct {
    pub fn identity(&self) -> IdentityKey {
        IdentityKey::new(&self.laboratory, &self.name, &self.presentation)
    }
}
