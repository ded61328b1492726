use inventa_core::{IdentityKey, PersistedProduct, ProductRecord};

use crate::config::KeyCase;
use crate::normalize::clean_field;

/// Builds identity keys for both sides of a diff with the same rules, so a
/// row stored by an earlier run matches the row it came from.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyBuilder {
    case: KeyCase,
}

impl KeyBuilder {
    pub fn new(case: KeyCase) -> Self {
        Self { case }
    }

    pub fn build(&self, laboratory: &str, name: &str, presentation: &str) -> IdentityKey {
        IdentityKey {
            laboratory: self.part(laboratory),
            name: self.part(name),
            presentation: self.part(presentation),
        }
    }

    pub fn for_record(&self, record: &ProductRecord) -> IdentityKey {
        self.build(&record.laboratory, &record.name, &record.presentation)
    }

    pub fn for_persisted(&self, product: &PersistedProduct) -> IdentityKey {
        self.build(&product.laboratory, &product.name, &product.presentation)
    }

    fn part(&self, raw: &str) -> String {
        let cleaned = clean_field(raw);
        match self.case {
            KeyCase::Sensitive => cleaned,
            KeyCase::Insensitive => cleaned.to_lowercase(),
        }
    }
}
