use std::fmt;

use serde::Serialize;

/// Composite natural key `(laboratory, name, presentation)`.
///
/// The only identity trusted across runs; source codes are not. Compared
/// field by field, so no separator can blur a field boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IdentityKey {
    pub laboratory: String,
    pub name: String,
    pub presentation: String,
}

impl IdentityKey {
    pub fn new(laboratory: &str, name: &str, presentation: &str) -> Self {
        Self {
            laboratory: laboratory.to_string(),
            name: name.to_string(),
            presentation: presentation.to_string(),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {} | {}", self.laboratory, self.name, self.presentation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_boundaries_matter() {
        // "a b" + "c" must not equal "a" + "b c"
        let left = IdentityKey::new("LAB", "a b", "c");
        let right = IdentityKey::new("LAB", "a", "b c");
        assert_ne!(left, right);
        assert_ne!(left.to_string(), right.to_string());

        let keys: std::collections::HashSet<_> = [left, right].into_iter().collect();
        assert_eq!(keys.len(), 2);
    }
}
