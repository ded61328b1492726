use inventa_core::ProductRecord;

use crate::classify::ProductFields;
use crate::config::{FormatProfile, IngestDefaults, IngestMode};
use crate::error::MalformedReason;

/// Trim, drop wrapping double quotes, turn control characters into spaces and
/// collapse whitespace runs to a single space.
///
/// Idempotent: `clean_field(&clean_field(s)) == clean_field(s)`.
pub fn clean_field(raw: &str) -> String {
    let unquoted = raw.trim().trim_matches('"');
    let mut out = String::with_capacity(unquoted.len());
    for word in unquoted
        .split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|w| !w.is_empty())
    {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    // A word may itself end or start with a quote once inner spaces are gone.
    let trimmed = out.trim_matches('"').trim();
    if trimmed.len() == out.len() {
        out
    } else {
        clean_field(trimmed)
    }
}

/// True when `s` starts with at least `n` ASCII digits.
pub fn has_digit_prefix(s: &str, n: usize) -> bool {
    s.chars().take(n).filter(char::is_ascii_digit).count() == n
}

/// Placeholder presentation for products whose model cell is empty.
pub fn code_presentation(code: &str) -> String {
    format!("Código: {code}")
}

/// Turns extracted product fields into a [`ProductRecord`].
#[derive(Debug, Clone)]
pub struct Normalizer<'a> {
    profile: &'a FormatProfile,
    defaults: &'a IngestDefaults,
    mode: IngestMode,
}

impl<'a> Normalizer<'a> {
    pub fn new(profile: &'a FormatProfile, defaults: &'a IngestDefaults, mode: IngestMode) -> Self {
        Self {
            profile,
            defaults,
            mode,
        }
    }

    /// Clean every field and re-check code and name after cleaning.
    pub fn normalize(&self, fields: &ProductFields) -> Result<ProductRecord, MalformedReason> {
        let code = clean_field(&fields.code);
        if !has_digit_prefix(&code, self.profile.code_digits) {
            return Err(MalformedReason::BadCode(code));
        }

        let name = clean_field(&fields.name);
        if name.chars().count() <= self.profile.min_name_len {
            return Err(MalformedReason::ShortName(name));
        }

        let presentation = match clean_field(&fields.presentation) {
            p if p.is_empty() => code_presentation(&code),
            p => p,
        };

        let laboratory = fields
            .laboratory
            .as_deref()
            .map(clean_field)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| clean_field(&self.profile.laboratory_fallback));

        let category = fields
            .category
            .as_deref()
            .map(clean_field)
            .filter(|c| !c.is_empty());

        Ok(ProductRecord {
            code,
            name,
            presentation,
            laboratory,
            category,
            price: self.defaults.price,
            stock: self.defaults.stock_for(self.mode),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(code: &str, name: &str, presentation: &str, lab: Option<&str>) -> ProductFields {
        ProductFields {
            code: code.into(),
            name: name.into(),
            presentation: presentation.into(),
            laboratory: lab.map(String::from),
            category: None,
        }
    }

    #[test]
    fn clean_collapses_and_unquotes() {
        assert_eq!(clean_field("  \"Caja   x10\"  "), "Caja x10");
        assert_eq!(clean_field("a\tb\r\nc"), "a b c");
        assert_eq!(clean_field("\"\""), "");
        assert_eq!(clean_field("x\u{1f}y"), "x y");
    }

    #[test]
    fn clean_is_idempotent_on_nested_quotes() {
        let once = clean_field("\" \"ACME\" \"");
        assert_eq!(once, "ACME");
        assert_eq!(clean_field(&once), once);
    }

    #[test]
    fn digit_prefix() {
        assert!(has_digit_prefix("123456789", 9));
        assert!(has_digit_prefix("1234567890X", 9));
        assert!(!has_digit_prefix("12345678", 9));
        assert!(!has_digit_prefix("12345678A", 9));
    }

    #[test]
    fn normalizes_with_import_defaults() {
        let profile = FormatProfile::delimited();
        let defaults = IngestDefaults::default();
        let n = Normalizer::new(&profile, &defaults, IngestMode::Import);
        let rec = n
            .normalize(&fields("123456789", " Paracetamol   500mg ", "Caja x10", Some("ACME Labs")))
            .unwrap();
        assert_eq!(rec.name, "Paracetamol 500mg");
        assert_eq!(rec.laboratory, "ACME Labs");
        assert_eq!(rec.price, 0.0);
        assert_eq!(rec.stock, 100);
    }

    #[test]
    fn refresh_mode_uses_small_stock() {
        let profile = FormatProfile::delimited();
        let defaults = IngestDefaults::default();
        let n = Normalizer::new(&profile, &defaults, IngestMode::Refresh);
        let rec = n
            .normalize(&fields("123456789", "Ibuprofeno 400", "Caja", Some("LAB")))
            .unwrap();
        assert_eq!(rec.stock, 1);
    }

    #[test]
    fn missing_laboratory_uses_profile_fallback() {
        let profile = FormatProfile::delimited();
        let defaults = IngestDefaults::default();
        let n = Normalizer::new(&profile, &defaults, IngestMode::Import);
        let rec = n
            .normalize(&fields("123456789", "Paracetamol 500mg", "Caja x10", None))
            .unwrap();
        assert_eq!(rec.laboratory, "UNSPECIFIED");

        let sheet = FormatProfile::spreadsheet();
        let n = Normalizer::new(&sheet, &defaults, IngestMode::Import);
        let rec = n
            .normalize(&fields("123456789", "Paracetamol 500mg", "Caja x10", Some("  ")))
            .unwrap();
        assert_eq!(rec.laboratory, "VARIOS");
    }

    #[test]
    fn empty_presentation_falls_back_to_code() {
        let profile = FormatProfile::spreadsheet();
        let defaults = IngestDefaults::default();
        let n = Normalizer::new(&profile, &defaults, IngestMode::Import);
        let rec = n
            .normalize(&fields("123456789", "Paracetamol 500mg", "", Some("ACME")))
            .unwrap();
        assert_eq!(rec.presentation, "Código: 123456789");
    }

    #[test]
    fn name_rechecked_after_cleaning() {
        let profile = FormatProfile::delimited();
        let defaults = IngestDefaults::default();
        let n = Normalizer::new(&profile, &defaults, IngestMode::Import);
        // Six raw chars, four after collapsing.
        let err = n
            .normalize(&fields("123456789", "a    b", "Caja", Some("LAB")))
            .unwrap_err();
        assert_eq!(err, MalformedReason::ShortName("a b".into()));
    }
}
