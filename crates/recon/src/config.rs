use serde::{Deserialize, Serialize};

use inventa_core::SourceFormat;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Reconciliation settings. Every field has a default matching the catalog
/// exports this tool was built for, so an empty TOML document is valid.
///
/// Format profiles may be given partially: unspecified fields keep the
/// defaults of *that* format, not of the other one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ReconConfigFile")]
pub struct ReconConfig {
    pub missing_source: MissingSourcePolicy,
    pub key_case: KeyCase,
    pub defaults: IngestDefaults,
    pub delimited: FormatProfile,
    pub spreadsheet: FormatProfile,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            missing_source: MissingSourcePolicy::default(),
            key_case: KeyCase::default(),
            defaults: IngestDefaults::default(),
            delimited: FormatProfile::delimited(),
            spreadsheet: FormatProfile::spreadsheet(),
        }
    }
}

/// What a run does when the source file does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSourcePolicy {
    /// No source, no diff: nothing is added or removed.
    #[default]
    Skip,
    /// An absent source is an empty catalog: every stored product is removed.
    EmptyCatalog,
}

/// Case handling of identity keys. Whitespace is always normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCase {
    #[default]
    Sensitive,
    Insensitive,
}

// ---------------------------------------------------------------------------
// Ingest defaults
// ---------------------------------------------------------------------------

/// Which ingestion path produced a record; selects the default stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    /// Lightweight in-memory catalog refresh.
    Refresh,
    /// Reconciliation inserts and fresh seed imports.
    Import,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestDefaults {
    pub refresh_stock: i64,
    pub import_stock: i64,
    pub price: f64,
}

impl Default for IngestDefaults {
    fn default() -> Self {
        Self {
            refresh_stock: 1,
            import_stock: 100,
            price: 0.0,
        }
    }
}

impl IngestDefaults {
    pub fn stock_for(&self, mode: IngestMode) -> i64 {
        match mode {
            IngestMode::Refresh => self.refresh_stock,
            IngestMode::Import => self.import_stock,
        }
    }
}

// ---------------------------------------------------------------------------
// Format profiles
// ---------------------------------------------------------------------------

/// Where presentation and laboratory come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnLayout {
    /// One cell holds `"<model>,<brand>"`.
    Composite { column: usize },
    /// Model and brand in their own columns.
    Split { presentation: usize, laboratory: usize },
}

/// Classification and normalization rules for one source format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatProfile {
    pub code_column: usize,
    pub name_column: usize,
    /// Product codes start with exactly this many digits.
    pub code_digits: usize,
    /// Rows whose first field starts with this many digits are never categories.
    pub category_code_digits: usize,
    /// Names must be strictly longer than this (in characters).
    pub min_name_len: usize,
    pub category_keywords: Vec<String>,
    pub ignorable_prefixes: Vec<String>,
    pub header_tokens: Vec<String>,
    /// When false, data starts at the first row the reader yields.
    pub require_header: bool,
    /// Laboratory used when the source omits one.
    pub laboratory_fallback: String,
    pub layout: ColumnLayout,
}

impl FormatProfile {
    /// Text exports: header scan, composite `model,brand` in the third column.
    pub fn delimited() -> Self {
        Self {
            code_column: 0,
            name_column: 1,
            layout: ColumnLayout::Composite { column: 2 },
            code_digits: 9,
            category_code_digits: 6,
            min_name_len: 5,
            category_keywords: vec!["CONVENIENCIA".into(), "ACCESORIOS".into()],
            ignorable_prefixes: vec!["Listado".into(), "Reportes".into()],
            header_tokens: vec!["Codigo".into(), "Nombre".into()],
            require_header: true,
            laboratory_fallback: "UNSPECIFIED".into(),
        }
    }

    /// Workbook exports: the reader already dropped the header row; model and
    /// brand live in columns I and J.
    pub fn spreadsheet() -> Self {
        Self {
            layout: ColumnLayout::Split {
                presentation: 8,
                laboratory: 9,
            },
            require_header: false,
            laboratory_fallback: "VARIOS".into(),
            ..Self::delimited()
        }
    }

    fn validate(&self, label: &str) -> Result<(), ReconError> {
        let invalid = |msg: String| Err(ReconError::ConfigValidation(format!("{label}: {msg}")));

        if self.code_digits == 0 {
            return invalid("code_digits must be at least 1".into());
        }
        if self.category_code_digits == 0 {
            return invalid("category_code_digits must be at least 1".into());
        }
        if self.require_header && self.header_tokens.iter().all(|t| t.trim().is_empty()) {
            return invalid("require_header needs at least one header token".into());
        }
        if self.laboratory_fallback.trim().is_empty() {
            return invalid("laboratory_fallback must not be empty".into());
        }

        let mut columns = vec![("code_column", self.code_column), ("name_column", self.name_column)];
        match self.layout {
            ColumnLayout::Composite { column } => columns.push(("layout.column", column)),
            ColumnLayout::Split {
                presentation,
                laboratory,
            } => {
                columns.push(("layout.presentation", presentation));
                columns.push(("layout.laboratory", laboratory));
            }
        }
        for (i, (name_a, a)) in columns.iter().enumerate() {
            for (name_b, b) in &columns[i + 1..] {
                if a == b {
                    return invalid(format!("{name_a} and {name_b} both use column {a}"));
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        self.delimited.validate("delimited")?;
        self.spreadsheet.validate("spreadsheet")?;

        if self.defaults.refresh_stock < 0 || self.defaults.import_stock < 0 {
            return Err(ReconError::ConfigValidation(
                "default stock must not be negative".into(),
            ));
        }
        if !self.defaults.price.is_finite() || self.defaults.price < 0.0 {
            return Err(ReconError::ConfigValidation(
                "default price must be a non-negative number".into(),
            ));
        }

        Ok(())
    }

    pub fn profile(&self, format: SourceFormat) -> &FormatProfile {
        match format {
            SourceFormat::Delimited => &self.delimited,
            SourceFormat::Spreadsheet => &self.spreadsheet,
        }
    }
}

/// On-disk shape: profiles are overrides on top of the per-format defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ReconConfigFile {
    missing_source: MissingSourcePolicy,
    key_case: KeyCase,
    defaults: IngestDefaults,
    delimited: ProfileOverrides,
    spreadsheet: ProfileOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ProfileOverrides {
    code_column: Option<usize>,
    name_column: Option<usize>,
    layout: Option<ColumnLayout>,
    code_digits: Option<usize>,
    category_code_digits: Option<usize>,
    min_name_len: Option<usize>,
    category_keywords: Option<Vec<String>>,
    ignorable_prefixes: Option<Vec<String>>,
    header_tokens: Option<Vec<String>>,
    require_header: Option<bool>,
    laboratory_fallback: Option<String>,
}

impl ProfileOverrides {
    fn apply(self, mut base: FormatProfile) -> FormatProfile {
        if let Some(v) = self.code_column {
            base.code_column = v;
        }
        if let Some(v) = self.name_column {
            base.name_column = v;
        }
        if let Some(v) = self.layout {
            base.layout = v;
        }
        if let Some(v) = self.code_digits {
            base.code_digits = v;
        }
        if let Some(v) = self.category_code_digits {
            base.category_code_digits = v;
        }
        if let Some(v) = self.min_name_len {
            base.min_name_len = v;
        }
        if let Some(v) = self.category_keywords {
            base.category_keywords = v;
        }
        if let Some(v) = self.ignorable_prefixes {
            base.ignorable_prefixes = v;
        }
        if let Some(v) = self.header_tokens {
            base.header_tokens = v;
        }
        if let Some(v) = self.require_header {
            base.require_header = v;
        }
        if let Some(v) = self.laboratory_fallback {
            base.laboratory_fallback = v;
        }
        base
    }
}

impl TryFrom<ReconConfigFile> for ReconConfig {
    type Error = ReconError;

    fn try_from(file: ReconConfigFile) -> Result<Self, Self::Error> {
        let config = ReconConfig {
            missing_source: file.missing_source,
            key_case: file.key_case,
            defaults: file.defaults,
            delimited: file.delimited.apply(FormatProfile::delimited()),
            spreadsheet: file.spreadsheet.apply(FormatProfile::spreadsheet()),
        };
        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
