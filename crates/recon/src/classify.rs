use serde::Serialize;

use inventa_core::{RawRow, RowPayload, SourceFormat};

use crate::config::{ColumnLayout, FormatProfile, ReconConfig};
use crate::error::MalformedReason;
use crate::normalize::{clean_field, has_digit_prefix};

/// State carried from one row to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanContext {
    pub header_seen: bool,
    /// Latest category marker; applies to every product row until replaced.
    pub category: Option<String>,
}

/// Fields pulled out of a product row, trimmed and unquoted but not yet
/// normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductFields {
    pub code: String,
    pub name: String,
    pub presentation: String,
    /// `None` when the source gave no brand; the normalizer substitutes the
    /// format's fallback.
    pub laboratory: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    Blank,
    BeforeHeader,
    Banner,
    RepeatedHeader,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "class", content = "data")]
pub enum RowClass {
    Header,
    CategoryMarker(String),
    Product(ProductFields),
    Ignorable(IgnoreReason),
    Malformed(MalformedReason),
}

/// How a row was turned into fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSplit {
    Tab,
    Comma,
    Cells,
}

/// Labels one row given the context left by the previous row.
///
/// Implementations are pure: the returned context replaces the one passed in.
pub trait RowClassifier {
    fn format(&self) -> SourceFormat;

    fn classify(&self, row: &RawRow, ctx: &ScanContext) -> (RowClass, ScanContext);

    /// Field split used for `row`, for diagnostics.
    fn split(&self, row: &RawRow) -> Result<(Vec<String>, FieldSplit), MalformedReason>;
}

/// Pick the classifier variant for a source format.
pub fn classifier_for(format: SourceFormat, config: &ReconConfig) -> Box<dyn RowClassifier + '_> {
    match format {
        SourceFormat::Delimited => Box::new(DelimitedClassifier::new(&config.delimited)),
        SourceFormat::Spreadsheet => Box::new(SpreadsheetClassifier::new(&config.spreadsheet)),
    }
}

// ---------------------------------------------------------------------------
// Delimited text
// ---------------------------------------------------------------------------

/// Text exports: tab-split when the line has a tab, comma-split (with quote
/// handling) otherwise.
#[derive(Debug, Clone)]
pub struct DelimitedClassifier<'a> {
    rules: Rules<'a>,
}

impl<'a> DelimitedClassifier<'a> {
    pub fn new(profile: &'a FormatProfile) -> Self {
        Self {
            rules: Rules { profile },
        }
    }
}

impl RowClassifier for DelimitedClassifier<'_> {
    fn format(&self) -> SourceFormat {
        SourceFormat::Delimited
    }

    fn classify(&self, row: &RawRow, ctx: &ScanContext) -> (RowClass, ScanContext) {
        let line = match &row.payload {
            RowPayload::Line(text) => text.as_str(),
            RowPayload::Cells(_) => {
                let fields = self.split(row).map(|(f, _)| f);
                return self.rules.classify_fields(fields, None, ctx);
            }
        };
        if line.trim().is_empty() {
            return (RowClass::Ignorable(IgnoreReason::Blank), ctx.clone());
        }
        self.rules.classify_fields(self.split(row).map(|(f, _)| f), Some(line), ctx)
    }

    fn split(&self, row: &RawRow) -> Result<(Vec<String>, FieldSplit), MalformedReason> {
        match &row.payload {
            RowPayload::Line(text) => split_line(text),
            RowPayload::Cells(cells) => Ok((
                trim_trailing_empty(cells.iter().map(|c| field_text(&c.as_text())).collect()),
                FieldSplit::Cells,
            )),
        }
    }
}

/// Split one text line. Tabs win; without a tab the line is parsed as one
/// CSV record so quoted commas stay inside their field.
pub fn split_line(line: &str) -> Result<(Vec<String>, FieldSplit), MalformedReason> {
    if line.contains('\t') {
        let fields = line.split('\t').map(field_text).collect();
        return Ok((trim_trailing_empty(fields), FieldSplit::Tab));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => {
            let fields = record.iter().map(field_text).collect();
            Ok((trim_trailing_empty(fields), FieldSplit::Comma))
        }
        Ok(false) => Ok((Vec::new(), FieldSplit::Comma)),
        Err(e) => Err(MalformedReason::Unsplittable(e.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Spreadsheet
// ---------------------------------------------------------------------------

/// Workbook exports: cells are already columns.
#[derive(Debug, Clone)]
pub struct SpreadsheetClassifier<'a> {
    rules: Rules<'a>,
}

impl<'a> SpreadsheetClassifier<'a> {
    pub fn new(profile: &'a FormatProfile) -> Self {
        Self {
            rules: Rules { profile },
        }
    }
}

impl RowClassifier for SpreadsheetClassifier<'_> {
    fn format(&self) -> SourceFormat {
        SourceFormat::Spreadsheet
    }

    fn classify(&self, row: &RawRow, ctx: &ScanContext) -> (RowClass, ScanContext) {
        let fields = self.split(row).map(|(f, _)| f);
        if matches!(&fields, Ok(f) if f.iter().all(|s| s.is_empty())) {
            return (RowClass::Ignorable(IgnoreReason::Blank), ctx.clone());
        }
        self.rules.classify_fields(fields, None, ctx)
    }

    fn split(&self, row: &RawRow) -> Result<(Vec<String>, FieldSplit), MalformedReason> {
        match &row.payload {
            RowPayload::Cells(cells) => Ok((
                trim_trailing_empty(cells.iter().map(|c| field_text(&c.as_text())).collect()),
                FieldSplit::Cells,
            )),
            // A text line handed to the sheet classifier is a one-cell row.
            RowPayload::Line(text) => Ok((trim_trailing_empty(vec![field_text(text)]), FieldSplit::Cells)),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Rules<'a> {
    profile: &'a FormatProfile,
}

impl Rules<'_> {
    /// `line` is the raw text when there is one; header and banner checks look
    /// at it so they work even when the line does not split cleanly.
    fn classify_fields(
        &self,
        fields: Result<Vec<String>, MalformedReason>,
        line: Option<&str>,
        ctx: &ScanContext,
    ) -> (RowClass, ScanContext) {
        let p = self.profile;
        let joined;
        let text = match (line, &fields) {
            (Some(l), _) => l,
            (None, Ok(f)) => {
                joined = f.join(" ");
                joined.as_str()
            }
            (None, Err(_)) => "",
        };

        if p.require_header && !ctx.header_seen {
            if self.is_header(text) {
                let next = ScanContext {
                    header_seen: true,
                    ..ctx.clone()
                };
                return (RowClass::Header, next);
            }
            return (RowClass::Ignorable(IgnoreReason::BeforeHeader), ctx.clone());
        }

        if self.is_banner(text) {
            return (RowClass::Ignorable(IgnoreReason::Banner), ctx.clone());
        }
        if self.is_header(text) {
            return (RowClass::Ignorable(IgnoreReason::RepeatedHeader), ctx.clone());
        }

        let fields = match fields {
            Ok(f) if f.is_empty() => return (RowClass::Ignorable(IgnoreReason::Blank), ctx.clone()),
            Ok(f) => f,
            Err(reason) => return (RowClass::Malformed(reason), ctx.clone()),
        };

        let first = fields.first().map(String::as_str).unwrap_or("");

        if self.is_category(first) {
            let label = clean_field(first);
            let next = ScanContext {
                category: Some(label.clone()),
                ..ctx.clone()
            };
            return (RowClass::CategoryMarker(label), next);
        }

        let class = match self.extract_product(&fields, ctx) {
            Ok(product) => RowClass::Product(product),
            Err(reason) => RowClass::Malformed(reason),
        };
        (class, ctx.clone())
    }

    fn is_header(&self, text: &str) -> bool {
        let tokens = &self.profile.header_tokens;
        !tokens.is_empty() && tokens.iter().all(|t| text.contains(t.as_str()))
    }

    fn is_banner(&self, text: &str) -> bool {
        let head = text.trim_start().trim_start_matches('"');
        self.profile
            .ignorable_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && head.starts_with(prefix.as_str()))
    }

    fn is_category(&self, first: &str) -> bool {
        let p = self.profile;
        !first.is_empty()
            && !has_digit_prefix(first, p.category_code_digits)
            && p.category_keywords.iter().any(|k| first.contains(k.as_str()))
    }

    fn extract_product(&self, fields: &[String], ctx: &ScanContext) -> Result<ProductFields, MalformedReason> {
        let p = self.profile;
        let get = |i: usize| fields.get(i).map(String::as_str).unwrap_or("");

        let code = get(p.code_column);
        if !has_digit_prefix(code, p.code_digits) {
            return Err(if code.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                MalformedReason::BadCode(code.to_string())
            } else {
                MalformedReason::Unrecognized(code.to_string())
            });
        }

        let name = get(p.name_column);
        if name.chars().count() <= p.min_name_len {
            return Err(MalformedReason::ShortName(name.to_string()));
        }

        let (presentation, laboratory) = match p.layout {
            ColumnLayout::Composite { column } => {
                // Only this cell; columns after it are not part of the brand.
                let cell = get(column);
                if cell.trim().is_empty() {
                    return Err(MalformedReason::MissingBrand);
                }
                split_composite(cell)
            }
            ColumnLayout::Split {
                presentation,
                laboratory,
            } => {
                let brand = get(laboratory);
                if brand.is_empty() {
                    return Err(MalformedReason::MissingBrand);
                }
                (get(presentation).to_string(), Some(brand.to_string()))
            }
        };

        Ok(ProductFields {
            code: code.to_string(),
            name: name.to_string(),
            presentation,
            laboratory,
            category: ctx.category.clone(),
        })
    }
}

/// `"<model>,<brand>"` split on the last comma. No comma, or nothing after
/// it, leaves the brand unset.
pub fn split_composite(field: &str) -> (String, Option<String>) {
    match field.rsplit_once(',') {
        Some((model, brand)) => {
            let brand = field_text(brand);
            (field_text(model), (!brand.is_empty()).then_some(brand))
        }
        None => (field_text(field), None),
    }
}

fn field_text(raw: &str) -> String {
    raw.trim().trim_matches('"').trim().to_string()
}

fn trim_trailing_empty(mut fields: Vec<String>) -> Vec<String> {
    while fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    fields
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use inventa_core::Cell;

    fn delimited() -> FormatProfile {
        FormatProfile::delimited()
    }

    fn after_header() -> ScanContext {
        ScanContext {
            header_seen: true,
            category: None,
        }
    }

    fn classify_line(profile: &FormatProfile, ctx: &ScanContext, line: &str) -> (RowClass, ScanContext) {
        DelimitedClassifier::new(profile).classify(&RawRow::line(1, line), ctx)
    }

    #[test]
    fn composite_row_splits_on_last_comma() {
        let p = delimited();
        let (class, _) = classify_line(
            &p,
            &after_header(),
            r#""123456789","Paracetamol 500mg","Caja x10,ACME Labs""#,
        );
        assert_eq!(
            class,
            RowClass::Product(ProductFields {
                code: "123456789".into(),
                name: "Paracetamol 500mg".into(),
                presentation: "Caja x10".into(),
                laboratory: Some("ACME Labs".into()),
                category: None,
            })
        );
    }

    #[test]
    fn composite_without_comma_has_no_brand() {
        assert_eq!(split_composite("Caja x10"), ("Caja x10".to_string(), None));
        assert_eq!(
            split_composite("Caja, x10,ACME"),
            ("Caja, x10".to_string(), Some("ACME".to_string()))
        );
    }

    #[test]
    fn trailing_columns_stay_out_of_the_composite() {
        let p = delimited();
        for line in [
            r#""123456789","Paracetamol 500mg","Caja x10,ACME Labs","25""#,
            "123456789\tParacetamol 500mg\tCaja x10,ACME Labs\t25",
        ] {
            match classify_line(&p, &after_header(), line).0 {
                RowClass::Product(f) => {
                    assert_eq!(f.presentation, "Caja x10", "{line}");
                    assert_eq!(f.laboratory.as_deref(), Some("ACME Labs"), "{line}");
                }
                other => panic!("expected product for {line}, got {other:?}"),
            }
        }
    }

    #[test]
    fn unquoted_comma_row_takes_composite_column_only() {
        let p = delimited();
        let (class, _) = classify_line(&p, &after_header(), "123456789,Paracetamol 500mg,Caja x10,ACME Labs");
        match class {
            RowClass::Product(f) => {
                assert_eq!(f.presentation, "Caja x10");
                assert_eq!(f.laboratory, None);
            }
            other => panic!("expected product, got {other:?}"),
        }
    }

    #[test]
    fn tab_takes_precedence_over_comma() {
        let (fields, split) = split_line("123456789\tIbuprofeno, 400mg\tCaja,LAB\t\t").unwrap();
        assert_eq!(split, FieldSplit::Tab);
        assert_eq!(fields, vec!["123456789", "Ibuprofeno, 400mg", "Caja,LAB"]);
    }

    #[test]
    fn rows_before_header_are_ignorable() {
        let p = delimited();
        let classifier = DelimitedClassifier::new(&p);
        let mut ctx = ScanContext::default();

        let lines = [
            "Listado de inventario",
            "123456789,Paracetamol 500mg,\"Caja x10,ACME\"",
            "Codigo,Nombre,Modelo",
            "123456789,Paracetamol 500mg,\"Caja x10,ACME\"",
        ];
        let mut classes = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let (class, next) = classifier.classify(&RawRow::line(i + 1, *line), &ctx);
            ctx = next;
            classes.push(class);
        }
        assert_eq!(classes[0], RowClass::Ignorable(IgnoreReason::BeforeHeader));
        assert_eq!(classes[1], RowClass::Ignorable(IgnoreReason::BeforeHeader));
        assert_eq!(classes[2], RowClass::Header);
        assert!(matches!(classes[3], RowClass::Product(_)));
    }

    #[test]
    fn category_marker_sets_context() {
        let p = delimited();
        let (class, ctx) = classify_line(&p, &after_header(), "\"PRODUCTOS DE CONVENIENCIA\",,");
        assert_eq!(class, RowClass::CategoryMarker("PRODUCTOS DE CONVENIENCIA".into()));
        assert_eq!(ctx.category.as_deref(), Some("PRODUCTOS DE CONVENIENCIA"));

        let (class, ctx2) = classify_line(&p, &ctx, "123456789,Paracetamol 500mg,\"Caja,LAB\"");
        match class {
            RowClass::Product(f) => assert_eq!(f.category.as_deref(), Some("PRODUCTOS DE CONVENIENCIA")),
            other => panic!("expected product, got {other:?}"),
        }
        assert_eq!(ctx2, ctx);
    }

    #[test]
    fn numeric_prefix_is_never_a_category() {
        let p = delimited();
        let (class, ctx) = classify_line(&p, &after_header(), "123456 ACCESORIOS,x");
        assert!(!matches!(class, RowClass::CategoryMarker(_)));
        assert_eq!(ctx.category, None);
    }

    #[test]
    fn banners_and_blanks_after_header() {
        let p = delimited();
        let ctx = after_header();
        assert_eq!(
            classify_line(&p, &ctx, "\"Reportes del sistema\"").0,
            RowClass::Ignorable(IgnoreReason::Banner)
        );
        assert_eq!(classify_line(&p, &ctx, "   ").0, RowClass::Ignorable(IgnoreReason::Blank));
        assert_eq!(classify_line(&p, &ctx, ",,,").0, RowClass::Ignorable(IgnoreReason::Blank));
        assert_eq!(
            classify_line(&p, &ctx, "Codigo,Nombre,Modelo").0,
            RowClass::Ignorable(IgnoreReason::RepeatedHeader)
        );
    }

    #[test]
    fn malformed_reasons() {
        let p = delimited();
        let ctx = after_header();
        assert_eq!(
            classify_line(&p, &ctx, "12345,Paracetamol 500mg,\"Caja,LAB\"").0,
            RowClass::Malformed(MalformedReason::BadCode("12345".into()))
        );
        assert_eq!(
            classify_line(&p, &ctx, "123456789,Para,\"Caja,LAB\"").0,
            RowClass::Malformed(MalformedReason::ShortName("Para".into()))
        );
        assert_eq!(
            classify_line(&p, &ctx, "123456789,Paracetamol 500mg").0,
            RowClass::Malformed(MalformedReason::MissingBrand)
        );
        assert_eq!(
            classify_line(&p, &ctx, "Total general,42").0,
            RowClass::Malformed(MalformedReason::Unrecognized("Total general".into()))
        );
    }

    #[test]
    fn unterminated_quote_is_still_split() {
        // The csv reader tolerates a missing closing quote at end of input.
        let (fields, _) = split_line("123456789,\"Paracetamol 500mg").unwrap();
        assert_eq!(fields[0], "123456789");
    }

    #[test]
    fn spreadsheet_uses_split_columns() {
        let p = FormatProfile::spreadsheet();
        let classifier = SpreadsheetClassifier::new(&p);
        let mut cells = vec![Cell::Empty; 10];
        cells[0] = Cell::Number(123456789.0);
        cells[1] = Cell::Text("Amoxicilina 500mg".into());
        cells[8] = Cell::Text("Frasco 60ml".into());
        cells[9] = Cell::Text("GENFAR".into());

        // No header needed for workbooks
        let (class, _) = classifier.classify(&RawRow::cells(2, cells), &ScanContext::default());
        assert_eq!(
            class,
            RowClass::Product(ProductFields {
                code: "123456789".into(),
                name: "Amoxicilina 500mg".into(),
                presentation: "Frasco 60ml".into(),
                laboratory: Some("GENFAR".into()),
                category: None,
            })
        );
    }

    #[test]
    fn spreadsheet_missing_brand_column() {
        let p = FormatProfile::spreadsheet();
        let classifier = SpreadsheetClassifier::new(&p);
        let cells = vec![
            Cell::Text("123456789".into()),
            Cell::Text("Amoxicilina 500mg".into()),
        ];
        let (class, _) = classifier.classify(&RawRow::cells(3, cells), &ScanContext::default());
        assert_eq!(class, RowClass::Malformed(MalformedReason::MissingBrand));
    }

    #[test]
    fn spreadsheet_blank_row() {
        let p = FormatProfile::spreadsheet();
        let classifier = SpreadsheetClassifier::new(&p);
        let (class, _) = classifier.classify(
            &RawRow::cells(4, vec![Cell::Empty, Cell::Text(" ".into())]),
            &ScanContext::default(),
        );
        assert_eq!(class, RowClass::Ignorable(IgnoreReason::Blank));
    }

    #[test]
    fn classifier_for_picks_variant() {
        let config = ReconConfig::default();
        assert_eq!(classifier_for(SourceFormat::Delimited, &config).format(), SourceFormat::Delimited);
        assert_eq!(classifier_for(SourceFormat::Spreadsheet, &config).format(), SourceFormat::Spreadsheet);
    }
}
