use tracing::{debug, warn};

use inventa_core::{ProductRecord, RowSource, SourceStatus};

use crate::classify::{classifier_for, RowClass, ScanContext};
use crate::config::{IngestMode, ReconConfig};
use crate::error::RowIssue;
use crate::normalize::Normalizer;

/// Everything one pass over a source produced.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Normalized products in source order. May contain duplicate keys.
    pub records: Vec<ProductRecord>,
    pub issues: Vec<RowIssue>,
    pub rows_read: usize,
    pub categories: usize,
    pub ignored: usize,
    /// `false` when the format requires a header and none was found.
    pub header_found: bool,
    pub source_missing: bool,
}

/// Classify and normalize every row of `source`.
pub fn scan(source: &dyn RowSource, config: &ReconConfig, mode: IngestMode) -> ScanOutcome {
    let format = source.format();
    let profile = config.profile(format);

    if source.status() == SourceStatus::NotFound {
        warn!(%format, "source not found, scanning nothing");
        return ScanOutcome {
            header_found: !profile.require_header,
            source_missing: true,
            ..ScanOutcome::default()
        };
    }

    let classifier = classifier_for(format, config);
    let normalizer = Normalizer::new(profile, &config.defaults, mode);

    let mut out = ScanOutcome::default();
    let mut ctx = ScanContext::default();

    for row in source.rows() {
        out.rows_read += 1;
        let (class, next) = classifier.classify(&row, &ctx);
        ctx = next;
        debug!(line = row.line, ?class, "classified row");

        match class {
            RowClass::Product(fields) => match normalizer.normalize(&fields) {
                Ok(record) => out.records.push(record),
                Err(reason) => out.issues.push(RowIssue { line: row.line, reason }),
            },
            RowClass::Malformed(reason) => out.issues.push(RowIssue { line: row.line, reason }),
            RowClass::CategoryMarker(_) => out.categories += 1,
            RowClass::Header | RowClass::Ignorable(_) => out.ignored += 1,
        }
    }

    out.header_found = ctx.header_seen || !profile.require_header;
    if !out.header_found {
        warn!(rows = out.rows_read, "no header row found; every row was skipped");
    }
    if !out.issues.is_empty() {
        warn!(count = out.issues.len(), "dropped malformed rows");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventa_core::RawRow;

    use crate::error::MalformedReason;

    fn lines(text: &[&str]) -> Vec<RawRow> {
        text.iter()
            .enumerate()
            .map(|(i, l)| RawRow::line(i + 1, *l))
            .collect()
    }

    #[test]
    fn scan_collects_products_and_issues() {
        let source = lines(&[
            "Listado de productos",
            "Codigo,Nombre,Modelo",
            "ACCESORIOS VARIOS",
            "123456789,Cepillo dental suave,\"Unidad,COLGATE\"",
            "123456789,abc,\"Unidad,COLGATE\"",
            "",
            "987654321,Paracetamol 500mg,Caja x10",
        ]);
        let out = scan(&source, &ReconConfig::default(), IngestMode::Import);

        assert!(out.header_found);
        assert_eq!(out.rows_read, 7);
        assert_eq!(out.categories, 1);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].category.as_deref(), Some("ACCESORIOS VARIOS"));
        assert_eq!(out.records[0].laboratory, "COLGATE");
        // No comma in the composite cell: fallback laboratory
        assert_eq!(out.records[1].presentation, "Caja x10");
        assert_eq!(out.records[1].laboratory, "UNSPECIFIED");
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].line, 5);
        assert!(matches!(out.issues[0].reason, MalformedReason::ShortName(_)));
    }

    #[test]
    fn missing_header_is_flagged() {
        let source = lines(&["123456789,Paracetamol 500mg,\"Caja,LAB\""]);
        let out = scan(&source, &ReconConfig::default(), IngestMode::Import);
        assert!(!out.header_found);
        assert!(out.records.is_empty());
    }

    #[test]
    fn category_rows_never_become_records() {
        let source = lines(&[
            "Codigo,Nombre",
            "PRODUCTOS CONVENIENCIA,Algo largo aqui,\"x,y\"",
        ]);
        let out = scan(&source, &ReconConfig::default(), IngestMode::Import);
        assert!(out.records.is_empty());
        assert_eq!(out.categories, 1);
    }
}
