//! Read-only commands over a source file: `inspect`, `convert`, `catalog`.

use std::path::{Path, PathBuf};

use serde::Serialize;

use inventa_core::{RowSource, SourceStatus};
use inventa_io::export::{export_catalog, write_catalog};
use inventa_io::TabularSource;
use inventa_recon::classify::{FieldSplit, IgnoreReason};
use inventa_recon::{classifier_for, Catalog, RowClass, ScanContext};

use crate::exit_codes::EXIT_SOURCE;
use crate::{print_json, CliError, CatalogQuery, Context, FormatArg};

/// Open a source that must exist.
fn open_existing(ctx: &Context, file: &Path, format: Option<FormatArg>) -> Result<TabularSource, CliError> {
    let source = TabularSource::open(file, ctx.format(format))?;
    if source.status() == SourceStatus::NotFound {
        return Err(CliError {
            code: EXIT_SOURCE,
            message: format!("{}: file not found", file.display()),
            hint: None,
        });
    }
    Ok(source)
}

fn load_catalog(ctx: &Context, file: &Path, format: Option<FormatArg>) -> Result<Catalog, CliError> {
    let source = open_existing(ctx, file, format)?;
    let catalog = Catalog::load(&source, &ctx.settings.reconcile)?;
    if !catalog.issues().is_empty() {
        eprintln!("note: {} malformed rows skipped", catalog.issues().len());
    }
    Ok(catalog)
}

// ---------------------------------------------------------------------------
// inspect
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct InspectedRow {
    line: usize,
    class: RowClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    split: Option<FieldSplit>,
    fields: Vec<String>,
}

pub fn cmd_inspect(
    ctx: &Context,
    file: &Path,
    format: Option<FormatArg>,
    limit: usize,
    json: bool,
) -> Result<(), CliError> {
    let source = open_existing(ctx, file, format)?;
    let classifier = classifier_for(source.format(), &ctx.settings.reconcile);

    let mut scan_ctx = ScanContext::default();
    let mut inspected = Vec::new();
    for row in source.rows().take(limit) {
        let (fields, split) = match classifier.split(&row) {
            Ok((fields, split)) => (fields, Some(split)),
            Err(_) => (Vec::new(), None),
        };
        let (class, next) = classifier.classify(&row, &scan_ctx);
        scan_ctx = next;
        inspected.push(InspectedRow {
            line: row.line,
            class,
            split,
            fields,
        });
    }

    if json {
        return print_json(&inspected);
    }

    println!("{} [{}]", file.display(), source.format());
    for row in &inspected {
        let split = match row.split {
            Some(FieldSplit::Tab) => "tab",
            Some(FieldSplit::Comma) => "comma",
            Some(FieldSplit::Cells) => "cells",
            None => "-",
        };
        println!("{:>6}  {:<10} {:<5}  {}", row.line, class_label(&row.class), split, class_detail(&row.class));
    }
    Ok(())
}

fn class_label(class: &RowClass) -> &'static str {
    match class {
        RowClass::Header => "header",
        RowClass::CategoryMarker(_) => "category",
        RowClass::Product(_) => "product",
        RowClass::Ignorable(_) => "ignored",
        RowClass::Malformed(_) => "malformed",
    }
}

fn class_detail(class: &RowClass) -> String {
    match class {
        RowClass::Header => String::new(),
        RowClass::CategoryMarker(name) => name.clone(),
        RowClass::Product(p) => format!(
            "{} | {} | {} | {}",
            p.code,
            p.name,
            p.presentation,
            p.laboratory.as_deref().unwrap_or("(fallback)")
        ),
        RowClass::Ignorable(reason) => match reason {
            IgnoreReason::Blank => "blank".to_string(),
            IgnoreReason::BeforeHeader => "before header".to_string(),
            IgnoreReason::Banner => "banner".to_string(),
            IgnoreReason::RepeatedHeader => "repeated header".to_string(),
        },
        RowClass::Malformed(reason) => reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// convert
// ---------------------------------------------------------------------------

pub fn cmd_convert(
    ctx: &Context,
    file: &Path,
    output: Option<PathBuf>,
    format: Option<FormatArg>,
) -> Result<(), CliError> {
    let catalog = load_catalog(ctx, file, format)?;
    match output {
        Some(path) => {
            export_catalog(catalog.products(), &path)?;
            eprintln!("wrote {} products to {}", catalog.products().len(), path.display());
        }
        None => write_catalog(catalog.products(), std::io::stdout().lock())?,
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// catalog
// ---------------------------------------------------------------------------

pub fn cmd_catalog(
    ctx: &Context,
    file: &Path,
    format: Option<FormatArg>,
    query: CatalogQuery,
    json: bool,
) -> Result<(), CliError> {
    let catalog = load_catalog(ctx, file, format)?;

    match query {
        CatalogQuery::Labs => {
            let labs = catalog.laboratories();
            if json {
                return print_json(&labs);
            }
            for lab in labs {
                println!("{}", lab);
            }
        }
        CatalogQuery::Products { laboratory } => {
            let products = catalog.by_laboratory(&laboratory);
            if products.is_empty() {
                return Err(CliError::args(format!("no products for laboratory \"{}\"", laboratory))
                    .with_hint("`inventa catalog <file> labs` lists the laboratories"));
            }
            if json {
                return print_json(&products);
            }
            for p in products {
                println!("{}  {}  {}  [{}]", p.code, p.name, p.presentation, p.laboratory);
            }
        }
        CatalogQuery::Search { term } => {
            let found = catalog.search(&term);
            if json {
                return print_json(&found);
            }
            if found.is_empty() {
                eprintln!("no products match \"{}\"", term);
            }
            for p in found {
                println!("{}  {}  {}  [{}]", p.code, p.name, p.presentation, p.laboratory);
            }
        }
        CatalogQuery::Stats => {
            let stats = catalog.stats();
            if json {
                return print_json(&stats);
            }
            println!("products:      {}", stats.products);
            println!("laboratories:  {}", stats.laboratories);
            println!("categories:    {}", stats.categories);
            println!("malformed:     {}", stats.malformed_rows);
            for (category, n) in &stats.per_category {
                println!("  {:<30} {:>6}", category, n);
            }
        }
    }
    Ok(())
}
