//! Commands that touch the SQLite store: `init`, `sync`, `seed`, `purge`,
//! `backup`.

use std::path::{Path, PathBuf};

use inventa_io::{list_backups, SqliteBackup, SqliteGateway, TabularSource};
use inventa_recon::{
    purge_obsolete, run, seed, BackupCoordinator, PurgeReport, ReconReport, RemovedProduct, RunOptions, SeedReport,
};

use crate::exit_codes::EXIT_BACKUP;
use crate::{print_json, write_json, CliError, Context, FormatArg};

/// Laboratories shown in the post-run store summary.
const TOP_LABORATORIES: usize = 10;

/// Removed products listed in the human summary before eliding.
const REMOVED_PREVIEW: usize = 20;

fn open_store(ctx: &Context) -> Result<SqliteGateway, CliError> {
    let gateway = SqliteGateway::open(&ctx.db)?;
    gateway.init_schema()?;
    Ok(gateway)
}

fn backups(ctx: &Context) -> SqliteBackup {
    SqliteBackup::new(&ctx.db, &ctx.settings.backup.dir)
}

pub fn cmd_init(ctx: &Context) -> Result<(), CliError> {
    let gateway = open_store(ctx)?;
    println!("catalog ready: {} ({} products)", ctx.db.display(), gateway.count()?);
    Ok(())
}

pub fn cmd_sync(
    ctx: &Context,
    source: Option<PathBuf>,
    format: Option<FormatArg>,
    dry_run: bool,
    json: bool,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let path = source.unwrap_or_else(|| ctx.settings.source.path.clone());
    let source = TabularSource::open(&path, ctx.format(format))?;
    let mut gateway = open_store(ctx)?;
    let mut backup = backups(ctx);

    let report = run(&ctx.settings.reconcile, &source, &mut gateway, &mut backup, RunOptions { dry_run })?;

    if let Some(out) = &output {
        write_json(&report, out)?;
    }
    if json {
        return print_json(&report);
    }

    print_sync_summary(&report, &path);
    if !dry_run {
        print_store_stats(&gateway)?;
    }
    Ok(())
}

fn print_sync_summary(report: &ReconReport, path: &Path) {
    let s = &report.summary;
    if s.source_missing {
        println!("source {} not found", path.display());
    }
    let mode = if report.meta.dry_run { " (dry run, nothing written)" } else { "" };
    println!("sync {} [{}]{}", report.meta.stage, report.meta.source_format, mode);
    println!("  existing:   {}", s.existing_total);
    println!("  incoming:   {}", s.incoming_total);
    println!("  added:      {}", s.added_count);
    println!(
        "  removed:    {} ({} with stock, {} without)",
        s.removed_count, s.removed_with_stock, s.removed_without_stock
    );
    println!("  unchanged:  {}", s.unchanged_count);
    if s.malformed_rows > 0 {
        println!("  malformed:  {}", s.malformed_rows);
    }
    if s.duplicate_incoming > 0 || s.duplicate_existing > 0 {
        println!(
            "  duplicates: {} in source, {} in store",
            s.duplicate_incoming, s.duplicate_existing
        );
    }
    if let Some(backup) = &report.backup {
        println!("  backup:     {}", backup.path.display());
    }

    if !report.per_laboratory.is_empty() {
        println!();
        println!("added by laboratory:");
        for (lab, n) in &report.per_laboratory {
            println!("  {:<30} {:>6}", lab, n);
        }
    }
    print_removed(&report.removed);

    for issue in &report.issues {
        eprintln!("note: line {}: {}", issue.line, issue.reason);
    }
}

fn print_removed(removed: &[RemovedProduct]) {
    if removed.is_empty() {
        return;
    }
    println!();
    println!("removed:");
    for p in removed.iter().take(REMOVED_PREVIEW) {
        println!("  [{}] {} | {} | {} (stock {})", p.id, p.laboratory, p.name, p.presentation, p.stock);
    }
    if removed.len() > REMOVED_PREVIEW {
        println!("  ... and {} more", removed.len() - REMOVED_PREVIEW);
    }
}

fn print_store_stats(gateway: &SqliteGateway) -> Result<(), CliError> {
    let total = gateway.count()?;
    let top = gateway.laboratory_counts(TOP_LABORATORIES)?;
    println!();
    println!("store: {} products", total);
    for (lab, n) in top {
        println!("  {:<30} {:>6}", lab, n);
    }
    Ok(())
}

pub fn cmd_seed(
    ctx: &Context,
    file: &Path,
    format: Option<FormatArg>,
    dry_run: bool,
    json: bool,
) -> Result<(), CliError> {
    let source = TabularSource::open(file, ctx.format(format))?;
    let mut gateway = open_store(ctx)?;
    let mut backup = backups(ctx);

    let report = seed(&ctx.settings.reconcile, &source, &mut gateway, &mut backup, dry_run)?;
    if json {
        return print_json(&report);
    }
    print_seed_summary(&report);
    if !dry_run {
        print_store_stats(&gateway)?;
    }
    Ok(())
}

fn print_seed_summary(report: &SeedReport) {
    let mode = if report.dry_run { " (dry run, nothing written)" } else { "" };
    println!("seed{}", mode);
    println!("  replaced:   {}", report.replaced);
    println!("  inserted:   {}", report.inserted);
    if report.duplicate_incoming > 0 {
        println!("  duplicates: {}", report.duplicate_incoming);
    }
    if let Some(backup) = &report.backup {
        println!("  backup:     {}", backup.path.display());
    }
    if !report.per_category.is_empty() {
        println!();
        println!("by category:");
        for (category, n) in &report.per_category {
            println!("  {:<30} {:>6}", category, n);
        }
    }
    for issue in &report.issues {
        eprintln!("note: line {}: {}", issue.line, issue.reason);
    }
}

pub fn cmd_purge(ctx: &Context, dry_run: bool, json: bool) -> Result<(), CliError> {
    let mut gateway = open_store(ctx)?;
    let mut backup = backups(ctx);

    let report = purge_obsolete(&mut gateway, &mut backup, dry_run)?;
    if json {
        return print_json(&report);
    }
    print_purge_summary(&report);
    Ok(())
}

fn print_purge_summary(report: &PurgeReport) {
    if report.removed.is_empty() {
        println!("no products without stock ({} in store)", report.existing_total);
        return;
    }
    let verb = if report.dry_run { "would remove" } else { "removed" };
    println!(
        "{} {} of {} products, {} remaining",
        verb,
        report.removed.len(),
        report.existing_total,
        report.remaining
    );
    for (lab, n) in &report.per_laboratory {
        println!("  {:<30} {:>6}", lab, n);
    }
    if let Some(backup) = &report.backup {
        println!("backup: {}", backup.path.display());
    }
}

pub fn cmd_backup(ctx: &Context, list: bool, json: bool) -> Result<(), CliError> {
    let mut coordinator = backups(ctx);

    if list {
        let entries = list_backups(coordinator.dir()).map_err(|e| CliError {
            code: EXIT_BACKUP,
            message: format!("cannot list {}: {e}", coordinator.dir().display()),
            hint: None,
        })?;
        if json {
            return print_json(&entries);
        }
        if entries.is_empty() {
            println!("no backups in {}", coordinator.dir().display());
        }
        for entry in entries {
            let when = entry
                .modified
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            println!("{}  {:>10}  {}", when, entry.size, entry.path.display());
        }
        return Ok(());
    }

    let handle = coordinator
        .snapshot()
        .map_err(|e| CliError::from(inventa_recon::ReconError::from(e)))?;
    if json {
        return print_json(&handle);
    }
    println!("{}", handle.path.display());
    Ok(())
}
