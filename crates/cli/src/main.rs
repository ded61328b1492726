// Inventa CLI - keeps the catalog store in step with the inventory export

mod catalog;
mod exit_codes;
mod store;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use inventa_config::{ConfigError, FormatChoice, Settings};
use inventa_core::SourceFormat;
use inventa_io::{ExportError, SourceError};
use inventa_recon::{GatewayError, ReconError};

use exit_codes::{
    recon_exit_code, source_exit_code, EXIT_CONFIG, EXIT_OUTPUT, EXIT_PERSISTENCE, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "inventa")]
#[command(about = "Reconcile a pharmacy catalog store with inventory exports")]
#[command(version)]
struct Cli {
    /// Settings file (default: <config dir>/inventa/settings.toml)
    #[arg(long, global = true, env = "INVENTA_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database (overrides database.path from settings)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the catalog table if it does not exist
    Init,

    /// Reconcile the store with the inventory export
    #[command(after_help = "\
Products still present in the export keep their stock and price. New products
are inserted at the import stock default, vanished products are deleted. A
backup is taken before anything is written.

Examples:
  inventa sync
  inventa sync --source 'INVENTARIO PARA TRABAJO.csv' --dry-run
  inventa sync --json --output last-run.json")]
    Sync {
        /// Source file (default: source.path from settings)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Source format (default: source.format from settings)
        #[arg(long, short = 'f')]
        format: Option<FormatArg>,

        /// Classify and diff only: no backup, no writes
        #[arg(long)]
        dry_run: bool,

        /// Print the run report as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Also write the JSON report to this file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Replace the whole catalog with the products of a source file
    #[command(after_help = "\
Every product is imported at the import stock default; existing stock is not
kept. Refuses to run when the file is missing or has no header.

Examples:
  inventa seed inventario.xlsx
  inventa seed export.csv --dry-run --json")]
    Seed {
        file: PathBuf,

        #[arg(long, short = 'f')]
        format: Option<FormatArg>,

        /// Report what would be imported without writing
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        json: bool,
    },

    /// Delete products whose stock is zero
    Purge {
        /// List what would be deleted without writing
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        json: bool,
    },

    /// Take a backup of the database now, or list existing backups
    Backup {
        #[arg(long)]
        list: bool,

        #[arg(long)]
        json: bool,
    },

    /// Show how the first rows of a source are classified
    #[command(after_help = "\
Examples:
  inventa inspect export.csv
  inventa inspect inventario.xlsx --limit 200 --json | jq '.[] | select(.class.class == \"malformed\")'")]
    Inspect {
        file: PathBuf,

        #[arg(long, short = 'f')]
        format: Option<FormatArg>,

        /// Number of rows to show
        #[arg(long, short = 'n', default_value_t = 50)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Write the normalized catalog of a source as standard CSV
    Convert {
        file: PathBuf,

        /// Output file (omit for stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        #[arg(long, short = 'f')]
        format: Option<FormatArg>,
    },

    /// Query a source file as a read-only catalog
    Catalog {
        file: PathBuf,

        #[arg(long, short = 'f', global = true)]
        format: Option<FormatArg>,

        #[arg(long, global = true)]
        json: bool,

        #[command(subcommand)]
        query: CatalogQuery,
    },
}

#[derive(Subcommand)]
pub enum CatalogQuery {
    /// Distinct laboratories, sorted
    Labs,
    /// Products of one laboratory (case-insensitive, prefix match)
    Products { laboratory: String },
    /// Products whose name contains a term (case-insensitive)
    Search { term: String },
    /// Product, laboratory and category counts
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Auto,
    Delimited,
    Spreadsheet,
}

impl From<FormatArg> for FormatChoice {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Auto => FormatChoice::Auto,
            FormatArg::Delimited => FormatChoice::Delimited,
            FormatArg::Spreadsheet => FormatChoice::Spreadsheet,
        }
    }
}

/// Settings and paths shared by every command.
pub struct Context {
    pub settings: Settings,
    pub db: PathBuf,
}

impl Context {
    /// `--format` wins over the settings file; `auto` means probe.
    pub fn format(&self, arg: Option<FormatArg>) -> Option<SourceFormat> {
        arg.map(FormatChoice::from)
            .unwrap_or(self.settings.source.format)
            .resolve()
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = Settings::load(cli.config.as_deref())
        .map_err(CliError::from)
        .and_then(|settings| {
            init_logging(cli.verbose, &settings.log_level);
            let db = cli.db.clone().unwrap_or_else(|| settings.database.path.clone());
            debug!(db = %db.display(), backups = %settings.backup.dir.display(), "settings loaded");
            dispatch(cli.command, &Context { settings, db })
        });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn dispatch(command: Commands, ctx: &Context) -> Result<(), CliError> {
    match command {
        Commands::Init => store::cmd_init(ctx),
        Commands::Sync {
            source,
            format,
            dry_run,
            json,
            output,
        } => store::cmd_sync(ctx, source, format, dry_run, json, output),
        Commands::Seed {
            file,
            format,
            dry_run,
            json,
        } => store::cmd_seed(ctx, &file, format, dry_run, json),
        Commands::Purge { dry_run, json } => store::cmd_purge(ctx, dry_run, json),
        Commands::Backup { list, json } => store::cmd_backup(ctx, list, json),
        Commands::Inspect {
            file,
            format,
            limit,
            json,
        } => catalog::cmd_inspect(ctx, &file, format, limit, json),
        Commands::Convert { file, output, format } => catalog::cmd_convert(ctx, &file, output, format),
        Commands::Catalog {
            file,
            format,
            json,
            query,
        } => catalog::cmd_catalog(ctx, &file, format, query, json),
    }
}

/// RUST_LOG wins, then -v, then `log_level` from settings.
fn init_logging(verbose: u8, configured: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match verbose {
            0 => configured,
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    });
    // stdout carries --json payloads
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Serialize `value` as pretty JSON to stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::output(format!("cannot serialize report: {e}")))?;
    println!("{}", text);
    Ok(())
}

pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::output(format!("cannot serialize report: {e}")))?;
    std::fs::write(path, text + "\n")
        .map_err(|e| CliError::output(format!("cannot write {}: {e}", path.display())))
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn output(msg: impl Into<String>) -> Self {
        Self { code: EXIT_OUTPUT, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::Backup(_) => Some("check backup.dir in settings; the store was not modified".to_string()),
            ReconError::Source(msg) if msg.contains("header") => {
                Some("run `inventa inspect <file>` to see how rows are classified".to_string())
            }
            _ => None,
        };
        Self { code: recon_exit_code(&err), message: err.to_string(), hint }
    }
}

impl From<SourceError> for CliError {
    fn from(err: SourceError) -> Self {
        let hint = match &err {
            SourceError::Encoding { .. } => Some("re-export the file as UTF-8 or Windows-1252".to_string()),
            _ => None,
        };
        Self { code: source_exit_code(&err), message: err.to_string(), hint }
    }
}

impl From<GatewayError> for CliError {
    fn from(err: GatewayError) -> Self {
        Self { code: EXIT_PERSISTENCE, message: err.to_string(), hint: None }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self {
            code: EXIT_CONFIG,
            message: err.to_string(),
            hint: Some(format!("default settings path: {}", Settings::config_path().display())),
        }
    }
}

impl From<ExportError> for CliError {
    fn from(err: ExportError) -> Self {
        Self::output(err.to_string())
    }
}
