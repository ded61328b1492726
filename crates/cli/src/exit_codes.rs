//! CLI Exit Code Registry
//!
//! Single source of truth for `inventa` exit codes. Scripts and cron jobs
//! rely on them, so a code never changes meaning once released.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success (including dry runs and skipped runs)        |
//! | 2    | Usage error (bad arguments, unknown laboratory)      |
//! | 3    | Source unreadable, missing where required, headerless|
//! | 4    | Source bytes not valid in any configured encoding    |
//! | 5    | Backup could not be taken; nothing applied           |
//! | 6    | Store rejected a load or the apply transaction       |
//! | 7    | Settings file or reconcile section invalid           |
//! | 8    | Report or export file could not be written           |

use inventa_io::SourceError;
use inventa_recon::ReconError;

/// Success.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Source file missing (where required), unreadable, or without a header.
pub const EXIT_SOURCE: u8 = 3;

/// None of the encodings in the chain decoded the source.
pub const EXIT_ENCODING: u8 = 4;

/// Backup failed. The store was not touched.
pub const EXIT_BACKUP: u8 = 5;

/// Store failure. The apply transaction was rolled back.
pub const EXIT_PERSISTENCE: u8 = 6;

/// Settings could not be read, parsed or validated.
pub const EXIT_CONFIG: u8 = 7;

/// `--output` or `convert -o` target could not be written.
pub const EXIT_OUTPUT: u8 = 8;

pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_CONFIG,
        ReconError::Source(_) => EXIT_SOURCE,
        ReconError::Backup(_) => EXIT_BACKUP,
        ReconError::Persistence(_) => EXIT_PERSISTENCE,
    }
}

pub fn source_exit_code(err: &SourceError) -> u8 {
    match err {
        SourceError::Encoding { .. } => EXIT_ENCODING,
        SourceError::Read { .. } | SourceError::Workbook { .. } | SourceError::NoSheets(_) => EXIT_SOURCE,
    }
}
