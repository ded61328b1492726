//! `inventa-recon`: catalog reconciliation engine.
//!
//! Classifies raw rows, normalizes products and diffs them against the stored
//! catalog. Storage and backups are reached only through the traits in
//! [`gateway`]; this crate does no file or database IO of its own.

pub mod catalog;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod key;
pub mod memory;
pub mod model;
pub mod normalize;
pub mod purge;
pub mod report;
pub mod scan;
pub mod seed;
pub mod snapshot;

pub use catalog::{Catalog, CatalogStats};
pub use classify::{classifier_for, RowClass, RowClassifier, ScanContext};
pub use config::{IngestMode, MissingSourcePolicy, ReconConfig};
pub use engine::{run, RunOptions};
pub use error::{BackupError, GatewayError, MalformedReason, ReconError, RowIssue};
pub use gateway::{BackupCoordinator, BackupHandle, CatalogGateway, CatalogTransaction};
pub use model::{PurgeReport, ReconReport, RemovedProduct, RunStage, SeedReport};
pub use purge::purge_obsolete;
pub use seed::seed;
