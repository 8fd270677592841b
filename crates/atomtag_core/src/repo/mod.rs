//! Persistence layer for the tagging catalog.
//!
//! # Responsibility
//! - Define the catalog and reconciliation contracts.
//! - Isolate SQLite query details from service/handler orchestration.
//!
//! # Invariants
//! - Writes go through builder-validated entities or validated labels.
//! - Repository APIs return semantic errors (`NotFound`, integrity) in
//!   addition to DB transport errors.

pub mod catalog;
pub mod reconcile;

pub use catalog::{Catalog, ErrorKind, RepoError, RepoResult, SqliteCatalog, TypeFilter};
pub use reconcile::{
    AtomReconcileReport, AtomRemovalReport, MoleculeDelta, PruneReport, ReconcileReport,
    Reconciler, RemovalReport, SqliteReconciler,
};
