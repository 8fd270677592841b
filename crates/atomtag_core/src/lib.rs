//! Core of the atomic-tagging archive.
//!
//! Atoms are deduplicated pieces of data carrying types; molecules are
//! tagged bundles of atoms. This crate owns their invariants, the SQLite
//! catalog that persists them, the content-addressable file repositories
//! used by importers and the ordinal-ordered handler dispatch.

pub mod config;
pub mod content;
pub mod db;
pub mod handler;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ArchiveConfig, ConfigError};
pub use content::{ContentError, ContentStore, RepositorySet};
pub use db::{open_db, open_db_in_memory, DbError};
pub use handler::registry::{HandlerRegistry, RegistryError};
pub use handler::{
    HandlerError, MoleculeExporter, MoleculeHandler, MoleculeImporter, MoleculeViewer, Verbosity,
    ORDINAL_RESERVED,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::atom::{Atom, AtomBuilder};
pub use model::entity::{EntityId, ValidationError};
pub use model::molecule::{Molecule, MoleculeBuilder};
pub use repo::{
    Catalog, ErrorKind, MoleculeDelta, Reconciler, RepoError, RepoResult, SqliteCatalog,
    SqliteReconciler, TypeFilter,
};
pub use service::{ArchiveService, ServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
