//! Archive use-case service.
//!
//! # Responsibility
//! - Own the catalog connection, content repositories and handler registry
//!   as one explicit context.
//! - Turn CLI-level requests into catalog/reconciler/handler calls.
//!
//! # Invariants
//! - Edits of persisted molecules go through `modify()` + reconciliation.
//! - Released content is only deleted when `purge_content_on_remove` is set.

use crate::config::{ArchiveConfig, ConfigError};
use crate::content::{ContentError, RepositorySet};
use crate::db::{open_db, DbError};
use crate::handler::registry::{HandlerRegistry, RegistryError};
use crate::handler::{HandlerError, Verbosity};
use crate::model::atom::Atom;
use crate::model::entity::{EntityId, ValidationError};
use crate::model::molecule::Molecule;
use crate::repo::{
    AtomRemovalReport, Catalog, ErrorKind, PruneReport, ReconcileReport, Reconciler, RemovalReport,
    RepoError, SqliteCatalog, SqliteReconciler, TypeFilter,
};
use log::{info, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Errors from archive service operations.
#[derive(Debug)]
pub enum ServiceError {
    Config(ConfigError),
    Db(DbError),
    Repo(RepoError),
    Content(ContentError),
    Registry(RegistryError),
    Handler(HandlerError),
    Validation(ValidationError),
    MoleculeNotFound(EntityId),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Validation(_) => ErrorKind::InvalidArgument,
            Self::Db(_) => ErrorKind::StorageFailure,
            Self::Repo(err) => err.kind(),
            Self::Content(err) => content_kind(err),
            Self::Registry(err) => match err {
                RegistryError::ReservedOrdinal(_) | RegistryError::DuplicateOrdinal { .. } => {
                    ErrorKind::InvalidArgument
                }
                _ => ErrorKind::NotFound,
            },
            Self::Handler(err) => match err {
                HandlerError::Content(inner) => content_kind(inner),
                HandlerError::Repo(inner) => inner.kind(),
                HandlerError::Io { .. } => ErrorKind::StorageFailure,
                HandlerError::MissingFileReference(_) => ErrorKind::NotFound,
                HandlerError::Validation(_) | HandlerError::Unsupported(_) => {
                    ErrorKind::InvalidArgument
                }
            },
            Self::MoleculeNotFound(_) => ErrorKind::NotFound,
        }
    }
}

fn content_kind(err: &ContentError) -> ErrorKind {
    match err {
        ContentError::SourceNotFound(_) | ContentError::RepositoryNotFound(_) => {
            ErrorKind::NotFound
        }
        ContentError::InvalidReference(_) => ErrorKind::InvalidArgument,
        ContentError::Io { .. } => ErrorKind::StorageFailure,
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Content(err) => write!(f, "{err}"),
            Self::Registry(err) => write!(f, "{err}"),
            Self::Handler(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::MoleculeNotFound(id) => write!(f, "molecule not found: {id}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Content(err) => Some(err),
            Self::Registry(err) => Some(err),
            Self::Handler(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::MoleculeNotFound(_) => None,
        }
    }
}

macro_rules! service_error_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(impl From<$source> for ServiceError {
            fn from(value: $source) -> Self {
                Self::$variant(value)
            }
        })*
    };
}

service_error_from!(
    ConfigError => Config,
    DbError => Db,
    RepoError => Repo,
    ContentError => Content,
    RegistryError => Registry,
    HandlerError => Handler,
    ValidationError => Validation,
);

/// Explicit archive context: catalog connection, repositories, handlers.
pub struct ArchiveService {
    conn: Connection,
    repositories: Arc<RepositorySet>,
    handlers: HandlerRegistry,
    purge_content_on_remove: bool,
}

impl ArchiveService {
    /// Opens (and migrates) the configured catalog and registers the
    /// built-in handlers.
    pub fn open(config: &ArchiveConfig) -> Result<Self, ServiceError> {
        config.validate()?;
        std::fs::create_dir_all(&config.base_dir).map_err(|source| ContentError::Io {
            path: config.base_dir.clone(),
            source,
        })?;

        let conn = open_db(config.database_path())?;
        let repositories = Arc::new(RepositorySet::from_config(config));
        let handlers = HandlerRegistry::new(Arc::clone(&repositories))?;
        Ok(Self::from_parts(conn, repositories, handlers)
            .with_purge_content_on_remove(config.purge_content_on_remove))
    }

    pub fn from_parts(
        conn: Connection,
        repositories: Arc<RepositorySet>,
        handlers: HandlerRegistry,
    ) -> Self {
        Self {
            conn,
            repositories,
            handlers,
            purge_content_on_remove: false,
        }
    }

    pub fn with_purge_content_on_remove(mut self, purge: bool) -> Self {
        self.purge_content_on_remove = purge;
        self
    }

    pub fn catalog(&self) -> Result<SqliteCatalog<'_>, ServiceError> {
        Ok(SqliteCatalog::try_new(&self.conn)?)
    }

    pub fn reconciler(&self) -> SqliteReconciler<'_> {
        SqliteReconciler::new(&self.conn)
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Mutable access for registering external handlers at startup.
    pub fn handlers_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.handlers
    }

    pub fn repositories(&self) -> &RepositorySet {
        &self.repositories
    }

    /// Imports a file with the best importer for it.
    pub fn import_file(
        &self,
        file: &Path,
        repository: Option<&str>,
    ) -> Result<Vec<Molecule>, ServiceError> {
        let importer = self.handlers.importer(file)?;
        let catalog = self.catalog()?;
        let molecules = importer.import_file(&catalog, file, repository)?;
        info!(
            "event=archive_import module=service status=ok handler={} molecules={} remote={}",
            importer.unique_id(),
            molecules.len(),
            repository.is_some()
        );
        Ok(molecules)
    }

    pub fn molecule(&self, id: EntityId) -> Result<Molecule, ServiceError> {
        self.catalog()?
            .find_molecule(id)?
            .ok_or(ServiceError::MoleculeNotFound(id))
    }

    /// Molecules carrying every tag in `tags`; all molecules when empty.
    pub fn molecules(&self, tags: &[String]) -> Result<Vec<Molecule>, ServiceError> {
        Ok(self.catalog()?.find_molecules_by_tags(tags)?)
    }

    /// One line per matching molecule, rendered by its viewer.
    pub fn list(&self, tags: &[String], max_length: usize) -> Result<Vec<String>, ServiceError> {
        self.molecules(tags)?
            .iter()
            .map(|molecule| -> Result<String, ServiceError> {
                let viewer = self.handlers.viewer(molecule)?;
                Ok(viewer.text_representation(molecule, max_length, Verbosity::Default))
            })
            .collect()
    }

    /// Verbose text of one molecule.
    pub fn show(&self, id: EntityId, max_length: usize) -> Result<String, ServiceError> {
        let molecule = self.molecule(id)?;
        let viewer = self.handlers.viewer(&molecule)?;
        Ok(viewer.text_representation(&molecule, max_length, Verbosity::Verbose))
    }

    /// Lets the molecule's viewer present it, including its content.
    pub fn render(&self, id: EntityId, out: &mut dyn Write) -> Result<(), ServiceError> {
        let molecule = self.molecule(id)?;
        self.handlers.viewer(&molecule)?.show_molecule(&molecule, out)?;
        Ok(())
    }

    /// Adds and removes tags of a persisted molecule.
    ///
    /// Removing every tag is rejected; a molecule keeps at least one.
    pub fn retag(
        &self,
        id: EntityId,
        add: &[String],
        remove: &[String],
    ) -> Result<(Molecule, ReconcileReport), ServiceError> {
        let current = self.molecule(id)?;
        let mut tags: Vec<String> = current
            .tags()
            .iter()
            .filter(|tag| !remove.iter().any(|removed| removed.trim() == tag.as_str()))
            .cloned()
            .collect();
        for tag in add {
            let tag = tag.trim();
            if !tags.iter().any(|existing| existing == tag) {
                tags.push(tag.to_string());
            }
        }

        let desired = current.modify().replace_tags(&tags)?.build()?;
        let report = self.reconciler().reconcile_molecule(&desired)?;
        Ok((self.molecule(id)?, report))
    }

    /// Applies an arbitrary desired state built from `modify()`.
    pub fn reconcile(&self, desired: &Molecule) -> Result<ReconcileReport, ServiceError> {
        Ok(self.reconciler().reconcile_molecule(desired)?)
    }

    pub fn remove_molecule(&self, id: EntityId) -> Result<RemovalReport, ServiceError> {
        let report = self.reconciler().remove_molecule(id)?;
        for relative in &report.released_content {
            self.release_content(relative);
        }
        Ok(report)
    }

    pub fn remove_atom(&self, id: EntityId) -> Result<AtomRemovalReport, ServiceError> {
        let report = self.reconciler().remove_atom(id)?;
        if let Some(relative) = &report.released_content {
            self.release_content(relative);
        }
        Ok(report)
    }

    /// Exports a molecule with the first exporter accepting it.
    pub fn export(&self, id: EntityId, target: &Path) -> Result<(), ServiceError> {
        let molecule = self.molecule(id)?;
        self.handlers
            .exporter(&molecule)?
            .export_to_file(&molecule, target)?;
        Ok(())
    }

    pub fn atoms_by_type(
        &self,
        types: &[String],
        filter: TypeFilter,
    ) -> Result<Vec<Atom>, ServiceError> {
        Ok(self.catalog()?.find_atoms_by_type(types, filter)?)
    }

    pub fn tags(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.catalog()?.list_tags()?)
    }

    pub fn types(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.catalog()?.list_types()?)
    }

    pub fn user_domain(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.catalog()?.user_domain()?)
    }

    /// Deletes tags and types no entity references anymore.
    pub fn prune(&self) -> Result<PruneReport, ServiceError> {
        Ok(self.reconciler().prune_orphan_vocabulary()?)
    }

    fn release_content(&self, relative: &str) {
        if !self.purge_content_on_remove {
            return;
        }
        // Catalog change is already committed at this point.
        if let Err(err) = self.repositories.local().remove(relative) {
            warn!("event=content_purge module=service status=error error={err}");
        }
    }
}
