//! Importer/exporter/viewer plug-in contracts and dispatch.
//!
//! # Responsibility
//! - Define the capability traits external handlers implement.
//! - Provide the built-in fallback and file handlers.
//! - Select handlers by ascending ordinal (see [`registry::HandlerRegistry`]).
//!
//! # Invariants
//! - [`ORDINAL_RESERVED`] belongs to built-in fallbacks only.
//! - Handlers never terminate the process; failures surface as
//!   [`HandlerError`].

pub mod export;
pub mod generic;
pub mod image;
pub mod registry;
pub mod remote;
pub mod text;

use crate::content::ContentError;
use crate::model::entity::{EntityId, ValidationError};
use crate::model::molecule::Molecule;
use crate::repo::{Catalog, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Ordinal reserved for built-in fallback handlers.
pub const ORDINAL_RESERVED: i32 = i32::MAX;

/// Detail level of a viewer's text representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// One line per molecule.
    #[default]
    Default,
    /// Header line plus one line per atom.
    Verbose,
}

/// Handler execution failure.
#[derive(Debug)]
pub enum HandlerError {
    Content(ContentError),
    Repo(RepoError),
    Validation(ValidationError),
    Io { path: PathBuf, source: std::io::Error },
    /// Molecule lacks a file-reference atom the handler needs.
    MissingFileReference(EntityId),
    /// Molecule or file violates the handler's expectations.
    Unsupported(String),
}

impl Display for HandlerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Content(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "io error at {}: {source}", path.display()),
            Self::MissingFileReference(id) => {
                write!(f, "molecule {id} has no local file reference")
            }
            Self::Unsupported(message) => write!(f, "unsupported: {message}"),
        }
    }
}

impl Error for HandlerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Content(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ContentError> for HandlerError {
    fn from(value: ContentError) -> Self {
        Self::Content(value)
    }
}

impl From<RepoError> for HandlerError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ValidationError> for HandlerError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Identity shared by every handler kind.
pub trait MoleculeHandler: Send + Sync {
    /// Stable human-readable identifier, unique per handler.
    fn unique_id(&self) -> &str;
    /// Dispatch priority; lower values are tried first.
    fn ordinal(&self) -> i32;
}

/// Turns a file into persisted molecules.
pub trait MoleculeImporter: MoleculeHandler {
    fn can_handle(&self, file: &Path) -> bool;

    /// Imports `file` into the local repository, or into the named remote
    /// one, and returns the created molecules.
    fn import_file(
        &self,
        catalog: &dyn Catalog,
        file: &Path,
        repository: Option<&str>,
    ) -> Result<Vec<Molecule>, HandlerError>;
}

/// Writes a molecule out to a file.
pub trait MoleculeExporter: MoleculeHandler {
    fn can_handle(&self, molecule: &Molecule) -> bool;
    fn export_to_file(&self, molecule: &Molecule, target: &Path) -> Result<(), HandlerError>;
}

/// Renders a molecule for humans.
pub trait MoleculeViewer: MoleculeHandler {
    fn can_handle(&self, molecule: &Molecule) -> bool;
    fn text_representation(
        &self,
        molecule: &Molecule,
        max_length: usize,
        verbosity: Verbosity,
    ) -> String;
    /// Presents the molecule and its content to `out`.
    fn show_molecule(&self, molecule: &Molecule, out: &mut dyn Write) -> Result<(), HandlerError>;
}

pub(crate) fn write_error(err: std::io::Error) -> HandlerError {
    HandlerError::Io {
        path: PathBuf::from("<output>"),
        source: err,
    }
}
