//! Ordinal-ordered handler registries with first-match dispatch.
//!
//! # Responsibility
//! - Hold importers, exporters and viewers keyed by ordinal.
//! - Return the first handler (ascending ordinal) accepting an input,
//!   optionally skipping one handler so it can defer to the next best.
//!
//! # Invariants
//! - One handler per ordinal and registry kind.
//! - [`ORDINAL_RESERVED`] is only occupied by built-in fallbacks, so importer
//!   and viewer dispatch always finds a handler.
//! - Exporters have no fallback; no match is reported as an error.

use crate::content::RepositorySet;
use crate::handler::export::ContentExporter;
use crate::handler::generic::{GenericImporter, GenericViewer};
use crate::handler::image::ImageImporter;
use crate::handler::remote::RemoteViewer;
use crate::handler::{
    MoleculeExporter, MoleculeHandler, MoleculeImporter, MoleculeViewer, ORDINAL_RESERVED,
};
use crate::model::entity::EntityId;
use crate::model::molecule::Molecule;
use log::debug;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Registration and dispatch failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Ordinal is reserved for built-in fallbacks.
    ReservedOrdinal(String),
    /// Another handler already holds the ordinal.
    DuplicateOrdinal { ordinal: i32, existing: String },
    /// Import source is missing or unreadable.
    FileUnreadable(PathBuf),
    NoImporter(PathBuf),
    NoViewer(EntityId),
    NoExporter(EntityId),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReservedOrdinal(id) => {
                write!(f, "handler `{id}` uses the reserved ordinal {ORDINAL_RESERVED}")
            }
            Self::DuplicateOrdinal { ordinal, existing } => {
                write!(f, "ordinal {ordinal} is already taken by `{existing}`")
            }
            Self::FileUnreadable(path) => write!(f, "file is not readable: {}", path.display()),
            Self::NoImporter(path) => write!(f, "no importer accepts {}", path.display()),
            Self::NoViewer(id) => write!(f, "no viewer accepts molecule {id}"),
            Self::NoExporter(id) => write!(f, "no exporter accepts molecule {id}"),
        }
    }
}

impl Error for RegistryError {}

type Slots<T> = BTreeMap<i32, Box<T>>;

/// Importer, exporter and viewer registries.
pub struct HandlerRegistry {
    importers: Slots<dyn MoleculeImporter>,
    exporters: Slots<dyn MoleculeExporter>,
    viewers: Slots<dyn MoleculeViewer>,
}

impl HandlerRegistry {
    /// Registry holding only the fallback importer and viewer.
    pub fn with_fallbacks(repositories: Arc<RepositorySet>) -> Self {
        let mut importers: Slots<dyn MoleculeImporter> = BTreeMap::new();
        importers.insert(
            ORDINAL_RESERVED,
            Box::new(GenericImporter::new(Arc::clone(&repositories))),
        );
        let mut viewers: Slots<dyn MoleculeViewer> = BTreeMap::new();
        viewers.insert(ORDINAL_RESERVED, Box::new(GenericViewer::new(repositories)));

        Self {
            importers,
            exporters: BTreeMap::new(),
            viewers,
        }
    }

    /// Fallbacks plus the built-in image importer, remote viewer and
    /// content exporter.
    pub fn new(repositories: Arc<RepositorySet>) -> Result<Self, RegistryError> {
        let mut registry = Self::with_fallbacks(Arc::clone(&repositories));
        registry.register_importer(Box::new(ImageImporter::new(Arc::clone(&repositories))))?;
        registry.register_viewer(Box::new(RemoteViewer::new(Arc::clone(&repositories))))?;
        registry.register_exporter(Box::new(ContentExporter::new(repositories)))?;
        Ok(registry)
    }

    pub fn register_importer(
        &mut self,
        importer: Box<dyn MoleculeImporter>,
    ) -> Result<(), RegistryError> {
        let ordinal = importer.ordinal();
        insert_checked(&mut self.importers, ordinal, importer)
    }

    /// Registers under an explicit ordinal instead of the handler's own.
    pub fn register_importer_at(
        &mut self,
        ordinal: i32,
        importer: Box<dyn MoleculeImporter>,
    ) -> Result<(), RegistryError> {
        insert_checked(&mut self.importers, ordinal, importer)
    }

    pub fn register_exporter(
        &mut self,
        exporter: Box<dyn MoleculeExporter>,
    ) -> Result<(), RegistryError> {
        let ordinal = exporter.ordinal();
        insert_checked(&mut self.exporters, ordinal, exporter)
    }

    pub fn register_exporter_at(
        &mut self,
        ordinal: i32,
        exporter: Box<dyn MoleculeExporter>,
    ) -> Result<(), RegistryError> {
        insert_checked(&mut self.exporters, ordinal, exporter)
    }

    pub fn register_viewer(&mut self, viewer: Box<dyn MoleculeViewer>) -> Result<(), RegistryError> {
        let ordinal = viewer.ordinal();
        insert_checked(&mut self.viewers, ordinal, viewer)
    }

    pub fn register_viewer_at(
        &mut self,
        ordinal: i32,
        viewer: Box<dyn MoleculeViewer>,
    ) -> Result<(), RegistryError> {
        insert_checked(&mut self.viewers, ordinal, viewer)
    }

    /// First importer accepting `file`. Fails before dispatch when the file
    /// cannot be opened for reading.
    pub fn importer(&self, file: &Path) -> Result<&dyn MoleculeImporter, RegistryError> {
        self.select_importer(file, None)
    }

    /// Like [`Self::importer`], skipping the handler named `exclude`.
    pub fn next_importer(
        &self,
        file: &Path,
        exclude: &str,
    ) -> Result<&dyn MoleculeImporter, RegistryError> {
        self.select_importer(file, Some(exclude))
    }

    pub fn viewer(&self, molecule: &Molecule) -> Result<&dyn MoleculeViewer, RegistryError> {
        first_match(&self.viewers, None, |viewer| viewer.can_handle(molecule))
            .ok_or(RegistryError::NoViewer(molecule.id()))
    }

    pub fn next_viewer(
        &self,
        molecule: &Molecule,
        exclude: &str,
    ) -> Result<&dyn MoleculeViewer, RegistryError> {
        first_match(&self.viewers, Some(exclude), |viewer| {
            viewer.can_handle(molecule)
        })
        .ok_or(RegistryError::NoViewer(molecule.id()))
    }

    pub fn exporter(&self, molecule: &Molecule) -> Result<&dyn MoleculeExporter, RegistryError> {
        first_match(&self.exporters, None, |exporter| exporter.can_handle(molecule))
            .ok_or(RegistryError::NoExporter(molecule.id()))
    }

    pub fn next_exporter(
        &self,
        molecule: &Molecule,
        exclude: &str,
    ) -> Result<&dyn MoleculeExporter, RegistryError> {
        first_match(&self.exporters, Some(exclude), |exporter| {
            exporter.can_handle(molecule)
        })
        .ok_or(RegistryError::NoExporter(molecule.id()))
    }

    /// `(ordinal, unique_id)` of every importer in dispatch order.
    pub fn importer_ids(&self) -> Vec<(i32, String)> {
        listing(&self.importers)
    }

    pub fn exporter_ids(&self) -> Vec<(i32, String)> {
        listing(&self.exporters)
    }

    pub fn viewer_ids(&self) -> Vec<(i32, String)> {
        listing(&self.viewers)
    }

    fn select_importer(
        &self,
        file: &Path,
        exclude: Option<&str>,
    ) -> Result<&dyn MoleculeImporter, RegistryError> {
        if !file.is_file() || File::open(file).is_err() {
            return Err(RegistryError::FileUnreadable(file.to_path_buf()));
        }
        first_match(&self.importers, exclude, |importer| importer.can_handle(file))
            .ok_or_else(|| RegistryError::NoImporter(file.to_path_buf()))
    }
}

fn insert_checked<T: MoleculeHandler + ?Sized>(
    slots: &mut Slots<T>,
    ordinal: i32,
    handler: Box<T>,
) -> Result<(), RegistryError> {
    if ordinal == ORDINAL_RESERVED {
        return Err(RegistryError::ReservedOrdinal(handler.unique_id().to_string()));
    }
    if let Some(existing) = slots.get(&ordinal) {
        return Err(RegistryError::DuplicateOrdinal {
            ordinal,
            existing: existing.unique_id().to_string(),
        });
    }
    debug!(
        "event=handler_register module=handler status=ok handler={} ordinal={}",
        handler.unique_id(),
        ordinal
    );
    slots.insert(ordinal, handler);
    Ok(())
}

fn first_match<'a, T: MoleculeHandler + ?Sized>(
    slots: &'a Slots<T>,
    exclude: Option<&str>,
    accepts: impl Fn(&T) -> bool,
) -> Option<&'a T> {
    slots
        .values()
        .map(Box::as_ref)
        .filter(|handler| exclude != Some(handler.unique_id()))
        .find(|handler| accepts(*handler))
}

fn listing<T: MoleculeHandler + ?Sized>(slots: &Slots<T>) -> Vec<(i32, String)> {
    slots
        .iter()
        .map(|(ordinal, handler)| (*ordinal, handler.unique_id().to_string()))
        .collect()
}
