//! Exporter copying a molecule's referenced content to a target file.

use crate::content::RepositorySet;
use crate::content::ContentError;
use crate::handler::{HandlerError, MoleculeExporter, MoleculeHandler};
use crate::model::core_types::FILEREF;
use crate::model::molecule::Molecule;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct ContentExporter {
    repositories: Arc<RepositorySet>,
}

impl ContentExporter {
    pub fn new(repositories: Arc<RepositorySet>) -> Self {
        Self { repositories }
    }
}

impl MoleculeHandler for ContentExporter {
    fn unique_id(&self) -> &str {
        "atomtag-contentexporter"
    }

    fn ordinal(&self) -> i32 {
        10
    }
}

impl MoleculeExporter for ContentExporter {
    fn can_handle(&self, molecule: &Molecule) -> bool {
        !molecule.atoms_of_type(FILEREF).is_empty()
    }

    fn export_to_file(&self, molecule: &Molecule, target: &Path) -> Result<(), HandlerError> {
        let source = locate_content(&self.repositories, molecule)?;
        if !source.is_file() {
            return Err(ContentError::SourceNotFound(source).into());
        }

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| HandlerError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::copy(&source, target).map_err(|source| HandlerError::Io {
            path: target.to_path_buf(),
            source,
        })?;
        info!(
            "event=molecule_export module=handler status=ok handler={} molecule_id={}",
            self.unique_id(),
            molecule.id()
        );
        Ok(())
    }
}

/// Absolute path of the molecule's first file reference, resolved in the
/// repository the reference names.
pub(crate) fn locate_content(
    repositories: &RepositorySet,
    molecule: &Molecule,
) -> Result<PathBuf, HandlerError> {
    let reference = molecule
        .atoms_of_type(FILEREF)
        .into_iter()
        .next()
        .ok_or(HandlerError::MissingFileReference(molecule.id()))?;
    Ok(repositories.locate(reference.data())?)
}
