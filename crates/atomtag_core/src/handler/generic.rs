//! Fallback importer and viewer, registered at [`ORDINAL_RESERVED`].

use crate::content::{qualified_reference, split_reference, RepositorySet};
use crate::handler::text::render_molecule;
use crate::handler::{
    write_error, HandlerError, MoleculeHandler, MoleculeImporter, MoleculeViewer, Verbosity,
    ORDINAL_RESERVED,
};
use crate::model::atom::Atom;
use crate::model::core_types::{
    FILENAME, FILEREF, FILEREF_REMOTE, FILEREF_REMOTE_LOCATION, FILETYPE_UNKNOWN,
};
use crate::model::molecule::Molecule;
use crate::repo::Catalog;
use log::info;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub const GENERIC_FILE_TAG: &str = "generic-file";

/// Imports any file as a `filename` atom plus a file-reference atom.
pub struct GenericImporter {
    repositories: Arc<RepositorySet>,
}

impl GenericImporter {
    pub fn new(repositories: Arc<RepositorySet>) -> Self {
        Self { repositories }
    }
}

impl MoleculeHandler for GenericImporter {
    fn unique_id(&self) -> &str {
        "atomtag-genericimporter"
    }

    fn ordinal(&self) -> i32 {
        ORDINAL_RESERVED
    }
}

impl MoleculeImporter for GenericImporter {
    fn can_handle(&self, _file: &Path) -> bool {
        true
    }

    fn import_file(
        &self,
        catalog: &dyn Catalog,
        file: &Path,
        repository: Option<&str>,
    ) -> Result<Vec<Molecule>, HandlerError> {
        let molecule = import_stored_file(
            catalog,
            &self.repositories,
            file,
            repository,
            FILETYPE_UNKNOWN,
            &[GENERIC_FILE_TAG],
        )?;
        info!(
            "event=file_import module=handler status=ok handler={} molecule_id={}",
            self.unique_id(),
            molecule.id()
        );
        Ok(vec![molecule])
    }
}

/// Copies `file` into the selected repository and persists one molecule
/// describing it.
///
/// Remote imports store a repository-qualified reference typed
/// `x-remotefile` and carry a location atom naming the repository.
pub(crate) fn import_stored_file(
    catalog: &dyn Catalog,
    repositories: &RepositorySet,
    file: &Path,
    repository: Option<&str>,
    filetype: &str,
    tags: &[&str],
) -> Result<Molecule, HandlerError> {
    let file_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            HandlerError::Unsupported(format!("file name of `{}` is not UTF-8", file.display()))
        })?;
    let (store, is_remote) = repositories.resolve(repository)?;
    let relative = store.store_file(file)?;
    let reference_data = if is_remote {
        qualified_reference(repository, &relative)
    } else {
        relative
    };

    let filename = Atom::builder()
        .with_data(file_name)?
        .with_type(FILENAME)?
        .build()?;
    let mut reference = Atom::builder()
        .with_data(&reference_data)?
        .with_type(FILEREF)?
        .with_type(filetype)?;
    if is_remote {
        reference = reference.with_type(FILEREF_REMOTE)?;
    }

    let mut builder = Molecule::builder()
        .with_atom(filename)?
        .with_atom(reference.build()?)?
        .with_tags(tags)?;
    if let (true, Some(name)) = (is_remote, repository) {
        let location = Atom::builder()
            .with_data(name)?
            .with_type(FILEREF_REMOTE_LOCATION)?
            .build()?;
        builder = builder.with_atom(location)?;
    }

    Ok(catalog.create_molecule(&builder.build()?)?)
}

/// Renders any molecule in the column layout.
pub struct GenericViewer {
    repositories: Arc<RepositorySet>,
}

impl GenericViewer {
    pub fn new(repositories: Arc<RepositorySet>) -> Self {
        Self { repositories }
    }
}

impl MoleculeHandler for GenericViewer {
    fn unique_id(&self) -> &str {
        "atomtag-genericviewer"
    }

    fn ordinal(&self) -> i32 {
        ORDINAL_RESERVED
    }
}

impl MoleculeViewer for GenericViewer {
    fn can_handle(&self, _molecule: &Molecule) -> bool {
        true
    }

    fn text_representation(
        &self,
        molecule: &Molecule,
        max_length: usize,
        verbosity: Verbosity,
    ) -> String {
        render_molecule(molecule, max_length, verbosity)
    }

    /// Verbose text followed by the resolved path of every local file.
    fn show_molecule(&self, molecule: &Molecule, out: &mut dyn Write) -> Result<(), HandlerError> {
        writeln!(out, "{}", render_molecule(molecule, 80, Verbosity::Verbose))
            .map_err(write_error)?;

        let local = self.repositories.local();
        for atom in molecule.atoms_of_type(FILEREF) {
            let (repository, relative) = split_reference(atom.data());
            if repository.is_some() {
                continue;
            }
            let path = local.resolve(relative)?;
            let state = if path.is_file() { "file" } else { "missing" };
            writeln!(out, " {state}: {}", path.display()).map_err(write_error)?;
        }
        Ok(())
    }
}
