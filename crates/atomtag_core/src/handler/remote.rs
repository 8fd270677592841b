//! Viewer for molecules whose content lives in a remote repository.

use crate::content::{split_reference, RepositorySet};
use crate::handler::text::render_molecule;
use crate::handler::{
    write_error, HandlerError, MoleculeHandler, MoleculeViewer, Verbosity, ORDINAL_RESERVED,
};
use crate::model::core_types::FILEREF;
use crate::model::molecule::Molecule;
use std::io::Write;
use std::sync::Arc;

pub const REMOTE_VIEWER_ORDINAL: i32 = ORDINAL_RESERVED - 100;

pub struct RemoteViewer {
    repositories: Arc<RepositorySet>,
}

impl RemoteViewer {
    pub fn new(repositories: Arc<RepositorySet>) -> Self {
        Self { repositories }
    }
}

impl MoleculeHandler for RemoteViewer {
    fn unique_id(&self) -> &str {
        "atomtag-remoteviewer"
    }

    fn ordinal(&self) -> i32 {
        REMOTE_VIEWER_ORDINAL
    }
}

impl MoleculeViewer for RemoteViewer {
    /// Claims molecules referencing content in any remote repository.
    fn can_handle(&self, molecule: &Molecule) -> bool {
        molecule
            .atoms_of_type(FILEREF)
            .iter()
            .any(|atom| split_reference(atom.data()).0.is_some())
    }

    fn text_representation(
        &self,
        molecule: &Molecule,
        max_length: usize,
        verbosity: Verbosity,
    ) -> String {
        render_molecule(molecule, max_length, verbosity)
    }

    /// Reports, per remote file, whether its repository is reachable.
    fn show_molecule(&self, molecule: &Molecule, out: &mut dyn Write) -> Result<(), HandlerError> {
        writeln!(out, "{}", render_molecule(molecule, 80, Verbosity::Verbose))
            .map_err(write_error)?;

        for atom in molecule.atoms_of_type(FILEREF) {
            let (Some(repository), relative) = split_reference(atom.data()) else {
                continue;
            };
            let path = match self.repositories.remote(repository) {
                Some(store) => store.resolve(relative)?,
                None => {
                    writeln!(
                        out,
                        " unavailable: {relative} (repository `{repository}` is not configured)"
                    )
                    .map_err(write_error)?;
                    continue;
                }
            };
            if path.is_file() {
                writeln!(out, " available: {}", path.display()).map_err(write_error)?;
            } else {
                writeln!(
                    out,
                    " unavailable: {} (connect repository `{repository}`)",
                    path.display()
                )
                .map_err(write_error)?;
            }
        }
        Ok(())
    }
}
