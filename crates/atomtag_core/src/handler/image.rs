//! Image importer; tags images on top of the generic file layout.

use crate::content::RepositorySet;
use crate::handler::generic::{import_stored_file, GENERIC_FILE_TAG};
use crate::handler::{HandlerError, MoleculeHandler, MoleculeImporter};
use crate::model::core_types::FILETYPE_IMAGE;
use crate::model::molecule::Molecule;
use crate::repo::Catalog;
use log::info;
use std::path::Path;
use std::sync::Arc;

pub const IMAGE_TAG: &str = "image";
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "gif", "png"];

pub struct ImageImporter {
    repositories: Arc<RepositorySet>,
}

impl ImageImporter {
    pub fn new(repositories: Arc<RepositorySet>) -> Self {
        Self { repositories }
    }
}

impl MoleculeHandler for ImageImporter {
    fn unique_id(&self) -> &str {
        "atomtag-imageimporter"
    }

    fn ordinal(&self) -> i32 {
        1
    }
}

impl MoleculeImporter for ImageImporter {
    /// Accepts by file extension, case-insensitively.
    fn can_handle(&self, file: &Path) -> bool {
        file.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false)
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
            FILETYPE_IMAGE,
            &[GENERIC_FILE_TAG, IMAGE_TAG],
        )?;
        info!(
            "event=file_import module=handler status=ok handler={} molecule_id={}",
            self.unique_id(),
            molecule.id()
        );
        Ok(vec![molecule])
    }
}
