//! Local and named remote content repositories.

use crate::config::ArchiveConfig;
use crate::content::store::{ContentError, ContentStore};
use std::collections::BTreeMap;
use std::path::PathBuf;

const REPOSITORY_SEPARATOR: char = ':';

/// Catalog form of a stored file: the bare relative path for the local
/// repository, `<name>:<relative>` for a remote one.
///
/// Qualifying remote references keeps atom dedup from merging the same
/// bytes stored in two repositories.
pub fn qualified_reference(repository: Option<&str>, relative: &str) -> String {
    match repository {
        Some(name) => format!("{name}{REPOSITORY_SEPARATOR}{relative}"),
        None => relative.to_string(),
    }
}

/// Splits a catalog reference into its repository name (`None` = local)
/// and the relative path inside that repository.
pub fn split_reference(reference: &str) -> (Option<&str>, &str) {
    match reference.split_once(REPOSITORY_SEPARATOR) {
        Some((name, relative)) => (Some(name), relative),
        None => (None, reference),
    }
}

/// The local repository plus every configured remote one.
#[derive(Debug, Clone)]
pub struct RepositorySet {
    local: ContentStore,
    remotes: BTreeMap<String, ContentStore>,
}

impl RepositorySet {
    pub fn new(local: ContentStore) -> Self {
        Self {
            local,
            remotes: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &ArchiveConfig) -> Self {
        let mut set = Self::new(ContentStore::new(&config.base_dir));
        for (name, root) in &config.repositories {
            set = set.with_remote(name.clone(), ContentStore::new(root));
        }
        set
    }

    pub fn with_remote(mut self, name: impl Into<String>, store: ContentStore) -> Self {
        self.remotes.insert(name.into(), store);
        self
    }

    pub fn local(&self) -> &ContentStore {
        &self.local
    }

    pub fn remote(&self, name: &str) -> Option<&ContentStore> {
        self.remotes.get(name)
    }

    pub fn remote_names(&self) -> impl Iterator<Item = &str> {
        self.remotes.keys().map(String::as_str)
    }

    /// Store selected by an optional repository name, and whether it is
    /// remote. `None` selects the local repository.
    pub fn resolve(&self, name: Option<&str>) -> Result<(&ContentStore, bool), ContentError> {
        match name {
            None => Ok((&self.local, false)),
            Some(name) => self
                .remotes
                .get(name)
                .map(|store| (store, true))
                .ok_or_else(|| ContentError::RepositoryNotFound(name.to_string())),
        }
    }

    /// Absolute path of a catalog reference in the repository it names.
    pub fn locate(&self, reference: &str) -> Result<PathBuf, ContentError> {
        let (name, relative) = split_reference(reference);
        let (store, _) = self.resolve(name)?;
        store.resolve(relative)
    }
}
