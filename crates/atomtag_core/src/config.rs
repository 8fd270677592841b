//! Archive configuration loaded from TOML.
//!
//! # Responsibility
//! - Describe where the catalog database and content repositories live.
//! - Validate repository names and paths before any store is opened.
//!
//! # Invariants
//! - A relative `database` path resolves against `base_dir`.
//! - Remote repository names are `[a-z0-9_-]+`.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Configuration of one archive: local content root, catalog file and
/// named remote repositories.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Root of the local content-addressable repository.
    pub base_dir: PathBuf,
    /// SQLite catalog file.
    pub database: PathBuf,
    pub log_level: String,
    /// Absolute log directory; file logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    /// Delete local content files whose file-reference atom was removed.
    pub purge_content_on_remove: bool,
    /// Remote repositories by name.
    pub repositories: BTreeMap<String, PathBuf>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("atomtag-archive"),
            database: PathBuf::from("catalog.db"),
            log_level: default_log_level().to_string(),
            log_dir: None,
            purge_content_on_remove: false,
            repositories: BTreeMap::new(),
        }
    }
}

/// Configuration loading/validation failure.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    EmptyBaseDir,
    InvalidRepositoryName(String),
    EmptyRepositoryPath(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::EmptyBaseDir => write!(f, "base_dir must not be empty"),
            Self::InvalidRepositoryName(name) => write!(
                f,
                "invalid repository name `{name}`; expected [a-z0-9_-]+"
            ),
            Self::EmptyRepositoryPath(name) => {
                write!(f, "repository `{name}` has an empty path")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl ArchiveConfig {
    /// Reads and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Config rooted at `base_dir` with every other field defaulted.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyBaseDir);
        }
        for (name, path) in &self.repositories {
            if !is_valid_repository_name(name) {
                return Err(ConfigError::InvalidRepositoryName(name.clone()));
            }
            if path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyRepositoryPath(name.clone()));
            }
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        if self.database.is_absolute() {
            self.database.clone()
        } else {
            self.base_dir.join(&self.database)
        }
    }

    pub fn repository(&self, name: &str) -> Option<&Path> {
        self.repositories.get(name).map(PathBuf::as_path)
    }
}

pub(crate) fn is_valid_repository_name(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}
