use log::debug;
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::{ErrorKind as IoErrorKind, Read};
use std::path::{Component, Path, PathBuf};

const READ_BUFFER_BYTES: usize = 64 * 1024;
const PARTIAL_SUFFIX: &str = ".partial";

/// Content repository failure.
#[derive(Debug)]
pub enum ContentError {
    /// Source file missing or not a regular file.
    SourceNotFound(PathBuf),
    /// Relative reference is malformed or escapes the root.
    InvalidReference(String),
    /// Named remote repository is not configured.
    RepositoryNotFound(String),
    Io { path: PathBuf, source: std::io::Error },
}

impl Display for ContentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceNotFound(path) => write!(f, "source file not found: {}", path.display()),
            Self::InvalidReference(value) => write!(f, "invalid content reference `{value}`"),
            Self::RepositoryNotFound(name) => write!(f, "repository not configured: {name}"),
            Self::Io { path, source } => write!(f, "io error at {}: {source}", path.display()),
        }
    }
}

impl Error for ContentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ContentError + '_ {
    move |source| ContentError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// One content-addressable repository rooted at a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    /// The root is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copies `source` into the repository and returns its relative path.
    ///
    /// Content already present is not rewritten.
    pub fn store_file(&self, source: &Path) -> Result<String, ContentError> {
        if !source.is_file() {
            return Err(ContentError::SourceNotFound(source.to_path_buf()));
        }

        let digest = digest_file(source)?;
        let relative = relative_path_for(&digest)?;
        let target = self.root.join(&relative);
        if target.is_file() {
            debug!("event=content_store module=content status=dedup digest={digest}");
            return Ok(relative);
        }

        self.write_through_partial(&target, |partial| {
            std::fs::copy(source, partial).map(|_| ())
        })?;
        debug!("event=content_store module=content status=ok digest={digest}");
        Ok(relative)
    }

    /// Writes `bytes` into the repository and returns its relative path.
    pub fn store_bytes(&self, bytes: &[u8]) -> Result<String, ContentError> {
        let digest = hex::encode(Sha256::digest(bytes));
        let relative = relative_path_for(&digest)?;
        let target = self.root.join(&relative);
        if target.is_file() {
            return Ok(relative);
        }

        self.write_through_partial(&target, |partial| std::fs::write(partial, bytes))?;
        debug!("event=content_store module=content status=ok digest={digest}");
        Ok(relative)
    }

    /// Absolute location of a relative reference; the file may not exist.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, ContentError> {
        validate_reference(relative)?;
        Ok(self.root.join(relative))
    }

    pub fn contains(&self, relative: &str) -> Result<bool, ContentError> {
        Ok(self.resolve(relative)?.is_file())
    }

    /// Deletes stored content and prunes digest directories left empty.
    /// Returns whether a file was deleted.
    pub fn remove(&self, relative: &str) -> Result<bool, ContentError> {
        let target = self.resolve(relative)?;
        match std::fs::remove_file(&target) {
            Ok(()) => {}
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(io_error(&target)(err)),
        }

        let mut dir = target.parent();
        while let Some(current) = dir {
            if current == self.root || !is_empty_dir(current)? {
                break;
            }
            std::fs::remove_dir(current).map_err(io_error(current))?;
            dir = current.parent();
        }
        debug!("event=content_remove module=content status=ok");
        Ok(true)
    }

    /// Writes `target` via a sibling `.partial` file renamed into place.
    /// The partial file is removed on any failure.
    fn write_through_partial(
        &self,
        target: &Path,
        write: impl FnOnce(&Path) -> std::io::Result<()>,
    ) -> Result<(), ContentError> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let mut partial = target.as_os_str().to_owned();
        partial.push(PARTIAL_SUFFIX);
        let partial = PathBuf::from(partial);

        if let Err(err) = write(&partial) {
            let _ = std::fs::remove_file(&partial);
            return Err(io_error(&partial)(err));
        }
        if let Err(err) = std::fs::rename(&partial, target) {
            let _ = std::fs::remove_file(&partial);
            return Err(io_error(target)(err));
        }
        Ok(())
    }
}

/// Lowercase hex SHA-256 of a file's full content.
pub fn digest_file(path: &Path) -> Result<String, ContentError> {
    let mut file = File::open(path).map_err(|err| {
        if err.kind() == IoErrorKind::NotFound {
            ContentError::SourceNotFound(path.to_path_buf())
        } else {
            io_error(path)(err)
        }
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0_u8; READ_BUFFER_BYTES];
    loop {
        let read = file.read(&mut buffer).map_err(io_error(path))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// `ab/cd/<rest>` for digest `abcd<rest>`.
fn relative_path_for(digest: &str) -> Result<String, ContentError> {
    match (digest.get(..2), digest.get(2..4), digest.get(4..)) {
        (Some(head), Some(middle), Some(rest)) if !rest.is_empty() => {
            Ok(format!("{head}/{middle}/{rest}"))
        }
        _ => Err(ContentError::InvalidReference(digest.to_string())),
    }
}

fn validate_reference(relative: &str) -> Result<(), ContentError> {
    let path = Path::new(relative);
    let well_formed = !relative.trim().is_empty()
        && !relative.contains('\\')
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if well_formed {
        Ok(())
    } else {
        Err(ContentError::InvalidReference(relative.to_string()))
    }
}

fn is_empty_dir(path: &Path) -> Result<bool, ContentError> {
    let mut entries = std::fs::read_dir(path).map_err(io_error(path))?;
    Ok(entries.next().is_none())
}
