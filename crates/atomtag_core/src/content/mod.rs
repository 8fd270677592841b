//! Content-addressable file repositories.
//!
//! Imported files are copied under a path derived from the SHA-256 digest of
//! their bytes (`ab/cd/<rest>`), so identical content is stored once and the
//! relative path doubles as a stable file reference in atom data. References
//! into remote repositories are prefixed with the repository name.

pub mod repository;
pub mod store;

pub use repository::{qualified_reference, split_reference, RepositorySet};
pub use store::{digest_file, ContentError, ContentStore};
