//! Built-in atom type vocabulary.
//!
//! Core types mark atoms the system itself manages (file references and
//! their classification). Everything else is user vocabulary.

/// Attached to every atom that points to a file in a content repository.
pub const FILEREF: &str = "x-fileref";
/// Attached to file references living in a remote repository that may be
/// unavailable at times.
pub const FILEREF_REMOTE: &str = "x-remotefile";
/// Attached to the atom naming the remote repository of a molecule.
pub const FILEREF_REMOTE_LOCATION: &str = "x-remotelocation";
/// File content of unknown kind.
pub const FILETYPE_UNKNOWN: &str = "x-filetype-unknown";
/// Video file content.
pub const FILETYPE_VIDEO: &str = "x-filetype-video";
/// Image file content.
pub const FILETYPE_IMAGE: &str = "x-filetype-image";

/// Every core type, kept next to the constants above.
pub const CORE_TYPES: &[&str] = &[
    FILEREF,
    FILEREF_REMOTE,
    FILEREF_REMOTE_LOCATION,
    FILETYPE_UNKNOWN,
    FILETYPE_VIDEO,
    FILETYPE_IMAGE,
];

/// User type carrying the original file name of an imported file.
pub const FILENAME: &str = "filename";
/// User type carrying a human-readable title.
pub const TITLE: &str = "title";
/// User type carrying a display name.
pub const NAME: &str = "name";

/// Returns whether `value` belongs to the built-in vocabulary.
pub fn is_core_type(value: &str) -> bool {
    CORE_TYPES.contains(&value)
}

/// Returns the core types as owned strings, for catalog queries.
pub fn core_types() -> Vec<String> {
    CORE_TYPES.iter().map(|value| (*value).to_string()).collect()
}
