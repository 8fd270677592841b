//! Entity identity and shared validation errors.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};

/// Identifier shared by atoms and molecules.
///
/// Negative values are process-unique placeholders for unpersisted entities;
/// positive values are catalog-assigned row ids.
pub type EntityId = i64;

static PLACEHOLDER_IDS: AtomicI64 = AtomicI64::new(-1);

/// Draws the next placeholder id for an unpersisted entity.
///
/// The counter only moves downwards, so two placeholders handed out by the
/// same process never collide.
pub fn next_placeholder_id() -> EntityId {
    PLACEHOLDER_IDS.fetch_sub(1, Ordering::Relaxed)
}

/// Returns whether the identifier denotes a persisted entity.
pub fn is_persistent_id(id: EntityId) -> bool {
    id > 0
}

/// Builder validation failures.
///
/// Raised at the call that introduced the bad value, or by `build()` when a
/// required field was never supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Explicit ids must denote a persisted row.
    NonPersistentId(EntityId),
    EmptyData,
    EmptyType,
    DuplicateType(String),
    MissingTypes,
    EmptyTag,
    DuplicateTag(String),
    MissingTags,
    DuplicateAtom(EntityId),
    MissingAtoms,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPersistentId(id) => {
                write!(f, "explicit entity id must be positive, got {id}")
            }
            Self::EmptyData => write!(f, "atom data must not be empty"),
            Self::EmptyType => write!(f, "atom type must not be empty"),
            Self::DuplicateType(value) => write!(f, "atom already has type `{value}`"),
            Self::MissingTypes => write!(f, "atom requires at least one type"),
            Self::EmptyTag => write!(f, "molecule tag must not be empty"),
            Self::DuplicateTag(value) => write!(f, "molecule already has tag `{value}`"),
            Self::MissingTags => write!(f, "molecule requires at least one tag"),
            Self::DuplicateAtom(id) => write!(f, "molecule already contains atom {id}"),
            Self::MissingAtoms => write!(f, "molecule requires at least one atom"),
        }
    }
}

impl Error for ValidationError {}

/// Trims a label and rejects blank input.
pub(crate) fn normalize_label(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
