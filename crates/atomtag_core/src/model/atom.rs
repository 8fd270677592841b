//! Atom domain model.
//!
//! # Responsibility
//! - Define the smallest unit of data: one content string plus its types.
//! - Provide the staged `AtomBuilder` used by importers, the catalog read
//!   path and edit flows.
//!
//! # Invariants
//! - `data` is non-empty.
//! - `types` is non-empty and free of duplicates.
//! - Equality and hashing use `id` only.

use crate::model::entity::{
    is_persistent_id, next_placeholder_id, normalize_label, EntityId, ValidationError,
};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Indivisible piece of data carrying one or more classification types.
#[derive(Debug, Clone, Serialize)]
pub struct Atom {
    id: EntityId,
    data: String,
    types: Vec<String>,
}

impl Atom {
    /// Starts a builder for a new, unpersisted atom.
    pub fn builder() -> AtomBuilder {
        AtomBuilder::default()
    }

    /// Starts a builder seeded with this atom's current state.
    ///
    /// The snapshot itself is left untouched.
    pub fn modify(&self) -> AtomBuilder {
        AtomBuilder {
            id: Some(self.id),
            data: Some(self.data.clone()),
            types: self.types.clone(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    /// Types in insertion order.
    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn has_type(&self, value: &str) -> bool {
        self.types.iter().any(|current| current == value)
    }

    /// Returns whether the catalog has assigned this atom a row id.
    pub fn is_persistent(&self) -> bool {
        is_persistent_id(self.id)
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Atom {}

impl Hash for Atom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Atom: id={}; data={}; types=[{}]",
            self.id,
            self.data,
            self.types.join(", ")
        )
    }
}

/// Staged construction of an [`Atom`].
///
/// Every setter validates its input immediately; `build()` only checks that
/// the required fields were supplied.
#[derive(Debug, Clone, Default)]
pub struct AtomBuilder {
    id: Option<EntityId>,
    data: Option<String>,
    types: Vec<String>,
}

impl AtomBuilder {
    /// Pins the atom to an existing catalog row.
    pub fn with_id(mut self, id: EntityId) -> Result<Self, ValidationError> {
        if !is_persistent_id(id) {
            return Err(ValidationError::NonPersistentId(id));
        }
        self.id = Some(id);
        Ok(self)
    }

    pub fn with_data(mut self, data: impl AsRef<str>) -> Result<Self, ValidationError> {
        let data = data.as_ref();
        if data.trim().is_empty() {
            return Err(ValidationError::EmptyData);
        }
        self.data = Some(data.to_string());
        Ok(self)
    }

    /// Adds one type, rejecting blanks and duplicates.
    pub fn with_type(mut self, value: impl AsRef<str>) -> Result<Self, ValidationError> {
        let value = normalize_label(value.as_ref()).ok_or(ValidationError::EmptyType)?;
        if self.types.contains(&value) {
            return Err(ValidationError::DuplicateType(value));
        }
        self.types.push(value);
        Ok(self)
    }

    pub fn with_types<I, S>(self, values: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        values
            .into_iter()
            .try_fold(self, |builder, value| builder.with_type(value))
    }

    /// Replaces the whole type set.
    ///
    /// The replacement must itself be free of blanks and duplicates.
    pub fn replace_types<I, S>(mut self, values: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.types.clear();
        self.with_types(values)
    }

    /// Drops one type if present.
    pub fn remove_type(mut self, value: &str) -> Self {
        let value = value.trim();
        self.types.retain(|current| current != value);
        self
    }

    /// Finalizes the atom.
    ///
    /// Atoms without an explicit id receive a fresh placeholder id.
    pub fn build(self) -> Result<Atom, ValidationError> {
        let data = self.data.ok_or(ValidationError::EmptyData)?;
        if self.types.is_empty() {
            return Err(ValidationError::MissingTypes);
        }

        Ok(Atom {
            id: self.id.unwrap_or_else(next_placeholder_id),
            data,
            types: self.types,
        })
    }
}
