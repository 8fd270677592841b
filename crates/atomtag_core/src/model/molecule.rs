//! Molecule domain model.
//!
//! # Responsibility
//! - Bundle atoms under a set of tags to represent one logical item.
//! - Provide the staged `MoleculeBuilder` for creation and edit flows.
//!
//! # Invariants
//! - At least one atom and at least one tag.
//! - Atoms are an ordered set keyed by atom id; tags are an ordered set of
//!   distinct strings.
//! - A molecule references its atoms; several molecules may share one atom.

use crate::model::atom::Atom;
use crate::model::entity::{
    is_persistent_id, next_placeholder_id, normalize_label, EntityId, ValidationError,
};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Tagged collection of atoms.
#[derive(Debug, Clone, Serialize)]
pub struct Molecule {
    id: EntityId,
    tags: Vec<String>,
    atoms: Vec<Atom>,
}

impl Molecule {
    pub fn builder() -> MoleculeBuilder {
        MoleculeBuilder::default()
    }

    /// Starts a builder seeded with this molecule's current state.
    ///
    /// Building the result yields the desired state for a reconciliation
    /// pass; this snapshot stays unchanged.
    pub fn modify(&self) -> MoleculeBuilder {
        MoleculeBuilder {
            id: Some(self.id),
            tags: self.tags.clone(),
            atoms: self.atoms.clone(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atom_ids(&self) -> Vec<EntityId> {
        self.atoms.iter().map(Atom::id).collect()
    }

    pub fn has_tag(&self, value: &str) -> bool {
        self.tags.iter().any(|current| current == value)
    }

    /// All types of all atoms, in atom order. May contain repeats.
    pub fn atom_types(&self) -> Vec<&str> {
        self.atoms
            .iter()
            .flat_map(|atom| atom.types().iter().map(String::as_str))
            .collect()
    }

    /// Atoms carrying the given type.
    pub fn atoms_of_type(&self, value: &str) -> Vec<&Atom> {
        self.atoms.iter().filter(|atom| atom.has_type(value)).collect()
    }

    pub fn is_persistent(&self) -> bool {
        is_persistent_id(self.id)
    }
}

impl PartialEq for Molecule {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Molecule {}

impl Hash for Molecule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for Molecule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Molecule: id={}; tags=[{}]; atom#={}",
            self.id,
            self.tags.join(", "),
            self.atoms.len()
        )
    }
}

/// Staged construction of a [`Molecule`].
#[derive(Debug, Clone, Default)]
pub struct MoleculeBuilder {
    id: Option<EntityId>,
    tags: Vec<String>,
    atoms: Vec<Atom>,
}

impl MoleculeBuilder {
    /// Pins the molecule to an existing catalog row.
    pub fn with_id(mut self, id: EntityId) -> Result<Self, ValidationError> {
        if !is_persistent_id(id) {
            return Err(ValidationError::NonPersistentId(id));
        }
        self.id = Some(id);
        Ok(self)
    }

    /// Adds one atom, rejecting an atom with an id already present.
    pub fn with_atom(mut self, atom: Atom) -> Result<Self, ValidationError> {
        if self.atoms.contains(&atom) {
            return Err(ValidationError::DuplicateAtom(atom.id()));
        }
        self.atoms.push(atom);
        Ok(self)
    }

    pub fn with_atoms(self, atoms: impl IntoIterator<Item = Atom>) -> Result<Self, ValidationError> {
        atoms
            .into_iter()
            .try_fold(self, |builder, atom| builder.with_atom(atom))
    }

    /// Replaces the whole atom set.
    pub fn replace_atoms(
        mut self,
        atoms: impl IntoIterator<Item = Atom>,
    ) -> Result<Self, ValidationError> {
        self.atoms.clear();
        self.with_atoms(atoms)
    }

    /// Drops the atom with the given id if present.
    pub fn remove_atom(mut self, atom_id: EntityId) -> Self {
        self.atoms.retain(|atom| atom.id() != atom_id);
        self
    }

    /// Adds one tag, rejecting blanks and duplicates.
    pub fn with_tag(mut self, tag: impl AsRef<str>) -> Result<Self, ValidationError> {
        let tag = normalize_label(tag.as_ref()).ok_or(ValidationError::EmptyTag)?;
        if self.tags.contains(&tag) {
            return Err(ValidationError::DuplicateTag(tag));
        }
        self.tags.push(tag);
        Ok(self)
    }

    pub fn with_tags<I, S>(self, tags: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter()
            .try_fold(self, |builder, tag| builder.with_tag(tag))
    }

    /// Replaces the whole tag set.
    pub fn replace_tags<I, S>(mut self, tags: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags.clear();
        self.with_tags(tags)
    }

    /// Drops one tag if present.
    pub fn remove_tag(mut self, tag: &str) -> Self {
        let tag = tag.trim();
        self.tags.retain(|current| current != tag);
        self
    }

    pub fn build(self) -> Result<Molecule, ValidationError> {
        if self.atoms.is_empty() {
            return Err(ValidationError::MissingAtoms);
        }
        if self.tags.is_empty() {
            return Err(ValidationError::MissingTags);
        }

        Ok(Molecule {
            id: self.id.unwrap_or_else(next_placeholder_id),
            tags: self.tags,
            atoms: self.atoms,
        })
    }
}
