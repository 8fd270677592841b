//! Entity model for atoms and molecules.
//!
//! # Responsibility
//! - Define the in-memory snapshots used by catalog, reconciler and handlers.
//! - Provide staged builders that validate every field eagerly.
//!
//! # Invariants
//! - Identifiers are negative until persisted and positive afterwards.
//! - Entity equality and hashing use the identifier only, never content.
//! - Snapshots are never mutated after persistence; edits go through
//!   `modify()` and a reconciliation pass.

pub mod atom;
pub mod core_types;
pub mod entity;
pub mod molecule;
