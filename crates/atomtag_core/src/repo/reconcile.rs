//! Reconciliation of persisted entities towards a desired state.
//!
//! # Responsibility
//! - Diff a persisted molecule/atom against a caller-built desired snapshot.
//! - Apply the minimal link/unlink set inside one transaction.
//! - Enforce the orphan-atom lifecycle on unlink and on molecule removal.
//!
//! # Invariants
//! - An atom is never left persisted without an owning molecule.
//! - Tags and types are never deleted as a side effect of one edit; only
//!   [`Reconciler::prune_orphan_vocabulary`] removes unreferenced vocabulary.
//! - Any failure rolls back the whole operation.

use crate::model::atom::Atom;
use crate::content::split_reference;
use crate::model::core_types::FILEREF;
use crate::model::entity::EntityId;
use crate::model::molecule::Molecule;
use crate::repo::catalog::{
    atom_exists, link_atom, link_tag, link_type, load_atom, load_atom_ids_for_molecule,
    load_molecule, molecule_exists, query_ids, resolve_atom_id, RepoError, RepoResult,
};
use log::{error, info};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::collections::HashSet;
use std::time::Instant;

/// Pure difference between a persisted and a desired molecule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoleculeDelta {
    pub tags_to_add: Vec<String>,
    pub tags_to_remove: Vec<String>,
    pub atoms_to_add: Vec<Atom>,
    pub atoms_to_remove: Vec<EntityId>,
}

impl MoleculeDelta {
    /// Tag difference by value, atom difference by identity.
    pub fn between(persisted: &Molecule, desired: &Molecule) -> Self {
        let tags_to_add = desired
            .tags()
            .iter()
            .filter(|tag| !persisted.has_tag(tag))
            .cloned()
            .collect();
        let tags_to_remove = persisted
            .tags()
            .iter()
            .filter(|tag| !desired.has_tag(tag))
            .cloned()
            .collect();

        let persisted_ids: HashSet<EntityId> = persisted.atom_ids().into_iter().collect();
        let desired_ids: HashSet<EntityId> = desired.atom_ids().into_iter().collect();
        let atoms_to_add = desired
            .atoms()
            .iter()
            .filter(|atom| !persisted_ids.contains(&atom.id()))
            .cloned()
            .collect();
        let atoms_to_remove = persisted
            .atom_ids()
            .into_iter()
            .filter(|id| !desired_ids.contains(id))
            .collect();

        Self {
            tags_to_add,
            tags_to_remove,
            atoms_to_add,
            atoms_to_remove,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tags_to_add.is_empty()
            && self.tags_to_remove.is_empty()
            && self.atoms_to_add.is_empty()
            && self.atoms_to_remove.is_empty()
    }
}

/// Link mutations performed by one molecule reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub tags_linked: usize,
    pub tags_unlinked: usize,
    pub atoms_linked: usize,
    pub atoms_unlinked: usize,
    pub atoms_deleted: usize,
}

impl ReconcileReport {
    /// `true` when no row was written.
    pub fn is_noop(&self) -> bool {
        self.tags_linked == 0
            && self.tags_unlinked == 0
            && self.atoms_linked == 0
            && self.atoms_unlinked == 0
            && self.atoms_deleted == 0
    }
}

/// Outcome of removing a whole molecule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub molecule_id: EntityId,
    pub atoms_unlinked: usize,
    pub atoms_deleted: usize,
    /// Data of deleted local file-reference atoms; the content they point to
    /// is no longer referenced by the catalog.
    pub released_content: Vec<String>,
}

/// Type mutations performed by one atom reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AtomReconcileReport {
    pub types_linked: usize,
    pub types_unlinked: usize,
}

/// Outcome of removing one atom from the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomRemovalReport {
    pub atom_id: EntityId,
    pub molecules_unlinked: usize,
    pub released_content: Option<String>,
}

/// Vocabulary rows deleted by a prune pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub tags_deleted: usize,
    pub types_deleted: usize,
}

/// Update/delete contract over persisted entities.
pub trait Reconciler {
    fn reconcile_molecule(&self, desired: &Molecule) -> RepoResult<ReconcileReport>;
    fn remove_molecule(&self, molecule_id: EntityId) -> RepoResult<RemovalReport>;
    fn reconcile_atom(&self, desired: &Atom) -> RepoResult<AtomReconcileReport>;
    fn remove_atom(&self, atom_id: EntityId) -> RepoResult<AtomRemovalReport>;
    fn prune_orphan_vocabulary(&self) -> RepoResult<PruneReport>;
}

/// SQLite-backed reconciler sharing the catalog's connection.
pub struct SqliteReconciler<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReconciler<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn in_transaction<T>(
        &self,
        event: &str,
        apply: impl FnOnce(&Connection) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let started_at = Instant::now();
        let result = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(RepoError::from)
            .and_then(|tx| {
                let value = apply(&tx)?;
                tx.commit()?;
                Ok(value)
            });

        match &result {
            Ok(_) => info!(
                "event={event} module=reconcile status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event={event} module=reconcile status=error duration_ms={} error_kind={:?} error={}",
                started_at.elapsed().as_millis(),
                err.kind(),
                err
            ),
        }
        result
    }
}

impl Reconciler for SqliteReconciler<'_> {
    fn reconcile_molecule(&self, desired: &Molecule) -> RepoResult<ReconcileReport> {
        if !desired.is_persistent() {
            return Err(RepoError::MoleculeNotFound(desired.id()));
        }

        self.in_transaction("molecule_reconcile", |conn| {
            let molecule_id = desired.id();
            let persisted = load_molecule(conn, molecule_id)?
                .ok_or(RepoError::MoleculeNotFound(molecule_id))?;
            let delta = MoleculeDelta::between(&persisted, desired);
            let mut report = ReconcileReport::default();
            if delta.is_empty() {
                return Ok(report);
            }

            for tag in &delta.tags_to_add {
                if link_tag(conn, molecule_id, tag)? {
                    report.tags_linked += 1;
                }
            }
            for tag in &delta.tags_to_remove {
                report.tags_unlinked += unlink_tag(conn, molecule_id, tag)?;
            }

            let linked: HashSet<EntityId> = persisted.atom_ids().into_iter().collect();
            let mut resolved = HashSet::new();
            for atom in &delta.atoms_to_add {
                let atom_id = resolve_atom_id(conn, atom)?;
                resolved.insert(atom_id);
                if linked.contains(&atom_id) {
                    continue;
                }
                if link_atom(conn, molecule_id, atom_id)? {
                    report.atoms_linked += 1;
                }
            }

            for atom_id in delta
                .atoms_to_remove
                .iter()
                .filter(|atom_id| !resolved.contains(atom_id))
            {
                report.atoms_unlinked += 1;
                if unlink_atom(conn, molecule_id, *atom_id)?.is_some() {
                    report.atoms_deleted += 1;
                }
            }

            Ok(report)
        })
    }

    fn remove_molecule(&self, molecule_id: EntityId) -> RepoResult<RemovalReport> {
        self.in_transaction("molecule_remove", |conn| {
            if !molecule_exists(conn, molecule_id)? {
                return Err(RepoError::MoleculeNotFound(molecule_id));
            }

            let mut report = RemovalReport {
                molecule_id,
                ..RemovalReport::default()
            };
            for atom_id in load_atom_ids_for_molecule(conn, molecule_id)? {
                report.atoms_unlinked += 1;
                if let Some(atom) = unlink_atom(conn, molecule_id, atom_id)? {
                    report.atoms_deleted += 1;
                    if is_local_fileref(&atom) {
                        report.released_content.push(atom.data().to_string());
                    }
                }
            }

            conn.execute(
                "DELETE FROM molecule_has_tags WHERE molecule_id = ?1;",
                [molecule_id],
            )?;
            conn.execute("DELETE FROM molecules WHERE id = ?1;", [molecule_id])?;
            Ok(report)
        })
    }

    fn reconcile_atom(&self, desired: &Atom) -> RepoResult<AtomReconcileReport> {
        if !desired.is_persistent() {
            return Err(RepoError::AtomNotFound(desired.id()));
        }

        self.in_transaction("atom_reconcile", |conn| {
            let atom_id = desired.id();
            let persisted = load_atom(conn, atom_id)?.ok_or(RepoError::AtomNotFound(atom_id))?;
            if persisted.data() != desired.data() {
                return Err(RepoError::InvalidArgument(format!(
                    "data of persisted atom {atom_id} cannot change"
                )));
            }

            let mut report = AtomReconcileReport::default();
            for value in desired.types() {
                if !persisted.has_type(value) && link_type(conn, atom_id, value)? {
                    report.types_linked += 1;
                }
            }
            for value in persisted.types() {
                if !desired.has_type(value) {
                    report.types_unlinked += conn.execute(
                        "DELETE FROM atom_has_types
                         WHERE atom_id = ?1
                           AND type_id = (SELECT id FROM types WHERE type = ?2);",
                        params![atom_id, value],
                    )?;
                }
            }
            Ok(report)
        })
    }

    fn remove_atom(&self, atom_id: EntityId) -> RepoResult<AtomRemovalReport> {
        self.in_transaction("atom_remove", |conn| {
            let atom = load_atom(conn, atom_id)?.ok_or(RepoError::AtomNotFound(atom_id))?;

            let owners = query_ids(
                conn,
                "SELECT molecule_id FROM molecule_has_atoms WHERE atom_id = ?1 ORDER BY molecule_id;",
                [atom_id],
            )?;
            for molecule_id in &owners {
                let remaining: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM molecule_has_atoms WHERE molecule_id = ?1;",
                    [molecule_id],
                    |row| row.get(0),
                )?;
                if remaining <= 1 {
                    return Err(RepoError::InvalidArgument(format!(
                        "atom {atom_id} is the last atom of molecule {molecule_id}"
                    )));
                }
            }

            conn.execute("DELETE FROM molecule_has_atoms WHERE atom_id = ?1;", [atom_id])?;
            delete_atom_row(conn, atom_id)?;

            Ok(AtomRemovalReport {
                atom_id,
                molecules_unlinked: owners.len(),
                released_content: is_local_fileref(&atom).then(|| atom.data().to_string()),
            })
        })
    }

    fn prune_orphan_vocabulary(&self) -> RepoResult<PruneReport> {
        self.in_transaction("vocabulary_prune", |conn| {
            let tags_deleted = conn.execute(
                "DELETE FROM tags
                 WHERE NOT EXISTS (
                    SELECT 1 FROM molecule_has_tags mt WHERE mt.tag_id = tags.id
                 );",
                [],
            )?;
            let types_deleted = conn.execute(
                "DELETE FROM types
                 WHERE NOT EXISTS (
                    SELECT 1 FROM atom_has_types at WHERE at.type_id = types.id
                 );",
                [],
            )?;
            Ok(PruneReport {
                tags_deleted,
                types_deleted,
            })
        })
    }
}

fn unlink_tag(conn: &Connection, molecule_id: EntityId, tag: &str) -> RepoResult<usize> {
    let changed = conn.execute(
        "DELETE FROM molecule_has_tags
         WHERE molecule_id = ?1
           AND tag_id = (SELECT id FROM tags WHERE tag = ?2);",
        params![molecule_id, tag],
    )?;
    Ok(changed)
}

/// Removes one molecule-atom link and deletes the atom once no molecule
/// links it anymore. Returns the deleted atom.
fn unlink_atom(
    conn: &Connection,
    molecule_id: EntityId,
    atom_id: EntityId,
) -> RepoResult<Option<Atom>> {
    let link_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM molecule_has_atoms WHERE atom_id = ?1;",
        [atom_id],
        |row| row.get(0),
    )?;
    if link_count == 0 {
        return Err(RepoError::Integrity(format!(
            "atom {atom_id} of molecule {molecule_id} has no link rows"
        )));
    }

    let removed = conn.execute(
        "DELETE FROM molecule_has_atoms WHERE molecule_id = ?1 AND atom_id = ?2;",
        params![molecule_id, atom_id],
    )?;
    if removed != 1 {
        return Err(RepoError::Integrity(format!(
            "molecule {molecule_id} claims atom {atom_id} without a link row"
        )));
    }

    if link_count > 1 {
        return Ok(None);
    }

    let atom = load_atom(conn, atom_id)?.ok_or_else(|| {
        RepoError::Integrity(format!("linked atom {atom_id} has no atom row"))
    })?;
    delete_atom_row(conn, atom_id)?;
    Ok(Some(atom))
}

fn delete_atom_row(conn: &Connection, atom_id: EntityId) -> RepoResult<()> {
    if !atom_exists(conn, atom_id)? {
        return Err(RepoError::AtomNotFound(atom_id));
    }
    conn.execute("DELETE FROM atom_has_types WHERE atom_id = ?1;", [atom_id])?;
    conn.execute("DELETE FROM atoms WHERE id = ?1;", [atom_id])?;
    Ok(())
}

fn is_local_fileref(atom: &Atom) -> bool {
    atom.has_type(FILEREF) && split_reference(atom.data()).0.is_none()
}
