//! Catalog contracts and SQLite implementation.
//!
//! # Responsibility
//! - Deduplicated lookup-or-create persistence for atoms, tags and types.
//! - Reconstruct full atom/molecule snapshots by joining link tables.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - At most one row per distinct atom `data`, tag value and type value.
//! - Multi-row writes run in one transaction and roll back entirely on error.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Lookups by id report absence as `Ok(None)`, not as an error.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::atom::Atom;
use crate::model::core_types::core_types;
use crate::model::entity::{EntityId, ValidationError};
use crate::model::molecule::Molecule;
use log::{error, info};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior,
};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type RepoResult<T> = Result<T, RepoError>;

/// Coarse failure classification shared by every layer above the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller misuse: missing/duplicate fields, illegal edits.
    InvalidArgument,
    /// Lookup by identifier found no row where one was required.
    NotFound,
    /// Backend communication or constraint failure.
    StorageFailure,
    /// A guarantee the catalog itself maintains was found broken.
    IntegrityViolation,
}

/// Catalog and reconciliation error.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    InvalidArgument(String),
    Db(DbError),
    AtomNotFound(EntityId),
    MoleculeNotFound(EntityId),
    Integrity(String),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::AtomNotFound(_) | Self::MoleculeNotFound(_) => ErrorKind::NotFound,
            Self::Db(_) | Self::UninitializedConnection { .. } => ErrorKind::StorageFailure,
            Self::Integrity(_) | Self::InvalidData(_) => ErrorKind::IntegrityViolation,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::AtomNotFound(id) => write!(f, "atom not found: {id}"),
            Self::MoleculeNotFound(id) => write!(f, "molecule not found: {id}"),
            Self::Integrity(message) => write!(f, "catalog integrity violation: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted catalog data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "catalog requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Type-list filter mode for [`Catalog::find_atoms_by_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFilter {
    /// Atoms carrying at least one of the listed types.
    Include,
    /// Atoms carrying none of the listed types.
    Exclude,
}

/// Repository interface for the tagging catalog.
pub trait Catalog {
    /// Returns the id of `tag`, inserting it when absent.
    fn find_or_create_tag(&self, tag: &str) -> RepoResult<EntityId>;
    /// Returns the id of `value`, inserting it when absent.
    fn find_or_create_type(&self, value: &str) -> RepoResult<EntityId>;
    /// Returns the id of the atom holding `data`, inserting it with `types`
    /// when absent. Types of an existing atom are left as they are.
    fn find_or_create_atom(&self, data: &str, types: &[String]) -> RepoResult<EntityId>;
    /// Persists an unpersisted molecule with all its links and returns the
    /// read-back snapshot.
    fn create_molecule(&self, molecule: &Molecule) -> RepoResult<Molecule>;
    fn find_atom(&self, id: EntityId) -> RepoResult<Option<Atom>>;
    fn find_atom_by_data(&self, data: &str) -> RepoResult<Option<Atom>>;
    fn find_molecule(&self, id: EntityId) -> RepoResult<Option<Molecule>>;
    /// Atoms filtered by type membership, ordered by id ascending.
    fn find_atoms_by_type(&self, types: &[String], filter: TypeFilter) -> RepoResult<Vec<Atom>>;
    /// Molecules carrying every given tag; all molecules for an empty list.
    fn find_molecules_by_tags(&self, tags: &[String]) -> RepoResult<Vec<Molecule>>;
    /// Molecules linking the atom that holds `data`.
    fn find_molecules_by_atom_data(&self, data: &str) -> RepoResult<Vec<Molecule>>;
    fn list_tags(&self) -> RepoResult<Vec<String>>;
    fn list_types(&self) -> RepoResult<Vec<String>>;
    fn tags_for_molecule(&self, id: EntityId) -> RepoResult<Vec<String>>;
    fn types_for_atom(&self, id: EntityId) -> RepoResult<Vec<String>>;
    fn count_molecules(&self) -> RepoResult<u64>;

    /// Atoms carrying no core type, i.e. user-entered vocabulary.
    fn find_user_atoms(&self) -> RepoResult<Vec<Atom>> {
        self.find_atoms_by_type(&core_types(), TypeFilter::Exclude)
    }

    /// Distinct data values of user atoms, sorted.
    fn user_domain(&self) -> RepoResult<Vec<String>> {
        let domain: BTreeSet<String> = self
            .find_user_atoms()?
            .into_iter()
            .map(|atom| atom.data().to_string())
            .collect();
        Ok(domain.into_iter().collect())
    }
}

/// SQLite-backed catalog.
pub struct SqliteCatalog<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalog<'conn> {
    /// Creates a catalog from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_catalog_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl Catalog for SqliteCatalog<'_> {
    fn find_or_create_tag(&self, tag: &str) -> RepoResult<EntityId> {
        tag_id_or_insert(self.conn, tag)
    }

    fn find_or_create_type(&self, value: &str) -> RepoResult<EntityId> {
        type_id_or_insert(self.conn, value)
    }

    fn find_or_create_atom(&self, data: &str, types: &[String]) -> RepoResult<EntityId> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let atom_id = atom_id_or_insert(&tx, data, types)?;
        tx.commit()?;
        Ok(atom_id)
    }

    fn create_molecule(&self, molecule: &Molecule) -> RepoResult<Molecule> {
        if molecule.is_persistent() {
            return Err(RepoError::InvalidArgument(format!(
                "molecule {} is already persistent; reconcile it instead",
                molecule.id()
            )));
        }

        let started_at = Instant::now();
        let molecule_id = match insert_molecule(self.conn, molecule) {
            Ok(id) => id,
            Err(err) => {
                error!(
                    "event=molecule_create module=catalog status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };
        info!(
            "event=molecule_create module=catalog status=ok molecule_id={} atoms={} tags={} duration_ms={}",
            molecule_id,
            molecule.atoms().len(),
            molecule.tags().len(),
            started_at.elapsed().as_millis()
        );

        load_molecule(self.conn, molecule_id)?.ok_or_else(|| {
            RepoError::Integrity(format!("created molecule {molecule_id} missing in read-back"))
        })
    }

    fn find_atom(&self, id: EntityId) -> RepoResult<Option<Atom>> {
        load_atom(self.conn, id)
    }

    fn find_atom_by_data(&self, data: &str) -> RepoResult<Option<Atom>> {
        match atom_id_by_data(self.conn, data)? {
            Some(id) => load_atom(self.conn, id),
            None => Ok(None),
        }
    }

    fn find_molecule(&self, id: EntityId) -> RepoResult<Option<Molecule>> {
        load_molecule(self.conn, id)
    }

    fn find_atoms_by_type(&self, types: &[String], filter: TypeFilter) -> RepoResult<Vec<Atom>> {
        let distinct: BTreeSet<&str> = types.iter().map(String::as_str).collect();
        if distinct.is_empty() {
            return match filter {
                TypeFilter::Include => Ok(Vec::new()),
                TypeFilter::Exclude => {
                    let ids = query_ids(self.conn, "SELECT id FROM atoms ORDER BY id ASC;", [])?;
                    load_atoms(self.conn, &ids)
                }
            };
        }

        let marks = placeholders(distinct.len());
        let sql = match filter {
            TypeFilter::Include => format!(
                "SELECT DISTINCT a.id
                 FROM atoms a
                 INNER JOIN atom_has_types at ON at.atom_id = a.id
                 INNER JOIN types t ON t.id = at.type_id
                 WHERE t.type IN ({marks})
                 ORDER BY a.id ASC;"
            ),
            TypeFilter::Exclude => format!(
                "SELECT a.id
                 FROM atoms a
                 WHERE NOT EXISTS (
                    SELECT 1
                    FROM atom_has_types at
                    INNER JOIN types t ON t.id = at.type_id
                    WHERE at.atom_id = a.id
                      AND t.type IN ({marks})
                 )
                 ORDER BY a.id ASC;"
            ),
        };
        let bind_values = distinct
            .iter()
            .map(|value| Value::Text((*value).to_string()));
        let ids = query_ids(self.conn, &sql, params_from_iter(bind_values))?;
        load_atoms(self.conn, &ids)
    }

    fn find_molecules_by_tags(&self, tags: &[String]) -> RepoResult<Vec<Molecule>> {
        let distinct: BTreeSet<&str> = tags.iter().map(String::as_str).collect();
        let ids = if distinct.is_empty() {
            query_ids(self.conn, "SELECT id FROM molecules ORDER BY id ASC;", [])?
        } else {
            let sql = format!(
                "SELECT mt.molecule_id
                 FROM molecule_has_tags mt
                 INNER JOIN tags t ON t.id = mt.tag_id
                 WHERE t.tag IN ({})
                 GROUP BY mt.molecule_id
                 HAVING COUNT(DISTINCT t.id) = ?
                 ORDER BY mt.molecule_id ASC;",
                placeholders(distinct.len())
            );
            let mut bind_values: Vec<Value> = distinct
                .iter()
                .map(|value| Value::Text((*value).to_string()))
                .collect();
            bind_values.push(Value::Integer(distinct.len() as i64));
            query_ids(self.conn, &sql, params_from_iter(bind_values))?
        };
        load_molecules(self.conn, &ids)
    }

    fn find_molecules_by_atom_data(&self, data: &str) -> RepoResult<Vec<Molecule>> {
        let ids = query_ids(
            self.conn,
            "SELECT DISTINCT ma.molecule_id
             FROM molecule_has_atoms ma
             INNER JOIN atoms a ON a.id = ma.atom_id
             WHERE a.data = ?1
             ORDER BY ma.molecule_id ASC;",
            [data],
        )?;
        load_molecules(self.conn, &ids)
    }

    fn list_tags(&self) -> RepoResult<Vec<String>> {
        query_strings(self.conn, "SELECT tag FROM tags ORDER BY tag ASC;", [])
    }

    fn list_types(&self) -> RepoResult<Vec<String>> {
        query_strings(self.conn, "SELECT type FROM types ORDER BY type ASC;", [])
    }

    fn tags_for_molecule(&self, id: EntityId) -> RepoResult<Vec<String>> {
        load_tags_for_molecule(self.conn, id)
    }

    fn types_for_atom(&self, id: EntityId) -> RepoResult<Vec<String>> {
        load_types_for_atom(self.conn, id)
    }

    fn count_molecules(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM molecules;", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

fn insert_molecule(conn: &Connection, molecule: &Molecule) -> RepoResult<EntityId> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let mut atom_ids = Vec::with_capacity(molecule.atoms().len());
    for atom in molecule.atoms() {
        atom_ids.push(resolve_atom_id(&tx, atom)?);
    }

    tx.execute("INSERT INTO molecules DEFAULT VALUES;", [])?;
    let molecule_id = tx.last_insert_rowid();

    for tag in molecule.tags() {
        link_tag(&tx, molecule_id, tag)?;
    }
    for atom_id in atom_ids {
        link_atom(&tx, molecule_id, atom_id)?;
    }

    tx.commit()?;
    Ok(molecule_id)
}

/// Maps an in-memory atom onto a catalog row id.
///
/// Persisted atoms must still exist; unpersisted atoms go through content
/// deduplication.
pub(crate) fn resolve_atom_id(conn: &Connection, atom: &Atom) -> RepoResult<EntityId> {
    if atom.is_persistent() {
        if !atom_exists(conn, atom.id())? {
            return Err(RepoError::AtomNotFound(atom.id()));
        }
        return Ok(atom.id());
    }
    atom_id_or_insert(conn, atom.data(), atom.types())
}

pub(crate) fn tag_id_or_insert(conn: &Connection, tag: &str) -> RepoResult<EntityId> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(ValidationError::EmptyTag.into());
    }

    conn.execute("INSERT OR IGNORE INTO tags (tag) VALUES (?1);", [tag])?;
    let id = conn.query_row("SELECT id FROM tags WHERE tag = ?1;", [tag], |row| row.get(0))?;
    Ok(id)
}

pub(crate) fn type_id_or_insert(conn: &Connection, value: &str) -> RepoResult<EntityId> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::EmptyType.into());
    }

    conn.execute("INSERT OR IGNORE INTO types (type) VALUES (?1);", [value])?;
    let id = conn.query_row("SELECT id FROM types WHERE type = ?1;", [value], |row| {
        row.get(0)
    })?;
    Ok(id)
}

/// Dedup insert for one atom. Callers own the surrounding transaction.
pub(crate) fn atom_id_or_insert(
    conn: &Connection,
    data: &str,
    types: &[String],
) -> RepoResult<EntityId> {
    if data.trim().is_empty() {
        return Err(ValidationError::EmptyData.into());
    }

    if let Some(existing) = atom_id_by_data(conn, data)? {
        return Ok(existing);
    }

    if types.iter().all(|value| value.trim().is_empty()) {
        return Err(ValidationError::MissingTypes.into());
    }

    conn.execute("INSERT INTO atoms (data) VALUES (?1);", [data])?;
    let atom_id = conn.last_insert_rowid();
    for value in types {
        link_type(conn, atom_id, value)?;
    }
    Ok(atom_id)
}

/// Links a type to an atom; returns whether a new link row was written.
pub(crate) fn link_type(conn: &Connection, atom_id: EntityId, value: &str) -> RepoResult<bool> {
    let type_id = type_id_or_insert(conn, value)?;
    let changed = conn.execute(
        "INSERT OR IGNORE INTO atom_has_types (atom_id, type_id) VALUES (?1, ?2);",
        params![atom_id, type_id],
    )?;
    Ok(changed > 0)
}

/// Links a tag to a molecule; returns whether a new link row was written.
pub(crate) fn link_tag(conn: &Connection, molecule_id: EntityId, tag: &str) -> RepoResult<bool> {
    let tag_id = tag_id_or_insert(conn, tag)?;
    let changed = conn.execute(
        "INSERT OR IGNORE INTO molecule_has_tags (molecule_id, tag_id) VALUES (?1, ?2);",
        params![molecule_id, tag_id],
    )?;
    Ok(changed > 0)
}

/// Appends an atom link at the end of the molecule's atom order.
pub(crate) fn link_atom(
    conn: &Connection,
    molecule_id: EntityId,
    atom_id: EntityId,
) -> RepoResult<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO molecule_has_atoms (molecule_id, atom_id, position)
         SELECT ?1, ?2, COALESCE(MAX(position) + 1, 0)
         FROM molecule_has_atoms
         WHERE molecule_id = ?1;",
        params![molecule_id, atom_id],
    )?;
    Ok(changed > 0)
}

pub(crate) fn atom_exists(conn: &Connection, atom_id: EntityId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM atoms WHERE id = ?1);",
        [atom_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn molecule_exists(conn: &Connection, molecule_id: EntityId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM molecules WHERE id = ?1);",
        [molecule_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn atom_id_by_data(conn: &Connection, data: &str) -> RepoResult<Option<EntityId>> {
    let id = conn
        .query_row("SELECT id FROM atoms WHERE data = ?1;", [data], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(id)
}

pub(crate) fn load_atom(conn: &Connection, atom_id: EntityId) -> RepoResult<Option<Atom>> {
    let data: Option<String> = conn
        .query_row("SELECT data FROM atoms WHERE id = ?1;", [atom_id], |row| {
            row.get(0)
        })
        .optional()?;
    let Some(data) = data else {
        return Ok(None);
    };

    let types = load_types_for_atom(conn, atom_id)?;
    let atom = Atom::builder()
        .with_id(atom_id)
        .and_then(|builder| builder.with_data(&data))
        .and_then(|builder| builder.with_types(&types))
        .and_then(|builder| builder.build())
        .map_err(|err| RepoError::InvalidData(format!("atom {atom_id}: {err}")))?;
    Ok(Some(atom))
}

pub(crate) fn load_molecule(
    conn: &Connection,
    molecule_id: EntityId,
) -> RepoResult<Option<Molecule>> {
    if !molecule_exists(conn, molecule_id)? {
        return Ok(None);
    }

    let atom_ids = load_atom_ids_for_molecule(conn, molecule_id)?;
    let mut atoms = Vec::with_capacity(atom_ids.len());
    for atom_id in atom_ids {
        let atom = load_atom(conn, atom_id)?.ok_or_else(|| {
            RepoError::Integrity(format!(
                "molecule {molecule_id} links missing atom {atom_id}"
            ))
        })?;
        atoms.push(atom);
    }
    let tags = load_tags_for_molecule(conn, molecule_id)?;

    let molecule = Molecule::builder()
        .with_id(molecule_id)
        .and_then(|builder| builder.with_atoms(atoms))
        .and_then(|builder| builder.with_tags(&tags))
        .and_then(|builder| builder.build())
        .map_err(|err| RepoError::InvalidData(format!("molecule {molecule_id}: {err}")))?;
    Ok(Some(molecule))
}

pub(crate) fn load_atom_ids_for_molecule(
    conn: &Connection,
    molecule_id: EntityId,
) -> RepoResult<Vec<EntityId>> {
    query_ids(
        conn,
        "SELECT atom_id
         FROM molecule_has_atoms
         WHERE molecule_id = ?1
         ORDER BY position ASC, atom_id ASC;",
        [molecule_id],
    )
}

pub(crate) fn load_tags_for_molecule(
    conn: &Connection,
    molecule_id: EntityId,
) -> RepoResult<Vec<String>> {
    query_strings(
        conn,
        "SELECT t.tag
         FROM molecule_has_tags mt
         INNER JOIN tags t ON t.id = mt.tag_id
         WHERE mt.molecule_id = ?1
         ORDER BY mt.rowid ASC;",
        [molecule_id],
    )
}

pub(crate) fn load_types_for_atom(conn: &Connection, atom_id: EntityId) -> RepoResult<Vec<String>> {
    query_strings(
        conn,
        "SELECT t.type
         FROM atom_has_types at
         INNER JOIN types t ON t.id = at.type_id
         WHERE at.atom_id = ?1
         ORDER BY at.rowid ASC;",
        [atom_id],
    )
}

fn load_atoms(conn: &Connection, ids: &[EntityId]) -> RepoResult<Vec<Atom>> {
    let mut atoms = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(atom) = load_atom(conn, *id)? {
            atoms.push(atom);
        }
    }
    Ok(atoms)
}

fn load_molecules(conn: &Connection, ids: &[EntityId]) -> RepoResult<Vec<Molecule>> {
    let mut molecules = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(molecule) = load_molecule(conn, *id)? {
            molecules.push(molecule);
        }
    }
    Ok(molecules)
}

pub(crate) fn query_ids<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> RepoResult<Vec<EntityId>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(row.get(0)?);
    }
    Ok(ids)
}

fn query_strings<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut values = Vec::new();
    while let Some(row) = rows.next()? {
        values.push(row.get(0)?);
    }
    Ok(values)
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn ensure_catalog_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
