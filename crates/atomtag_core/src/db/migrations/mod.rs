//! Catalog schema migrations.
//!
//! # Invariants
//! - `version` values are strictly increasing; the applied version is
//!   mirrored to `PRAGMA user_version`.
//! - All pending scripts run in one transaction.
//! - A database reporting the latest version must contain every table in
//!   [`CATALOG_TABLES`].

use crate::db::{DbError, DbResult, CATALOG_TABLES};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "catalog",
    sql: include_str!("0001_catalog.sql"),
}];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings the catalog schema to [`latest_version`] and verifies it.
///
/// Returns how many migrations were applied.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<usize> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();
    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > current_version)
        .collect();
    if !pending.is_empty() {
        let tx = conn.transaction()?;
        for migration in &pending {
            tx.execute_batch(migration.sql)
                .and_then(|()| {
                    tx.pragma_update(None, "user_version", migration.version)
                })
                .map_err(|source| DbError::Migration {
                    version: migration.version,
                    name: migration.name,
                    source,
                })?;
            info!(
                "event=db_migrate module=db status=ok version={} name={}",
                migration.version, migration.name
            );
        }
        tx.commit()?;
    }

    verify_catalog_tables(conn)?;
    Ok(pending.len())
}

/// Reads the schema version currently recorded in the database header.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

fn verify_catalog_tables(conn: &Connection) -> DbResult<()> {
    let mut stmt = conn.prepare(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
    )?;
    for &table in CATALOG_TABLES {
        let exists: i64 = stmt.query_row([table], |row| row.get(0))?;
        if exists != 1 {
            return Err(DbError::MissingCatalogTable(table));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{latest_version, MIGRATIONS};

    #[test]
    fn versions_are_strictly_increasing() {
        assert!(MIGRATIONS
            .windows(2)
            .all(|pair| pair[0].version < pair[1].version));
        assert_eq!(latest_version(), MIGRATIONS.len() as u32);
    }
}
