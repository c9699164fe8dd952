use rusqlite::{Connection, OptionalExtension, Transaction};

use super::CatalogError;

/// Catalog schema version written by this build.
pub const SCHEMA_VERSION: i64 = 1;

/// Create the gazetteer catalog tables or verify an existing installation.
///
/// The catalog holds one row per gazetteer, the sources registered under
/// it, their features and the names pointing at each feature. Deleting a
/// gazetteer cascades through the rest. Databases written by another schema
/// version are rejected.
///
/// # Examples
/// ```
/// use rusqlite::Connection;
/// use gazetteer_data::catalog::{SCHEMA_VERSION, initialise_catalog};
///
/// let mut conn = Connection::open_in_memory().expect("create in-memory database");
/// initialise_catalog(&mut conn).expect("create catalog");
/// initialise_catalog(&mut conn).expect("catalog creation is idempotent");
///
/// let version: i64 = conn
///     .query_row("SELECT version FROM gazetteer_schema_version", [], |row| row.get(0))
///     .expect("read schema version");
/// assert_eq!(version, SCHEMA_VERSION);
/// ```
pub fn initialise_catalog(connection: &mut Connection) -> Result<(), CatalogError> {
    let transaction = connection
        .transaction()
        .map_err(|source| CatalogError::Migration {
            step: "begin catalog transaction",
            source,
        })?;

    create_tables(&transaction)?;
    run_migration_step(
        &transaction,
        "index name text",
        "CREATE INDEX IF NOT EXISTS idx_name_text ON name(text)",
    )?;
    ensure_schema_version(&transaction)?;

    transaction
        .commit()
        .map_err(|source| CatalogError::Migration {
            step: "commit catalog transaction",
            source,
        })
}

fn create_tables(transaction: &Transaction<'_>) -> Result<(), CatalogError> {
    run_migration_step(
        transaction,
        "create gazetteer",
        "CREATE TABLE IF NOT EXISTS gazetteer (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )",
    )?;
    run_migration_step(
        transaction,
        "create source",
        "CREATE TABLE IF NOT EXISTS source (
            id INTEGER PRIMARY KEY,
            gazetteer_id INTEGER NOT NULL REFERENCES gazetteer(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            location_id_name TEXT NOT NULL,
            UNIQUE (gazetteer_id, name)
        )",
    )?;
    run_migration_step(
        transaction,
        "create feature",
        "CREATE TABLE IF NOT EXISTS feature (
            id INTEGER PRIMARY KEY,
            source_id INTEGER NOT NULL REFERENCES source(id) ON DELETE CASCADE,
            location_id_value TEXT NOT NULL,
            UNIQUE (source_id, location_id_value)
        )",
    )?;
    run_migration_step(
        transaction,
        "create name",
        "CREATE TABLE IF NOT EXISTS name (
            id INTEGER PRIMARY KEY,
            text TEXT NOT NULL,
            feature_id INTEGER NOT NULL REFERENCES feature(id) ON DELETE CASCADE,
            UNIQUE (feature_id, text)
        )",
    )
}

fn ensure_schema_version(transaction: &Transaction<'_>) -> Result<(), CatalogError> {
    run_migration_step(
        transaction,
        "create schema version table",
        "CREATE TABLE IF NOT EXISTS gazetteer_schema_version (
            version INTEGER PRIMARY KEY CHECK (version > 0),
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        )",
    )?;

    let existing: Option<i64> = transaction
        .query_row(
            "SELECT version FROM gazetteer_schema_version LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|source| CatalogError::Migration {
            step: "read schema version",
            source,
        })?;

    match existing {
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(found) => Err(CatalogError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found,
        }),
        None => transaction
            .execute(
                "INSERT INTO gazetteer_schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )
            .map(|_| ())
            .map_err(|source| CatalogError::Migration {
                step: "record schema version",
                source,
            }),
    }
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), CatalogError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| CatalogError::Migration { step, source })
}
