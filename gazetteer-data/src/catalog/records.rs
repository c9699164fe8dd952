use gazetteer_core::validate_identifier;
use rusqlite::{Connection, OptionalExtension, params};

use super::CatalogError;

/// Row id of a `gazetteer` catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GazetteerId(pub i64);

/// Row id of a `source` catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub i64);

/// Delete any gazetteer called `name`, cascading to its sources, features
/// and names, and insert a fresh row.
pub fn replace_gazetteer(connection: &Connection, name: &str) -> Result<GazetteerId, CatalogError> {
    connection
        .execute("DELETE FROM gazetteer WHERE name = ?1", [name])
        .map_err(|source| CatalogError::Sqlite {
            operation: "delete gazetteer",
            source,
        })?;
    connection
        .execute("INSERT INTO gazetteer (name) VALUES (?1)", [name])
        .map_err(|source| CatalogError::Sqlite {
            operation: "insert gazetteer",
            source,
        })?;
    let id = GazetteerId(connection.last_insert_rowid());
    log::debug!("registered gazetteer {name} as {}", id.0);
    Ok(id)
}

/// Look up a gazetteer by name.
pub fn gazetteer_id(connection: &Connection, name: &str) -> Result<Option<GazetteerId>, CatalogError> {
    connection
        .query_row("SELECT id FROM gazetteer WHERE name = ?1", [name], |row| {
            row.get(0).map(GazetteerId)
        })
        .optional()
        .map_err(|source| CatalogError::Sqlite {
            operation: "select gazetteer",
            source,
        })
}

/// Return the source row for (`gazetteer`, `name`), creating it on first use.
///
/// An existing row keeps its id, so features registered under it survive a
/// re-run of registration.
pub fn ensure_source(
    connection: &Connection,
    gazetteer: GazetteerId,
    name: &str,
    location_id_name: &str,
) -> Result<SourceId, CatalogError> {
    connection
        .execute(
            "INSERT OR IGNORE INTO source (gazetteer_id, name, location_id_name) VALUES (?1, ?2, ?3)",
            params![gazetteer.0, name, location_id_name],
        )
        .map_err(|source| CatalogError::Sqlite {
            operation: "insert source",
            source,
        })?;
    connection
        .query_row(
            "SELECT id FROM source WHERE gazetteer_id = ?1 AND name = ?2",
            params![gazetteer.0, name],
            |row| row.get(0).map(SourceId),
        )
        .map_err(|source| CatalogError::Sqlite {
            operation: "select source",
            source,
        })
}

/// Number of rows in `table`.
pub fn count_rows(connection: &Connection, table: &str) -> Result<i64, CatalogError> {
    let table = validate_identifier(table)?;
    connection
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .map_err(|source| CatalogError::Sqlite {
            operation: "count rows",
            source,
        })
}

/// Number of features registered under a gazetteer.
pub fn feature_count(connection: &Connection, gazetteer: GazetteerId) -> Result<i64, CatalogError> {
    connection
        .query_row(
            "SELECT COUNT(*) FROM feature f JOIN source s ON s.id = f.source_id \
             WHERE s.gazetteer_id = ?1",
            [gazetteer.0],
            |row| row.get(0),
        )
        .map_err(|source| CatalogError::Sqlite {
            operation: "count features",
            source,
        })
}

/// Number of names registered under a gazetteer.
pub fn name_count(connection: &Connection, gazetteer: GazetteerId) -> Result<i64, CatalogError> {
    connection
        .query_row(
            "SELECT COUNT(*) FROM name n \
             JOIN feature f ON f.id = n.feature_id \
             JOIN source s ON s.id = f.source_id \
             WHERE s.gazetteer_id = ?1",
            [gazetteer.0],
            |row| row.get(0),
        )
        .map_err(|source| CatalogError::Sqlite {
            operation: "count names",
            source,
        })
}
