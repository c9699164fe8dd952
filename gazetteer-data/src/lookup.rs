//! Read-side queries over the installed catalog.
//!
//! Lookups are scoped to one gazetteer and return features together with the
//! source they came from, so callers can join back to the source table.

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;

use crate::catalog::{CatalogError, GazetteerId};

/// A registered feature and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureMatch {
    pub feature_id: i64,
    pub source_name: String,
    /// Identifier column in the source relation.
    pub location_id_name: String,
    /// Identifier value, stored as text.
    pub location_id_value: String,
}

const FEATURE_COLUMNS: &str =
    "f.id, s.name, s.location_id_name, f.location_id_value";

fn feature_match(row: &Row<'_>) -> rusqlite::Result<FeatureMatch> {
    Ok(FeatureMatch {
        feature_id: row.get(0)?,
        source_name: row.get(1)?,
        location_id_name: row.get(2)?,
        location_id_value: row.get(3)?,
    })
}

fn sqlite_error(operation: &'static str) -> impl Fn(rusqlite::Error) -> CatalogError {
    move |source| CatalogError::Sqlite { operation, source }
}

/// Normalise user input before an exact name match.
fn normalise_query(text: &str) -> String {
    text.replace('"', "").trim().to_owned()
}

/// Features of `gazetteer` carrying a name exactly equal to `name`.
///
/// Double quotes are stripped from the query and surrounding whitespace is
/// trimmed. Each feature appears once, ordered by feature id.
///
/// # Errors
/// Returns [`CatalogError::Sqlite`] when the query fails.
pub fn search_exact(
    connection: &Connection,
    gazetteer: GazetteerId,
    name: &str,
    limit: usize,
) -> Result<Vec<FeatureMatch>, CatalogError> {
    let query = normalise_query(name);
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut statement = connection
        .prepare_cached(&format!(
            "SELECT DISTINCT {FEATURE_COLUMNS} \
             FROM name n \
             JOIN feature f ON f.id = n.feature_id \
             JOIN source s ON s.id = f.source_id \
             WHERE s.gazetteer_id = ?1 AND n.text = ?2 \
             ORDER BY f.id \
             LIMIT ?3"
        ))
        .map_err(sqlite_error("prepare name search"))?;
    let matches = statement
        .query_map(params![gazetteer.0, query, limit], feature_match)
        .map_err(sqlite_error("search names"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sqlite_error("read name matches"))?;
    log::debug!("search {query:?}: {} matches", matches.len());
    Ok(matches)
}

/// The feature of `gazetteer` registered under `identifier`.
///
/// When several sources share an identifier value the lowest feature id
/// wins.
///
/// # Errors
/// Returns [`CatalogError::Sqlite`] when the query fails.
pub fn find_feature(
    connection: &Connection,
    gazetteer: GazetteerId,
    identifier: &str,
) -> Result<Option<FeatureMatch>, CatalogError> {
    connection
        .query_row(
            &format!(
                "SELECT {FEATURE_COLUMNS} \
                 FROM feature f JOIN source s ON s.id = f.source_id \
                 WHERE s.gazetteer_id = ?1 AND f.location_id_value = ?2 \
                 ORDER BY f.id LIMIT 1"
            ),
            params![gazetteer.0, identifier],
            feature_match,
        )
        .optional()
        .map_err(sqlite_error("find feature"))
}

/// Every name registered for `feature_id`, alphabetically.
///
/// # Errors
/// Returns [`CatalogError::Sqlite`] when the query fails.
pub fn feature_names(connection: &Connection, feature_id: i64) -> Result<Vec<String>, CatalogError> {
    let mut statement = connection
        .prepare_cached("SELECT text FROM name WHERE feature_id = ?1 ORDER BY text")
        .map_err(sqlite_error("prepare feature names"))?;
    statement
        .query_map([feature_id], |row| row.get(0))
        .map_err(sqlite_error("list feature names"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sqlite_error("read feature names"))
}
