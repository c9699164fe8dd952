//! Catalog of installed gazetteers, their sources, features and names.

mod records;
mod schema;

use gazetteer_core::QueryError;
use rusqlite::Error as SqliteError;
use thiserror::Error;

pub use records::{
    GazetteerId, SourceId, count_rows, ensure_source, feature_count, gazetteer_id, name_count,
    replace_gazetteer,
};
pub use schema::{SCHEMA_VERSION, initialise_catalog};

/// Errors raised while maintaining or reading the catalog.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("failed to execute catalog migration step '{step}'")]
    Migration {
        step: &'static str,
        #[source]
        source: SqliteError,
    },
    #[error(
        "expected gazetteer catalog version {expected} but found {found}; apply migrations before retrying"
    )]
    VersionMismatch { expected: i64, found: i64 },
    #[error("catalog operation '{operation}' failed")]
    Sqlite {
        operation: &'static str,
        #[source]
        source: SqliteError,
    },
    #[error(transparent)]
    Query(#[from] QueryError),
}
