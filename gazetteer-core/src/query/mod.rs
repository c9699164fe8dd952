//! SQL generation for installing gazetteer sources.
//!
//! The builders are plain functions returning statement strings. Identifiers
//! are checked with [`validate_identifier`] before they are interpolated;
//! SQL expressions and join conditions from the configuration are trusted
//! and passed through verbatim.

pub mod ddl;
pub mod dml;
pub mod spatial;

use thiserror::Error;

/// Errors raised while generating SQL.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum QueryError {
    /// An identifier contains characters other than alphanumerics and `_`.
    #[error(
        "invalid identifier {identifier:?}: must be non-empty and contain only alphanumeric characters and underscores"
    )]
    InvalidIdentifier { identifier: String },
    /// A view statement was requested for a source without a view.
    #[error("source {source_name:?} has no view configuration")]
    MissingView { source_name: String },
}

pub(crate) fn is_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier
            .chars()
            .all(|character| character.is_alphanumeric() || character == '_')
}

/// Check that `identifier` is safe to interpolate into SQL.
///
/// # Errors
/// Returns [`QueryError::InvalidIdentifier`] when the identifier is empty or
/// contains anything other than alphanumerics and underscores.
///
/// # Examples
/// ```
/// use gazetteer_core::validate_identifier;
///
/// assert!(validate_identifier("geonames_2024").is_ok());
/// assert!(validate_identifier("places; DROP TABLE name").is_err());
/// ```
pub fn validate_identifier(identifier: &str) -> Result<&str, QueryError> {
    if is_identifier(identifier) {
        Ok(identifier)
    } else {
        Err(QueryError::InvalidIdentifier {
            identifier: identifier.to_owned(),
        })
    }
}

/// Quote `text` as a SQL string literal.
pub(crate) fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}
