//! Errors raised while loading a gazetteer description.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Reasons a gazetteer description is rejected.
///
/// Every variant names the offending source or attribute so the author can
/// fix the document without re-running the installer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read gazetteer configuration {path:?}: {source}")]
    Read {
        /// Path that was opened.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The document is not valid YAML or does not match the expected shape.
    #[error("failed to parse gazetteer configuration: {source}")]
    Parse {
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },
    /// The gazetteer name is not a plain identifier.
    #[error("gazetteer name {name:?} must contain only alphanumeric characters and underscores")]
    InvalidGazetteerName { name: String },
    /// A source name is not a plain identifier.
    #[error("source name {name:?} must contain only alphanumeric characters and underscores")]
    InvalidSourceName { name: String },
    /// Two sources share a name.
    #[error("source name {name:?} is declared more than once")]
    DuplicateSource { name: String },
    /// A source declares both `url` and `path`.
    #[error("source {source_name:?} must declare either url or path, not both")]
    AmbiguousLocation { source_name: String },
    /// A source declares neither `url` nor `path`.
    #[error("source {source_name:?} must declare a url or a path")]
    MissingLocation { source_name: String },
    /// A tabular source has no separator.
    #[error("tabular source {source_name:?} must specify a separator")]
    MissingSeparator { source_name: String },
    /// A tabular separator is longer than one byte.
    #[error(
        "separator {separator:?} of source {source_name:?} is not supported: only single-byte \
         separators are supported"
    )]
    InvalidSeparator {
        source_name: String,
        separator: String,
    },
    /// A tabular source declares a layer.
    #[error("layer can not be specified for tabular source {source_name:?}")]
    LayerOnTabular { source_name: String },
    /// A spatial source declares a separator.
    #[error("separator can not be specified for spatial source {source_name:?}")]
    SeparatorOnSpatial { source_name: String },
    /// A spatial source declares `skiprows`.
    #[error("skiprows can not be specified for spatial source {source_name:?}")]
    SkipRowsOnSpatial { source_name: String },
    /// A spatial source does not carry exactly one geometry column.
    #[error("spatial source {source_name:?} must have exactly one geometry column, found {found}")]
    SpatialGeometryCount { source_name: String, found: usize },
    /// More than one geometry column was declared.
    #[error("source {source_name:?} can have at most one geometry column")]
    MultipleGeometries { source_name: String },
    /// The geometry column is not called `geometry`.
    #[error("geometry column {attribute:?} of source {source_name:?} must be named 'geometry'")]
    GeometryName {
        source_name: String,
        attribute: String,
    },
    /// A geometry attribute lacks an SRID.
    #[error("geometry attribute {attribute:?} of source {source_name:?} must specify an SRID")]
    MissingSrid {
        source_name: String,
        attribute: String,
    },
    /// A non-geometry attribute carries an SRID.
    #[error("attribute {attribute:?} of source {source_name:?} is not a geometry and can not carry an SRID")]
    UnexpectedSrid {
        source_name: String,
        attribute: String,
    },
    /// An attribute name is reused within a source.
    #[error("attribute {attribute:?} is declared more than once in source {source_name:?}")]
    DuplicateAttribute {
        source_name: String,
        attribute: String,
    },
    /// A view declares no columns.
    #[error("view for source {source_name:?} must select at least one column")]
    EmptyViewSelect { source_name: String },
    /// A view refers to a source that does not exist.
    #[error("view for source {source_name:?} references non-existent source {reference:?}")]
    UnknownViewSource {
        source_name: String,
        reference: String,
    },
    /// A join type is not one SQLite understands.
    #[error("view for source {source_name:?} uses unsupported join type {kind:?}")]
    UnknownJoinKind { source_name: String, kind: String },
    /// The feature definition does not have exactly one identifier column.
    #[error("features of source {source_name:?} must declare exactly one identifier column, found {found}")]
    IdentifierCount { source_name: String, found: usize },
    /// The feature definition has no name columns.
    #[error("features of source {source_name:?} must declare at least one name column")]
    MissingNames { source_name: String },
    /// A name separator is empty.
    #[error("name column {column:?} of source {source_name:?} declares an empty separator")]
    EmptyNameSeparator { source_name: String, column: String },
}
