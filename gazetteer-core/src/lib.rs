//! Core domain logic for gazetteer installation.
//!
//! Responsibilities:
//! - Parse and validate declarative gazetteer descriptions.
//! - Order sources so that view dependencies are installed first.
//! - Generate the SQL that builds, transforms, indexes and registers each
//!   source table.
//!
//! Boundaries:
//! - No I/O beyond reading a configuration file; executing SQL and fetching
//!   data lives in `gazetteer-data`.
//!
//! Invariants:
//! - Every identifier interpolated into SQL is validated first.
//! - A [`GazetteerConfig`] is only ever constructed fully valid.
#![forbid(unsafe_code)]

pub mod model;
pub mod query;
pub mod resolver;

pub use model::{
    ConfigError, DataType, DerivedAttribute, FeatureConfig, GazetteerConfig, GeometryColumn,
    JoinItem, JoinKind, NameColumn, OriginalAttribute, SelectItem, SourceConfig, SourceFormat,
    SourceKind, SourceLocation, ViewConfig,
};
pub use query::{QueryError, validate_identifier};
pub use resolver::{ResolveError, resolve_order};
