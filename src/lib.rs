//! Facade crate for the gazetteer engine.
//!
//! Re-exports the configuration model, dependency resolver and SQL builders
//! from `gazetteer-core`. The `installer` feature (on by default) adds the
//! SQLite store, the installer pipeline and exact-name lookups from
//! `gazetteer-data`.

#![forbid(unsafe_code)]

pub use gazetteer_core::{
    ConfigError, DataType, DerivedAttribute, FeatureConfig, GazetteerConfig, GeometryColumn,
    JoinItem, JoinKind, NameColumn, OriginalAttribute, QueryError, ResolveError, SelectItem,
    SourceConfig, SourceFormat, SourceKind, SourceLocation, ViewConfig, resolve_order,
    validate_identifier,
};

#[cfg(feature = "installer")]
pub use gazetteer_data::{
    CatalogError, FeatureMatch, GazetteerId, InstallError, InstallReport, Installer,
    InstallerSettings, SourceReport, StageError, Store, StoreError, StoreOptions, find_feature,
    search_exact,
};
