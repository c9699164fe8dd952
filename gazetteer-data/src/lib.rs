//! Storage, acquisition and installation for gazetteers.
//!
//! Responsibilities:
//! - Open the SQLite store, load SpatiaLite and maintain the catalog schema.
//! - Fetch source files over HTTP or from disk, extracting zip archives.
//! - Stream tabular, GeoJSON and shapefile sources into staging tables.
//! - Run the per-source stage pipeline and the whole-gazetteer installer.
//! - Answer exact name lookups against installed gazetteers.
//!
//! Boundaries:
//! - Configuration parsing and SQL generation live in `gazetteer-core`.
//! - Network I/O is driven synchronously, on the caller's multi-thread
//!   runtime when there is one and on a private runtime otherwise.
//!
//! Invariants:
//! - One [`Store`] is borrowed mutably by one stage at a time.
//! - No global mutable state.
#![deny(unsafe_code)]

pub mod acquisition;
pub mod catalog;
pub mod ingest;
pub mod installer;
pub mod lookup;
pub mod pipeline;
pub mod store;

pub use acquisition::{
    Acquirer, AcquisitionError, HttpRemoteSource, HttpRemoteSourceConfig, RemoteSource,
    TransportError,
};
pub use catalog::{CatalogError, GazetteerId, SourceId};
pub use ingest::{IngestError, LoadReport, LoadStrategies, LoadStrategy, VectorFormat};
pub use installer::{
    DEFAULT_CHUNK_SIZE, InstallError, InstallReport, Installer, InstallerSettings, SourceReport,
};
pub use lookup::{FeatureMatch, feature_names, find_feature, search_exact};
pub use pipeline::{Pipeline, PipelineSettings, SourceContext, Stage, StageError};
pub use store::{Store, StoreError, StoreOptions, resolve_spatialite, spatialite_library};
