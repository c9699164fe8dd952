//! Error types emitted by the gazetteer CLI.

use std::sync::Arc;

use camino::Utf8PathBuf;
use gazetteer_data::{CatalogError, InstallError, StoreError};
use thiserror::Error;

/// Errors emitted by the gazetteer CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A referenced input path does not exist or is not a file.
    #[error("{field} path {path:?} does not exist or is not a file")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected.
    #[error("failed to inspect {field} path {path:?}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// No SpatiaLite build for this platform exists in the library directory.
    #[error("no SpatiaLite library for this platform under {dir:?}")]
    SpatialiteNotFound { dir: Utf8PathBuf },
    /// The store could not be opened.
    #[error("failed to open gazetteer database {path:?}")]
    OpenStore {
        path: Utf8PathBuf,
        #[source]
        source: StoreError,
    },
    /// Installing the gazetteer failed.
    #[error("installation failed")]
    Install(#[from] InstallError),
    /// Reading the catalog failed.
    #[error("catalog query failed")]
    Catalog(#[from] CatalogError),
    /// The named gazetteer is not installed.
    #[error("gazetteer {name:?} is not installed")]
    UnknownGazetteer { name: String },
    /// No feature carries the requested identifier.
    #[error("gazetteer {gazetteer:?} has no feature {identifier:?}")]
    UnknownFeature {
        gazetteer: String,
        identifier: String,
    },
    /// Serializing a result line failed.
    #[error("failed to serialize output")]
    SerializeOutput(#[source] serde_json::Error),
    /// Writing to stdout failed.
    #[error("failed to write output")]
    WriteOutput(#[source] std::io::Error),
    /// The `log` bridge could not be installed.
    #[error("failed to bridge log records into tracing")]
    LogBridge(#[from] log::SetLoggerError),
    /// The tracing subscriber could not be installed.
    #[error("failed to install the tracing subscriber")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}
