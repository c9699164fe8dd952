//! Installing a whole gazetteer from its configuration.
//!
//! The installer replaces the gazetteer's catalog row, orders the sources so
//! that every view's dependencies exist first, and runs the standard
//! [`Pipeline`] for each source in turn. The first failing source aborts the
//! install; sources committed before it stay installed.

use camino::{Utf8Path, Utf8PathBuf};
use gazetteer_core::{ConfigError, GazetteerConfig, ResolveError, resolve_order};
use serde::Serialize;
use std::io;
use std::num::NonZeroUsize;
use thiserror::Error;

use crate::acquisition::{HttpRemoteSource, RemoteSource, TransportError};
use crate::catalog::{self, CatalogError, GazetteerId};
use crate::pipeline::{Pipeline, PipelineSettings, SourceContext, StageError};
use crate::store::Store;

/// Rows per ingestion batch unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = NonZeroUsize::MIN.saturating_add(19_999);

/// Errors raised while installing a gazetteer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InstallError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("failed to record the gazetteer in the catalog")]
    Catalog(#[from] CatalogError),
    #[error("failed to create the HTTP client")]
    Transport(#[from] TransportError),
    /// The downloads directory could not be created or removed.
    #[error("failed to manage downloads directory {path}")]
    Downloads {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// A source failed part way through its pipeline.
    #[error("failed to install source {source_name:?}")]
    Source {
        source_name: String,
        #[source]
        source: StageError,
    },
}

/// Tunables for [`Installer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerSettings {
    /// Parent of the per-gazetteer downloads directory.
    pub downloads_root: Utf8PathBuf,
    /// Rows per ingestion batch.
    pub chunk_size: NonZeroUsize,
    /// Keep downloaded files after a successful install.
    pub keep_downloads: bool,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            downloads_root: Utf8PathBuf::from("downloads"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            keep_downloads: false,
        }
    }
}

impl InstallerSettings {
    /// Downloads directory used for `gazetteer`.
    #[must_use]
    pub fn downloads_dir(&self, gazetteer: &str) -> Utf8PathBuf {
        self.downloads_root.join(gazetteer)
    }
}

/// Outcome of installing one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source_name: String,
    pub table_name: Option<String>,
    pub view_name: Option<String>,
    pub rows_loaded: usize,
    pub features_registered: usize,
    pub names_registered: usize,
    pub failed_indexes: Vec<String>,
}

impl SourceReport {
    fn new(source_name: &str, context: SourceContext) -> Self {
        Self {
            source_name: source_name.to_owned(),
            table_name: context.table_name,
            view_name: context.view_name,
            rows_loaded: context.rows_loaded,
            features_registered: context.features_registered,
            names_registered: context.names_registered,
            failed_indexes: context.failed_indexes,
        }
    }
}

/// Outcome of a completed install, with sources in install order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub gazetteer: String,
    #[serde(skip)]
    pub gazetteer_id: GazetteerId,
    pub sources: Vec<SourceReport>,
}

/// Installs gazetteers into a [`Store`].
///
/// # Examples
/// ```no_run
/// use camino::Utf8Path;
/// use gazetteer_data::{Installer, InstallerSettings, Store, StoreOptions};
///
/// let store = Store::open(Utf8Path::new("gazetteer.db"), &StoreOptions::default())?;
/// let mut installer = Installer::new(store, InstallerSettings::default());
/// let report = installer.install(Utf8Path::new("geonames.yaml"))?;
/// println!("installed {} sources", report.sources.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Installer {
    store: Store,
    settings: InstallerSettings,
    remote: Option<Box<dyn RemoteSource>>,
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("store", &self.store)
            .field("settings", &self.settings)
            .field("remote", &self.remote.as_ref().map(|_| "<dyn RemoteSource>"))
            .finish()
    }
}

impl Installer {
    /// Create an installer that downloads over HTTP when a source needs it.
    #[must_use]
    pub fn new(store: Store, settings: InstallerSettings) -> Self {
        Self {
            store,
            settings,
            remote: None,
        }
    }

    /// Replace the transport used for remote sources.
    #[must_use]
    pub fn with_remote(mut self, remote: Box<dyn RemoteSource>) -> Self {
        self.remote = Some(remote);
        self
    }

    #[must_use]
    pub fn settings(&self) -> &InstallerSettings {
        &self.settings
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Give back the store, for example to query it after installing.
    #[must_use]
    pub fn into_store(self) -> Store {
        self.store
    }

    /// Parse the configuration at `path` and install it.
    ///
    /// # Errors
    /// As for [`Installer::install_config`], plus [`InstallError::Config`]
    /// when the file cannot be read or is invalid.
    pub fn install(&mut self, path: &Utf8Path) -> Result<InstallReport, InstallError> {
        let config = GazetteerConfig::from_yaml_path(path)?;
        self.install_config(config)
    }

    /// Install an already parsed configuration.
    ///
    /// Any existing gazetteer of the same name is removed from the catalog
    /// first. Downloads are deleted after a successful install unless
    /// [`InstallerSettings::keep_downloads`] is set.
    ///
    /// # Errors
    /// Returns [`InstallError::Resolve`] when the sources form a cycle,
    /// [`InstallError::Source`] for the first source that fails, and
    /// catalog, transport or filesystem errors otherwise.
    pub fn install_config(&mut self, config: GazetteerConfig) -> Result<InstallReport, InstallError> {
        let downloads_dir = self.settings.downloads_dir(config.name());
        gazetteer_fs::ensure_dir_all(&downloads_dir).map_err(|source| {
            InstallError::Downloads {
                path: downloads_dir.clone(),
                source,
            }
        })?;

        let gazetteer_id = catalog::replace_gazetteer(self.store.connection(), config.name())?;
        let order = resolve_order(config.sources())?;
        log::info!(
            "{}: installing {} sources in order [{}]",
            config.name(),
            order.len(),
            order
                .iter()
                .map(|source| source.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let remote = match self.remote.take() {
            Some(remote) => remote,
            None => Box::new(HttpRemoteSource::new()?),
        };
        let settings = PipelineSettings {
            downloads_dir: downloads_dir.clone(),
            chunk_size: self.settings.chunk_size,
            gazetteer: gazetteer_id,
        };
        let outcome = {
            let pipeline = Pipeline::standard(&*remote, settings);
            order
                .into_iter()
                .map(|source| {
                    pipeline
                        .run(&mut self.store, source)
                        .map(|context| SourceReport::new(source.name(), context))
                        .map_err(|error| InstallError::Source {
                            source_name: source.name().to_owned(),
                            source: error,
                        })
                })
                .collect::<Result<Vec<_>, _>>()
        };
        self.remote = Some(remote);
        let sources = outcome?;

        if self.settings.keep_downloads {
            log::debug!("{}: keeping downloads in {downloads_dir}", config.name());
        } else {
            gazetteer_fs::remove_dir_all(&downloads_dir).map_err(|source| {
                InstallError::Downloads {
                    path: downloads_dir.clone(),
                    source,
                }
            })?;
            log::debug!("{}: removed downloads in {downloads_dir}", config.name());
        }

        log::info!("{}: installed {} sources", config.name(), sources.len());
        Ok(InstallReport {
            gazetteer: config.name().to_owned(),
            gazetteer_id,
            sources,
        })
    }
}

#[cfg(test)]
mod tests;
