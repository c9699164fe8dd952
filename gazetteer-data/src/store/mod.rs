//! The SQLite store every installer component writes through.
//!
//! Opening a store runs its setup steps in order: enable foreign keys, load
//! SpatiaLite when a library path is configured, initialise spatial metadata
//! and finally create or verify the catalog schema.

mod spatialite;

use camino::{Utf8Path, Utf8PathBuf};
use rusqlite::{Connection, Error as SqliteError};
use std::io;
use thiserror::Error;

use crate::catalog::{CatalogError, initialise_catalog};

pub use spatialite::{resolve_spatialite, spatialite_library};

/// Options applied when opening a [`Store`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Path of the SpatiaLite extension library. `None` opens plain SQLite.
    pub spatialite: Option<Utf8PathBuf>,
}

impl StoreOptions {
    /// Options that load SpatiaLite from `library`.
    #[must_use]
    pub fn with_spatialite(library: impl Into<Utf8PathBuf>) -> Self {
        Self {
            spatialite: Some(library.into()),
        }
    }
}

/// Errors raised while opening a store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The database directory could not be created.
    #[error("failed to create database directory for {path}")]
    Directory {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// SQLite could not open the database.
    #[error("failed to open database {path}")]
    Open {
        path: Utf8PathBuf,
        #[source]
        source: SqliteError,
    },
    /// Foreign key enforcement could not be enabled.
    #[error("failed to enable SQLite foreign keys")]
    ForeignKeys {
        #[source]
        source: SqliteError,
    },
    /// The SpatiaLite library could not be loaded.
    #[error("failed to load SpatiaLite from {path}")]
    LoadExtension {
        path: Utf8PathBuf,
        #[source]
        source: SqliteError,
    },
    /// SpatiaLite metadata tables could not be created.
    #[error("failed to initialise spatial metadata")]
    SpatialMetadata {
        #[source]
        source: SqliteError,
    },
    /// The catalog schema could not be created or is at the wrong version.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// An open gazetteer database.
#[derive(Debug)]
pub struct Store {
    connection: Connection,
    spatialite: bool,
}

impl Store {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns a [`StoreError`] naming the setup step that failed.
    pub fn open(path: &Utf8Path, options: &StoreOptions) -> Result<Self, StoreError> {
        gazetteer_fs::ensure_parent_dir(path).map_err(|source| StoreError::Directory {
            path: path.to_path_buf(),
            source,
        })?;
        let connection = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("opened gazetteer database {path}");
        Self::setup(connection, options)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns a [`StoreError`] naming the setup step that failed.
    ///
    /// # Examples
    /// ```
    /// use gazetteer_data::{Store, StoreOptions};
    ///
    /// let store = Store::open_in_memory(&StoreOptions::default()).expect("open store");
    /// assert!(!store.has_spatialite());
    /// ```
    pub fn open_in_memory(options: &StoreOptions) -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: Utf8PathBuf::from(":memory:"),
            source,
        })?;
        Self::setup(connection, options)
    }

    fn setup(mut connection: Connection, options: &StoreOptions) -> Result<Self, StoreError> {
        connection
            .pragma_update(None, "foreign_keys", true)
            .map_err(|source| StoreError::ForeignKeys { source })?;

        let spatialite = match &options.spatialite {
            Some(library) => {
                load_spatialite(&connection, library)?;
                init_spatial_metadata(&connection)?;
                log::info!("loaded SpatiaLite from {library}");
                true
            }
            None => false,
        };

        initialise_catalog(&mut connection)?;
        Ok(Self {
            connection,
            spatialite,
        })
    }

    /// Shared access to the underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Exclusive access to the underlying connection, for transactions.
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }

    /// Whether SpatiaLite was loaded into this connection.
    #[must_use]
    pub const fn has_spatialite(&self) -> bool {
        self.spatialite
    }
}

#[expect(
    unsafe_code,
    reason = "loading a SQLite extension runs native code from the configured library"
)]
fn load_spatialite(connection: &Connection, library: &Utf8Path) -> Result<(), StoreError> {
    let load_error = |source| StoreError::LoadExtension {
        path: library.to_path_buf(),
        source,
    };
    // SAFETY: extension loading is enabled only for the duration of this call
    // and the library path comes from trusted operator configuration.
    let loaded = unsafe {
        connection.load_extension_enable().map_err(load_error)?;
        let loaded = connection.load_extension(library, None);
        connection.load_extension_disable().map_err(load_error)?;
        loaded
    };
    loaded.map_err(load_error)
}

fn init_spatial_metadata(connection: &Connection) -> Result<(), StoreError> {
    let present: bool = connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'spatial_ref_sys')",
            [],
            |row| row.get(0),
        )
        .map_err(|source| StoreError::SpatialMetadata { source })?;
    if present {
        return Ok(());
    }
    connection
        .query_row("SELECT InitSpatialMetaData(1)", [], |_| Ok(()))
        .map_err(|source| StoreError::SpatialMetadata { source })
}

#[cfg(test)]
mod tests;
