//! Streaming source files into their staging tables.
//!
//! Each [`LoadStrategy`] reads one file format and hands rows to a shared
//! batch writer, which commits every `chunk_size` rows in its own
//! transaction. Only original attributes that are not dropped are written;
//! geometry values land in the `<name>_wkt` text column.

mod spatial;
mod tabular;

use camino::{Utf8Path, Utf8PathBuf};
use gazetteer_core::{QueryError, SourceConfig, SourceKind, validate_identifier};
use rusqlite::types::Value;
use rusqlite::{Connection, Error as SqliteError, params_from_iter};
use std::error::Error as StdError;
use std::io;
use std::num::NonZeroUsize;
use thiserror::Error;

use crate::store::Store;

pub use spatial::{SpatialLoader, VectorFormat};
pub use tabular::TabularLoader;

/// Outcome of loading one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Rows inserted.
    pub rows: usize,
    /// Transactions committed.
    pub batches: usize,
}

/// Errors raised while loading a file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IngestError {
    #[error("failed to open {path}")]
    Open {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("row {row}, column {column:?}: {value:?} is not a valid {expected}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
        expected: &'static str,
    },
    #[error("row {row}: geometry could not be converted to WKT: {source}")]
    Geometry {
        row: usize,
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("failed to {operation}")]
    Sqlite {
        operation: &'static str,
        #[source]
        source: SqliteError,
    },
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("source {source_name:?} is not in the format this loader reads")]
    WrongFormat { source_name: String },
    #[error("{path} is not a supported vector format (expected .geojson, .json or .shp)")]
    UnsupportedFormat { path: Utf8PathBuf },
    #[error("{path} has no layer {layer:?}; its only layer is {available:?}")]
    UnknownLayer {
        path: Utf8PathBuf,
        layer: String,
        available: String,
    },
}

/// Loads one file format into a staging table.
pub trait LoadStrategy {
    /// Stream `path` into `table`, committing every `chunk_size` rows.
    ///
    /// # Errors
    /// Returns an [`IngestError`] when the file cannot be read, a value does
    /// not match its declared type or an insert fails. Batches committed
    /// before the failure stay in the table.
    fn load(
        &self,
        store: &mut Store,
        source: &SourceConfig,
        path: &Utf8Path,
        table: &str,
        chunk_size: NonZeroUsize,
    ) -> Result<LoadReport, IngestError>;
}

/// Lookup of the strategy for each source kind.
#[derive(Debug, Clone, Copy)]
pub struct LoadStrategies;

impl LoadStrategies {
    /// Strategy for sources declared as `kind`.
    #[must_use]
    pub fn for_kind(kind: SourceKind) -> &'static dyn LoadStrategy {
        match kind {
            SourceKind::Tabular => &TabularLoader,
            SourceKind::Spatial => &SpatialLoader,
        }
    }
}

/// Physical columns written by loaders, in input order.
fn storage_columns(source: &SourceConfig) -> Vec<String> {
    source
        .original_attributes()
        .iter()
        .filter(|attribute| !attribute.drop)
        .map(|attribute| attribute.storage_column())
        .collect()
}

/// Buffers rows and inserts them in fixed-size transactions.
struct BatchWriter<'a> {
    connection: &'a mut Connection,
    table: &'a str,
    sql: String,
    chunk_size: usize,
    pending: Vec<Vec<Value>>,
    report: LoadReport,
}

impl<'a> BatchWriter<'a> {
    fn new(
        connection: &'a mut Connection,
        table: &'a str,
        columns: &[String],
        chunk_size: NonZeroUsize,
    ) -> Result<Self, IngestError> {
        validate_identifier(table)?;
        for column in columns {
            validate_identifier(column)?;
        }
        let placeholders = (1..=columns.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            columns.join(", ")
        );
        Ok(Self {
            connection,
            table,
            sql,
            chunk_size: chunk_size.get(),
            pending: Vec::with_capacity(chunk_size.get()),
            report: LoadReport::default(),
        })
    }

    fn push(&mut self, row: Vec<Value>) -> Result<(), IngestError> {
        self.pending.push(row);
        if self.pending.len() >= self.chunk_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), IngestError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let rows = self.pending.len();
        let transaction = self
            .connection
            .transaction()
            .map_err(|source| IngestError::Sqlite {
                operation: "begin batch transaction",
                source,
            })?;
        {
            let mut statement =
                transaction
                    .prepare_cached(&self.sql)
                    .map_err(|source| IngestError::Sqlite {
                        operation: "prepare batch insert",
                        source,
                    })?;
            for row in self.pending.drain(..) {
                statement
                    .execute(params_from_iter(row))
                    .map_err(|source| IngestError::Sqlite {
                        operation: "insert row",
                        source,
                    })?;
            }
        }
        transaction.commit().map_err(|source| IngestError::Sqlite {
            operation: "commit batch",
            source,
        })?;
        self.report.rows += rows;
        self.report.batches += 1;
        log::debug!(
            "committed batch {} of {rows} rows into {} ({} rows so far)",
            self.report.batches,
            self.table,
            self.report.rows
        );
        Ok(())
    }

    fn finish(mut self) -> Result<LoadReport, IngestError> {
        self.flush()?;
        Ok(self.report)
    }
}
