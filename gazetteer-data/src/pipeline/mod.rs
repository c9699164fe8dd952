//! The per-source installation pipeline.
//!
//! A [`Pipeline`] runs its stages in order for one source, threading a
//! [`SourceContext`] from stage to stage. The standard pipeline is
//! acquisition, schema, ingestion, transformation, indexing and
//! registration. Any stage error aborts the source; indexing failures are
//! recorded in the context instead.

mod context;
mod stages;

use camino::Utf8PathBuf;
use gazetteer_core::{QueryError, SourceConfig};
use rusqlite::Error as SqliteError;
use std::num::NonZeroUsize;
use thiserror::Error;

use crate::acquisition::{Acquirer, AcquisitionError, RemoteSource};
use crate::catalog::{CatalogError, GazetteerId};
use crate::ingest::IngestError;
use crate::store::Store;

pub use context::SourceContext;
pub use stages::{
    AcquisitionStage, IndexingStage, IngestionStage, RegistrationStage, SchemaStage,
    TransformationStage,
};

/// Errors raised by a pipeline stage.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StageError {
    #[error("acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),
    #[error("ingestion failed: {0}")]
    Ingestion(#[from] IngestError),
    #[error("{stage} stage could not build a statement: {source}")]
    Query {
        stage: &'static str,
        source: QueryError,
    },
    #[error("{stage} stage failed to update the catalog")]
    Catalog {
        stage: &'static str,
        #[source]
        source: CatalogError,
    },
    #[error("{stage} stage failed to execute `{statement}`: {source}")]
    Sql {
        stage: &'static str,
        statement: String,
        source: SqliteError,
    },
    #[error("{stage} stage: `{statement}` reported failure (returned {status:?})")]
    SpatialFunction {
        stage: &'static str,
        statement: String,
        status: Option<i64>,
    },
    #[error("{stage} stage requires {key} from an earlier stage")]
    MissingContext {
        stage: &'static str,
        key: &'static str,
    },
}

/// One step of the per-source pipeline.
pub trait Stage {
    /// Short stage name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Run the stage for `source`, returning the updated context.
    ///
    /// # Errors
    /// Returns a [`StageError`] when the stage cannot complete.
    fn execute(
        &self,
        store: &mut Store,
        source: &SourceConfig,
        context: SourceContext,
    ) -> Result<SourceContext, StageError>;
}

/// Parameters of the standard pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Where remote sources are cached.
    pub downloads_dir: Utf8PathBuf,
    /// Rows per ingestion batch.
    pub chunk_size: NonZeroUsize,
    /// Catalog row that registered sources belong to.
    pub gazetteer: GazetteerId,
}

/// An ordered list of stages run for each source.
pub struct Pipeline<'a> {
    stages: Vec<Box<dyn Stage + 'a>>,
}

impl std::fmt::Debug for Pipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|stage| stage.name()))
            .finish()
    }
}

impl<'a> Pipeline<'a> {
    /// A pipeline running `stages` in the given order.
    #[must_use]
    pub fn new(stages: Vec<Box<dyn Stage + 'a>>) -> Self {
        Self { stages }
    }

    /// The standard six-stage pipeline.
    #[must_use]
    pub fn standard(remote: &'a dyn RemoteSource, settings: PipelineSettings) -> Self {
        Self::new(vec![
            Box::new(AcquisitionStage::new(Acquirer::new(
                remote,
                settings.downloads_dir,
            ))),
            Box::new(SchemaStage),
            Box::new(IngestionStage::new(settings.chunk_size)),
            Box::new(TransformationStage),
            Box::new(IndexingStage),
            Box::new(RegistrationStage::new(settings.gazetteer)),
        ])
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stages.iter().map(|stage| stage.name())
    }

    /// Run every stage for `source` against a fresh context.
    ///
    /// # Errors
    /// Returns the first [`StageError`]; later stages do not run.
    pub fn run(&self, store: &mut Store, source: &SourceConfig) -> Result<SourceContext, StageError> {
        let mut context = SourceContext::default();
        for stage in &self.stages {
            log::info!("{}: {} started", source.name(), stage.name());
            context = stage.execute(store, source, context)?;
            log::info!("{}: {} completed", source.name(), stage.name());
        }
        Ok(context)
    }
}
