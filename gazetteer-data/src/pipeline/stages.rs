use gazetteer_core::query::{ddl, dml};
use gazetteer_core::{QueryError, SourceConfig, validate_identifier};
use rusqlite::Connection;
use std::num::NonZeroUsize;

use super::{SourceContext, Stage, StageError};
use crate::acquisition::Acquirer;
use crate::catalog::{self, GazetteerId};
use crate::ingest::LoadStrategies;
use crate::store::Store;

fn query_error(stage: &'static str) -> impl Fn(QueryError) -> StageError {
    move |source| StageError::Query { stage, source }
}

fn execute(connection: &Connection, stage: &'static str, sql: &str) -> Result<usize, StageError> {
    connection
        .execute(sql, [])
        .map_err(|source| StageError::Sql {
            stage,
            statement: sql.to_owned(),
            source,
        })
}

/// Run a statement that calls a SpatiaLite function through `SELECT`,
/// returning the function's integer result.
fn select(
    connection: &Connection,
    stage: &'static str,
    sql: &str,
) -> Result<Option<i64>, StageError> {
    connection
        .query_row(sql, [], |row| row.get::<_, Option<i64>>(0))
        .map_err(|source| StageError::Sql {
            stage,
            statement: sql.to_owned(),
            source,
        })
}

/// Run a SpatiaLite management function. These report failure by returning
/// 0 rather than raising an SQL error.
fn spatial_call(connection: &Connection, stage: &'static str, sql: &str) -> Result<(), StageError> {
    match select(connection, stage, sql)? {
        Some(status) if status != 0 => Ok(()),
        status => Err(StageError::SpatialFunction {
            stage,
            statement: sql.to_owned(),
            status,
        }),
    }
}

/// Fetches or locates the source file.
#[derive(Debug)]
pub struct AcquisitionStage<'a> {
    acquirer: Acquirer<'a>,
}

impl<'a> AcquisitionStage<'a> {
    #[must_use]
    pub fn new(acquirer: Acquirer<'a>) -> Self {
        Self { acquirer }
    }
}

impl Stage for AcquisitionStage<'_> {
    fn name(&self) -> &'static str {
        "acquisition"
    }

    fn execute(
        &self,
        _store: &mut Store,
        source: &SourceConfig,
        mut context: SourceContext,
    ) -> Result<SourceContext, StageError> {
        let path = self.acquirer.acquire(source)?;
        log::debug!("{}: acquired {path}", source.name());
        context.file_path = Some(path);
        Ok(context)
    }
}

/// Drops and recreates the staging table and its view.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaStage;

impl SchemaStage {
    const NAME: &'static str = "schema";
}

impl Stage for SchemaStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn execute(
        &self,
        store: &mut Store,
        source: &SourceConfig,
        mut context: SourceContext,
    ) -> Result<SourceContext, StageError> {
        let table = validate_identifier(source.name())
            .map_err(query_error(Self::NAME))?
            .to_owned();
        let connection = store.connection();

        let spatial_drop = ddl::drop_spatial_table(&table).map_err(query_error(Self::NAME))?;
        match select(connection, Self::NAME, &spatial_drop) {
            Ok(Some(status)) if status != 0 => log::debug!("{table}: dropped spatial table"),
            Ok(status) => log::debug!("{table}: spatial drop returned {status:?}"),
            Err(err) => log::debug!("{table}: spatial drop unavailable, using DROP TABLE: {err}"),
        }
        let drop = ddl::drop_table(&table).map_err(query_error(Self::NAME))?;
        execute(connection, Self::NAME, &drop)?;

        let create = ddl::create_table(source, &table).map_err(query_error(Self::NAME))?;
        execute(connection, Self::NAME, &create)?;
        log::debug!("{table}: created staging table");

        if let Some(view_name) = source.view_name() {
            let drop = ddl::drop_view(&view_name).map_err(query_error(Self::NAME))?;
            execute(connection, Self::NAME, &drop)?;
            let create = ddl::create_view(source).map_err(query_error(Self::NAME))?;
            execute(connection, Self::NAME, &create)?;
            log::debug!("{table}: created view {view_name}");
            context.view_name = Some(view_name);
        }

        context.table_name = Some(table);
        Ok(context)
    }
}

/// Streams the acquired file into the staging table.
#[derive(Debug, Clone, Copy)]
pub struct IngestionStage {
    chunk_size: NonZeroUsize,
}

impl IngestionStage {
    const NAME: &'static str = "ingestion";

    #[must_use]
    pub const fn new(chunk_size: NonZeroUsize) -> Self {
        Self { chunk_size }
    }
}

impl Stage for IngestionStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn execute(
        &self,
        store: &mut Store,
        source: &SourceConfig,
        mut context: SourceContext,
    ) -> Result<SourceContext, StageError> {
        let path = context.require_file_path(Self::NAME)?.to_path_buf();
        let table = context.require_table_name(Self::NAME)?.to_owned();
        let report = LoadStrategies::for_kind(source.kind()).load(
            store,
            source,
            &path,
            &table,
            self.chunk_size,
        )?;
        log::info!(
            "{table}: loaded {} rows in {} batches",
            report.rows,
            report.batches
        );
        context.rows_loaded = report.rows;
        Ok(context)
    }
}

/// Computes derived columns and converts staged WKT into geometry.
///
/// Runs in one transaction that is rolled back on failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformationStage;

impl TransformationStage {
    const NAME: &'static str = "transformation";

    fn apply(connection: &Connection, source: &SourceConfig, table: &str) -> Result<(), StageError> {
        for attribute in source.derived_attributes() {
            let column = attribute.storage_column();
            let update = dml::derivation_update(table, &column, &attribute.expression)
                .map_err(query_error(Self::NAME))?;
            let rows = execute(connection, Self::NAME, &update)?;
            log::debug!("{table}: derived {column} for {rows} rows");
        }

        if let Some(geometry) = source.geometry() {
            let add = ddl::add_geometry_column(table, geometry.name, geometry.srid)
                .map_err(query_error(Self::NAME))?;
            spatial_call(connection, Self::NAME, &add)?;
            let update = dml::geometry_update(table, geometry.name, geometry.srid)
                .map_err(query_error(Self::NAME))?;
            let rows = execute(connection, Self::NAME, &update)?;
            log::debug!("{table}: built {} for {rows} rows", geometry.name);
        }
        Ok(())
    }
}

impl Stage for TransformationStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn execute(
        &self,
        store: &mut Store,
        source: &SourceConfig,
        context: SourceContext,
    ) -> Result<SourceContext, StageError> {
        if source.derived_attributes().is_empty() && source.geometry().is_none() {
            return Ok(context);
        }
        let table = context.require_table_name(Self::NAME)?;
        let transaction = store
            .connection_mut()
            .transaction()
            .map_err(|source| StageError::Sql {
                stage: Self::NAME,
                statement: "BEGIN".to_owned(),
                source,
            })?;

        if let Err(err) = Self::apply(&transaction, source, table) {
            if let Err(rollback) = transaction.rollback() {
                log::warn!("{table}: rollback after failed transformation also failed: {rollback}");
            }
            return Err(err);
        }
        transaction.commit().map_err(|source| StageError::Sql {
            stage: Self::NAME,
            statement: "COMMIT".to_owned(),
            source,
        })?;
        Ok(context)
    }
}

/// Builds the indexes flagged in the source attributes.
///
/// A failed index is logged and recorded in the context; the remaining
/// indexes are still attempted.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexingStage;

impl IndexingStage {
    const NAME: &'static str = "indexing";

    fn create(connection: &Connection, table: &str, column: &str, spatial: bool) -> Result<(), StageError> {
        if spatial {
            let sql = ddl::create_spatial_index(table, column).map_err(query_error(Self::NAME))?;
            spatial_call(connection, Self::NAME, &sql)
        } else {
            let sql = ddl::create_index(table, column).map_err(query_error(Self::NAME))?;
            execute(connection, Self::NAME, &sql).map(|_| ())
        }
    }
}

impl Stage for IndexingStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn execute(
        &self,
        store: &mut Store,
        source: &SourceConfig,
        mut context: SourceContext,
    ) -> Result<SourceContext, StageError> {
        let table = context.require_table_name(Self::NAME)?.to_owned();
        for (column, data_type) in source.indexed_columns() {
            match Self::create(store.connection(), &table, column, data_type.is_geometry()) {
                Ok(()) => log::debug!("{table}: indexed {column}"),
                Err(err) => {
                    log::warn!("{table}: failed to index {column}, continuing: {err}");
                    context.failed_indexes.push(column.to_owned());
                }
            }
        }
        Ok(context)
    }
}

/// Registers features and their names in the catalog.
#[derive(Debug, Clone, Copy)]
pub struct RegistrationStage {
    gazetteer: GazetteerId,
}

impl RegistrationStage {
    const NAME: &'static str = "registration";

    #[must_use]
    pub const fn new(gazetteer: GazetteerId) -> Self {
        Self { gazetteer }
    }
}

impl Stage for RegistrationStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn execute(
        &self,
        store: &mut Store,
        source: &SourceConfig,
        mut context: SourceContext,
    ) -> Result<SourceContext, StageError> {
        let Some(features) = source.features() else {
            log::debug!("{}: no features declared", source.name());
            return Ok(context);
        };
        let relation = context.registration_table(Self::NAME)?.to_owned();

        let transaction = store
            .connection_mut()
            .transaction()
            .map_err(|source| StageError::Sql {
                stage: Self::NAME,
                statement: "BEGIN".to_owned(),
                source,
            })?;
        let source_id =
            catalog::ensure_source(&transaction, self.gazetteer, &relation, &features.identifier)
                .map_err(|source| StageError::Catalog {
                    stage: Self::NAME,
                    source,
                })?;

        let insert = dml::feature_insert(features, source_id.0, &relation)
            .map_err(query_error(Self::NAME))?;
        let features_registered = execute(&transaction, Self::NAME, &insert)?;

        let mut names_registered = 0;
        for name in &features.names {
            let insert = match &name.separator {
                Some(separator) => dml::separated_name_insert(
                    features,
                    source_id.0,
                    &relation,
                    &name.column,
                    separator,
                ),
                None => dml::name_insert(features, source_id.0, &relation, &name.column),
            }
            .map_err(query_error(Self::NAME))?;
            names_registered += execute(&transaction, Self::NAME, &insert)?;
        }

        transaction.commit().map_err(|source| StageError::Sql {
            stage: Self::NAME,
            statement: "COMMIT".to_owned(),
            source,
        })?;
        log::info!(
            "{relation}: registered {features_registered} features and {names_registered} names"
        );
        context.features_registered += features_registered;
        context.names_registered += names_registered;
        Ok(context)
    }
}
