//! Schema statements: tables, views, geometry columns and indexes.

use super::spatial::optimize_join_condition;
use super::{QueryError, validate_identifier};
use crate::model::{DataType, SourceConfig, storage_column};

/// Geometry type passed to `AddGeometryColumn`.
pub const GEOMETRY_TYPE: &str = "GEOMETRY";

/// Coordinate dimension passed to `AddGeometryColumn`.
pub const COORDINATE_DIMENSION: &str = "XY";

/// Build the `CREATE TABLE` statement staging `source` into `table`.
///
/// Dropped original attributes are omitted. Geometry columns, original or
/// derived, are created as `<name>_wkt TEXT` and converted later.
///
/// # Errors
/// Returns [`QueryError::InvalidIdentifier`] for an unsafe table or column
/// name.
///
/// # Examples
/// ```
/// use gazetteer_core::{GazetteerConfig, query::ddl::create_table};
///
/// let config = GazetteerConfig::from_yaml_str(
///     r#"
/// name: demo
/// sources:
///   - name: t
///     path: t.geojson
///     file: t.geojson
///     type: spatial
///     attributes:
///       original:
///         - { name: id, type: INTEGER }
///         - { name: geometry, type: GEOMETRY, srid: 4326 }
/// "#,
/// )
/// .expect("valid configuration");
/// let sql = create_table(&config.sources()[0], "t").expect("valid identifiers");
/// assert_eq!(sql, "CREATE TABLE t (id INTEGER, geometry_wkt TEXT)");
/// ```
pub fn create_table(source: &SourceConfig, table: &str) -> Result<String, QueryError> {
    validate_identifier(table)?;
    let original = source
        .original_attributes()
        .iter()
        .filter(|attribute| !attribute.drop)
        .map(|attribute| (attribute.name.as_str(), attribute.data_type));
    let derived = source
        .derived_attributes()
        .iter()
        .map(|attribute| (attribute.name.as_str(), attribute.data_type));
    let columns = original
        .chain(derived)
        .map(|(name, data_type)| column_definition(name, data_type))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("CREATE TABLE {table} ({})", columns.join(", ")))
}

fn column_definition(name: &str, data_type: DataType) -> Result<String, QueryError> {
    validate_identifier(name)?;
    let sql_type = if data_type.is_geometry() {
        DataType::Text.sql_type()
    } else {
        data_type.sql_type()
    };
    Ok(format!("{} {sql_type}", storage_column(name, data_type)))
}

/// Build the SpatiaLite statement registering a native geometry column.
///
/// # Errors
/// Returns [`QueryError::InvalidIdentifier`] for an unsafe table or column
/// name.
pub fn add_geometry_column(table: &str, column: &str, srid: i32) -> Result<String, QueryError> {
    validate_identifier(table)?;
    validate_identifier(column)?;
    Ok(format!(
        "SELECT AddGeometryColumn('{table}', '{column}', {srid}, \
         '{GEOMETRY_TYPE}', '{COORDINATE_DIMENSION}')"
    ))
}

/// Build the SpatiaLite drop that also cleans geometry metadata.
///
/// # Errors
/// Returns [`QueryError::InvalidIdentifier`] for an unsafe table name.
pub fn drop_spatial_table(table: &str) -> Result<String, QueryError> {
    validate_identifier(table)?;
    Ok(format!("SELECT DropTable(NULL, '{table}', 1)"))
}

/// Build a plain `DROP TABLE IF EXISTS`.
///
/// # Errors
/// Returns [`QueryError::InvalidIdentifier`] for an unsafe table name.
pub fn drop_table(table: &str) -> Result<String, QueryError> {
    validate_identifier(table)?;
    Ok(format!("DROP TABLE IF EXISTS {table}"))
}

/// Build a `DROP VIEW IF EXISTS`.
///
/// # Errors
/// Returns [`QueryError::InvalidIdentifier`] for an unsafe view name.
pub fn drop_view(view: &str) -> Result<String, QueryError> {
    validate_identifier(view)?;
    Ok(format!("DROP VIEW IF EXISTS {view}"))
}

/// Build the `CREATE VIEW` statement declared by `source`.
///
/// The view is named `<source>_view` and selects from the source's own
/// table. Join conditions pass through
/// [`optimize_join_condition`] so spatial joins consult the R-tree.
///
/// # Errors
/// Returns [`QueryError::MissingView`] when the source declares no view and
/// [`QueryError::InvalidIdentifier`] for unsafe names.
pub fn create_view(source: &SourceConfig) -> Result<String, QueryError> {
    let (Some(view), Some(view_name)) = (source.view(), source.view_name()) else {
        return Err(QueryError::MissingView {
            source_name: source.name().to_owned(),
        });
    };
    validate_identifier(&view_name)?;
    let base = validate_identifier(source.name())?;

    let columns = view
        .select
        .iter()
        .map(|item| -> Result<String, QueryError> {
            validate_identifier(&item.source)?;
            validate_identifier(&item.column)?;
            let reference = format!("{}.{}", item.source, item.column);
            match &item.alias {
                Some(alias) => {
                    validate_identifier(alias)?;
                    Ok(format!("{reference} AS {alias}"))
                }
                None => Ok(reference),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let joins = view
        .join
        .iter()
        .map(|item| -> Result<String, QueryError> {
            validate_identifier(&item.source)?;
            Ok(format!(
                " {} {} ON {}",
                item.kind.as_sql(),
                item.source,
                optimize_join_condition(&item.condition)
            ))
        })
        .collect::<Result<String, _>>()?;

    Ok(format!(
        "CREATE VIEW {view_name} AS SELECT {} FROM {base}{joins}",
        columns.join(", ")
    ))
}

/// Build the SpatiaLite statement creating an R-tree index.
///
/// # Errors
/// Returns [`QueryError::InvalidIdentifier`] for an unsafe table or column
/// name.
pub fn create_spatial_index(table: &str, column: &str) -> Result<String, QueryError> {
    validate_identifier(table)?;
    validate_identifier(column)?;
    Ok(format!("SELECT CreateSpatialIndex('{table}', '{column}')"))
}

/// Build a B-tree index named `idx_<table>_<column>`.
///
/// # Errors
/// Returns [`QueryError::InvalidIdentifier`] for an unsafe table or column
/// name.
pub fn create_index(table: &str, column: &str) -> Result<String, QueryError> {
    validate_identifier(table)?;
    validate_identifier(column)?;
    Ok(format!(
        "CREATE INDEX idx_{table}_{column} ON {table}({column})"
    ))
}
