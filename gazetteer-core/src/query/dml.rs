//! Data statements: derived columns, geometry conversion and feature/name
//! registration.
//!
//! Registration statements are `INSERT OR IGNORE … SELECT`, so re-running
//! them over the same rows converges on the same catalog contents.

use super::{QueryError, quote_literal, validate_identifier};
use crate::model::{FeatureConfig, WKT_SUFFIX};

/// Build the `UPDATE` that fills `column` from a SQL expression.
///
/// # Errors
/// Returns [`QueryError::InvalidIdentifier`] for an unsafe table or column
/// name.
pub fn derivation_update(table: &str, column: &str, expression: &str) -> Result<String, QueryError> {
    validate_identifier(table)?;
    validate_identifier(column)?;
    Ok(format!("UPDATE {table} SET {column} = {expression}"))
}

/// Build the `UPDATE` that parses the staged WKT column into native geometry.
///
/// # Errors
/// Returns [`QueryError::InvalidIdentifier`] for an unsafe table or column
/// name.
///
/// # Examples
/// ```
/// use gazetteer_core::query::dml::geometry_update;
///
/// assert_eq!(
///     geometry_update("places", "geometry", 4326).expect("valid identifiers"),
///     "UPDATE places SET geometry = GeomFromText(geometry_wkt, 4326) \
///      WHERE geometry_wkt IS NOT NULL"
/// );
/// ```
pub fn geometry_update(table: &str, column: &str, srid: i32) -> Result<String, QueryError> {
    validate_identifier(table)?;
    validate_identifier(column)?;
    let staged = format!("{column}{WKT_SUFFIX}");
    Ok(format!(
        "UPDATE {table} SET {column} = GeomFromText({staged}, {srid}) WHERE {staged} IS NOT NULL"
    ))
}

/// Build the statement registering one feature per distinct identifier.
///
/// Identifiers are compared as text so `7` and `'7'` collapse to one row.
///
/// # Errors
/// Returns [`QueryError::InvalidIdentifier`] for an unsafe table or column
/// name.
pub fn feature_insert(
    features: &FeatureConfig,
    source_id: i64,
    registration_table: &str,
) -> Result<String, QueryError> {
    let table = validate_identifier(registration_table)?;
    let identifier = validate_identifier(&features.identifier)?;
    Ok(format!(
        "INSERT OR IGNORE INTO feature (source_id, location_id_value) \
         SELECT {source_id}, CAST({identifier} AS TEXT) \
         FROM {table} \
         WHERE {identifier} IS NOT NULL \
         GROUP BY CAST({identifier} AS TEXT)"
    ))
}

fn feature_join(source_id: i64, identifier: &str) -> String {
    format!(
        "JOIN feature f ON f.source_id = {source_id} \
         AND f.location_id_value = CAST(s.{identifier} AS TEXT)"
    )
}

/// Build the statement registering one name per row from `name_column`.
///
/// # Errors
/// Returns [`QueryError::InvalidIdentifier`] for an unsafe table or column
/// name.
pub fn name_insert(
    features: &FeatureConfig,
    source_id: i64,
    registration_table: &str,
    name_column: &str,
) -> Result<String, QueryError> {
    let table = validate_identifier(registration_table)?;
    let identifier = validate_identifier(&features.identifier)?;
    let name = validate_identifier(name_column)?;
    let join = feature_join(source_id, identifier);
    Ok(format!(
        "INSERT OR IGNORE INTO name (text, feature_id) \
         SELECT s.{name}, f.id \
         FROM {table} s {join} \
         WHERE s.{name} IS NOT NULL AND s.{name} != ''"
    ))
}

/// Build the statement registering every `separator`-delimited name in
/// `name_column`.
///
/// A recursive CTE seeds each row with its text plus a trailing separator,
/// peels off the trimmed token before the next separator and recurses on
/// the remainder. Empty tokens are discarded, so `"Alpha, Beta, , Gamma"`
/// split on `", "` yields `Alpha`, `Beta` and `Gamma`.
///
/// # Errors
/// Returns [`QueryError::InvalidIdentifier`] for an unsafe table or column
/// name.
pub fn separated_name_insert(
    features: &FeatureConfig,
    source_id: i64,
    registration_table: &str,
    name_column: &str,
    separator: &str,
) -> Result<String, QueryError> {
    let table = validate_identifier(registration_table)?;
    let identifier = validate_identifier(&features.identifier)?;
    let name = validate_identifier(name_column)?;
    let join = feature_join(source_id, identifier);
    let literal = quote_literal(separator);
    let width = separator.chars().count();
    Ok(format!(
        "WITH RECURSIVE split_names(feature_id, name_value, remaining) AS (\
             SELECT f.id, '', s.{name} || {literal} \
             FROM {table} s {join} \
             WHERE s.{name} IS NOT NULL AND s.{name} != '' \
             UNION ALL \
             SELECT feature_id, \
                 TRIM(substr(remaining, 1, instr(remaining, {literal}) - 1)), \
                 substr(remaining, instr(remaining, {literal}) + {width}) \
             FROM split_names \
             WHERE remaining != '' AND instr(remaining, {literal}) > 0\
         ) \
         INSERT OR IGNORE INTO name (text, feature_id) \
         SELECT name_value, feature_id FROM split_names \
         WHERE name_value IS NOT NULL AND name_value != ''"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NameColumn;
    use rstest::{fixture, rstest};

    #[fixture]
    fn features() -> FeatureConfig {
        FeatureConfig {
            identifier: "geonameid".to_owned(),
            names: vec![NameColumn {
                column: "name".to_owned(),
                separator: None,
            }],
        }
    }

    #[rstest]
    fn derivation_update_assigns_expression() {
        assert_eq!(
            derivation_update("places", "label", "upper(name)").expect("valid"),
            "UPDATE places SET label = upper(name)"
        );
    }

    #[rstest]
    fn feature_insert_deduplicates_by_text_identifier(features: FeatureConfig) {
        let sql = feature_insert(&features, 3, "places_view").expect("valid");
        assert!(sql.starts_with("INSERT OR IGNORE INTO feature (source_id, location_id_value)"));
        assert!(sql.contains("SELECT 3, CAST(geonameid AS TEXT) FROM places_view"));
        assert!(sql.contains("WHERE geonameid IS NOT NULL"));
        assert!(sql.ends_with("GROUP BY CAST(geonameid AS TEXT)"));
    }

    #[rstest]
    fn name_insert_skips_empty_names(features: FeatureConfig) {
        let sql = name_insert(&features, 3, "places", "name").expect("valid");
        assert!(sql.contains("JOIN feature f ON f.source_id = 3"));
        assert!(sql.contains("f.location_id_value = CAST(s.geonameid AS TEXT)"));
        assert!(sql.ends_with("WHERE s.name IS NOT NULL AND s.name != ''"));
    }

    #[rstest]
    fn separated_insert_quotes_separator(features: FeatureConfig) {
        let sql =
            separated_name_insert(&features, 3, "places", "alternatenames", "'").expect("valid");
        assert!(sql.starts_with("WITH RECURSIVE split_names"));
        assert!(sql.contains("s.alternatenames || ''''"));
        assert!(sql.contains("instr(remaining, '''') + 1"));
    }

    #[rstest]
    fn separated_insert_advances_by_separator_width(features: FeatureConfig) {
        let sql = separated_name_insert(&features, 1, "places", "name", ", ").expect("valid");
        assert!(sql.contains("instr(remaining, ', ') + 2"));
    }

    #[rstest]
    fn registration_rejects_unsafe_identifier() {
        let features = FeatureConfig {
            identifier: "id) OR 1=1 --".to_owned(),
            names: Vec::new(),
        };
        assert!(matches!(
            feature_insert(&features, 1, "places"),
            Err(QueryError::InvalidIdentifier { .. })
        ));
    }
}
