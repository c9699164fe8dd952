use camino::Utf8Path;
use gazetteer_core::{OriginalAttribute, SourceConfig, SourceFormat};
use geojson::{FeatureReader, JsonValue};
use geozero::ToWkt;
use rusqlite::types::Value;
use shapefile::dbase::{self, FieldValue};
use shapefile::{Shape, ShapeReader};
use std::io::BufReader;
use std::num::NonZeroUsize;

use super::{BatchWriter, IngestError, LoadReport, LoadStrategy, storage_columns};
use crate::store::Store;

/// Vector formats read by [`SpatialLoader`], chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorFormat {
    /// `.geojson` or `.json` feature collections.
    GeoJson,
    /// ESRI shapefiles: `.shp` geometry with a `.dbf` attribute table beside it.
    Shapefile,
}

impl VectorFormat {
    /// Format implied by the extension of `path`, compared case-insensitively.
    #[must_use]
    pub fn detect(path: &Utf8Path) -> Option<Self> {
        match path.extension()?.to_ascii_lowercase().as_str() {
            "geojson" | "json" => Some(Self::GeoJson),
            "shp" => Some(Self::Shapefile),
            _ => None,
        }
    }
}

/// Loads vector files.
///
/// Non-geometry original attributes take the feature properties (GeoJSON)
/// or attribute table fields (shapefile) by position, in file order. The
/// feature geometry fills the geometry attribute as WKT.
///
/// Both formats hold a single layer named after the file stem, so a
/// declared `layer` must match that stem.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialLoader;

impl LoadStrategy for SpatialLoader {
    fn load(
        &self,
        store: &mut Store,
        source: &SourceConfig,
        path: &Utf8Path,
        table: &str,
        chunk_size: NonZeroUsize,
    ) -> Result<LoadReport, IngestError> {
        let SourceFormat::Spatial { layer } = source.format() else {
            return Err(IngestError::WrongFormat {
                source_name: source.name().to_owned(),
            });
        };
        let format = VectorFormat::detect(path).ok_or_else(|| IngestError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;
        check_layer(path, layer.as_deref())?;
        log::info!("loading {format:?} {path} into {table}");

        let columns = storage_columns(source);
        let mut writer = BatchWriter::new(store.connection_mut(), table, &columns, chunk_size)?;
        let attributes = source.original_attributes();
        match format {
            VectorFormat::GeoJson => load_geojson(path, attributes, &mut writer)?,
            VectorFormat::Shapefile => load_shapefile(path, attributes, &mut writer)?,
        }
        writer.finish()
    }
}

fn check_layer(path: &Utf8Path, layer: Option<&str>) -> Result<(), IngestError> {
    let Some(layer) = layer else {
        return Ok(());
    };
    let available = path.file_stem().unwrap_or_default();
    if layer == available {
        Ok(())
    } else {
        Err(IngestError::UnknownLayer {
            path: path.to_path_buf(),
            layer: layer.to_owned(),
            available: available.to_owned(),
        })
    }
}

fn read_error<E>(path: &Utf8Path) -> impl Fn(E) -> IngestError + '_
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |source| IngestError::Read {
        path: path.to_path_buf(),
        source: Box::new(source),
    }
}

fn open(path: &Utf8Path) -> Result<BufReader<cap_std::fs_utf8::File>, IngestError> {
    gazetteer_fs::open_utf8_file(path)
        .map(BufReader::new)
        .map_err(|source| IngestError::Open {
            path: path.to_path_buf(),
            source,
        })
}

/// Assemble one staged row, pairing scalar attributes with `properties` in
/// order and skipping dropped attributes.
fn row_values(
    attributes: &[OriginalAttribute],
    mut properties: impl Iterator<Item = Value>,
    geometry: Option<String>,
) -> Vec<Value> {
    let mut geometry = geometry.map(Value::Text);
    let mut values = Vec::with_capacity(attributes.len());
    for attribute in attributes {
        let value = if attribute.data_type.is_geometry() {
            geometry.take().unwrap_or(Value::Null)
        } else {
            properties.next().unwrap_or(Value::Null)
        };
        if !attribute.drop {
            values.push(value);
        }
    }
    values
}

fn load_geojson(
    path: &Utf8Path,
    attributes: &[OriginalAttribute],
    writer: &mut BatchWriter<'_>,
) -> Result<(), IngestError> {
    let reader = FeatureReader::from_reader(open(path)?);
    for (index, feature) in reader.features().enumerate() {
        let row = index + 1;
        let feature = feature.map_err(read_error(path))?;
        let geometry = match &feature.geometry {
            Some(geometry) => {
                let converted =
                    geo::Geometry::<f64>::try_from(geometry.clone()).map_err(|source| {
                        IngestError::Geometry {
                            row,
                            source: Box::new(source),
                        }
                    })?;
                Some(wkt(row, &converted)?)
            }
            None => None,
        };
        let properties = feature
            .properties
            .iter()
            .flat_map(|properties| properties.values())
            .map(json_value);
        writer.push(row_values(attributes, properties, geometry))?;
    }
    Ok(())
}

fn load_shapefile(
    path: &Utf8Path,
    attributes: &[OriginalAttribute],
    writer: &mut BatchWriter<'_>,
) -> Result<(), IngestError> {
    let table_path = path.with_extension("dbf");
    let shapes = ShapeReader::new(open(path)?).map_err(read_error(path))?;
    let table = dbase::Reader::new(open(&table_path)?).map_err(read_error(&table_path))?;
    let fields: Vec<String> = table
        .fields()
        .iter()
        .map(|field| field.name().to_owned())
        .collect();
    let mut reader = shapefile::Reader::new(shapes, table);

    for (index, entry) in reader.iter_shapes_and_records().enumerate() {
        let row = index + 1;
        let (shape, record) = entry.map_err(read_error(path))?;
        let geometry = match shape {
            Shape::NullShape => None,
            shape => {
                let converted = geo::Geometry::<f64>::try_from(shape).map_err(|err| {
                    IngestError::Geometry {
                        row,
                        source: err.to_string().into(),
                    }
                })?;
                Some(wkt(row, &converted)?)
            }
        };
        let properties = fields
            .iter()
            .filter_map(|name| record.get(name))
            .map(field_value);
        writer.push(row_values(attributes, properties, geometry))?;
    }
    Ok(())
}

fn wkt(row: usize, geometry: &geo::Geometry<f64>) -> Result<String, IngestError> {
    geometry.to_wkt().map_err(|source| IngestError::Geometry {
        row,
        source: Box::new(source),
    })
}

/// SQLite value for a GeoJSON property, leaving type affinity to the column.
fn json_value(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(flag) => Value::Integer(i64::from(*flag)),
        JsonValue::Number(number) => number
            .as_i64()
            .map(Value::Integer)
            .or_else(|| number.as_f64().map(Value::Real))
            .unwrap_or_else(|| Value::Text(number.to_string())),
        JsonValue::String(text) => Value::Text(text.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => Value::Text(value.to_string()),
    }
}

/// SQLite value for a dBase field. Numeric fields are stored as reals and
/// left to column affinity, as GeoJSON numbers are.
fn field_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Character(text) => text.clone().map_or(Value::Null, Value::Text),
        FieldValue::Memo(text) => Value::Text(text.clone()),
        FieldValue::Numeric(number) => number.map_or(Value::Null, Value::Real),
        FieldValue::Float(number) => number.map_or(Value::Null, |n| Value::Real(f64::from(n))),
        FieldValue::Double(number) | FieldValue::Currency(number) => Value::Real(*number),
        FieldValue::Integer(number) => Value::Integer(i64::from(*number)),
        FieldValue::Logical(flag) => flag.map_or(Value::Null, |f| Value::Integer(i64::from(f))),
        FieldValue::Date(date) => date.as_ref().map_or(Value::Null, |date| {
            Value::Text(format!(
                "{:04}-{:02}-{:02}",
                date.year(),
                date.month(),
                date.day()
            ))
        }),
        other => Value::Text(format!("{other:?}")),
    }
}
