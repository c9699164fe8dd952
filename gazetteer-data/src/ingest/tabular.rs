use camino::Utf8Path;
use gazetteer_core::{DataType, OriginalAttribute, SourceConfig, SourceFormat};
use rusqlite::types::Value;
use std::io::{BufRead, BufReader};
use std::num::NonZeroUsize;

use super::{BatchWriter, IngestError, LoadReport, LoadStrategy, storage_columns};
use crate::store::Store;

/// Loads headerless delimited text.
///
/// Fields are matched to original attributes by position, dropped ones
/// included, so a dropped attribute still consumes its column. Empty fields
/// become NULL and missing trailing fields are treated as empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct TabularLoader;

impl LoadStrategy for TabularLoader {
    fn load(
        &self,
        store: &mut Store,
        source: &SourceConfig,
        path: &Utf8Path,
        table: &str,
        chunk_size: NonZeroUsize,
    ) -> Result<LoadReport, IngestError> {
        let SourceFormat::Tabular {
            separator,
            skip_rows,
        } = *source.format()
        else {
            return Err(IngestError::WrongFormat {
                source_name: source.name().to_owned(),
            });
        };

        let total = count_data_rows(path, skip_rows)?;
        log::info!(
            "loading {total} rows from {path} into {table} in batches of {chunk_size}"
        );

        let mut reader = open(path)?;
        skip_lines(&mut reader, path, skip_rows)?;
        let mut records = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(separator)
            .flexible(true)
            .from_reader(reader);

        let attributes = source.original_attributes();
        let columns = storage_columns(source);
        let mut writer = BatchWriter::new(store.connection_mut(), table, &columns, chunk_size)?;
        let mut record = csv::StringRecord::new();
        let mut row = 0;
        while records
            .read_record(&mut record)
            .map_err(|source| IngestError::Read {
                path: path.to_path_buf(),
                source: Box::new(source),
            })?
        {
            row += 1;
            let values = attributes
                .iter()
                .enumerate()
                .filter(|(_, attribute)| !attribute.drop)
                .map(|(position, attribute)| {
                    convert_field(row, attribute, record.get(position).unwrap_or(""))
                })
                .collect::<Result<Vec<_>, _>>()?;
            writer.push(values)?;
        }
        writer.finish()
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

fn skip_lines(reader: &mut impl BufRead, path: &Utf8Path, count: usize) -> Result<usize, IngestError> {
    let mut line = Vec::new();
    let mut skipped = 0;
    while skipped < count {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|source| IngestError::Read {
                path: path.to_path_buf(),
                source: Box::new(source),
            })?;
        if read == 0 {
            break;
        }
        skipped += 1;
    }
    Ok(skipped)
}

/// Non-blank lines after the skipped header lines.
fn count_data_rows(path: &Utf8Path, skip_rows: usize) -> Result<usize, IngestError> {
    let mut reader = open(path)?;
    skip_lines(&mut reader, path, skip_rows)?;
    let mut line = Vec::new();
    let mut rows = 0;
    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|source| IngestError::Read {
                path: path.to_path_buf(),
                source: Box::new(source),
            })?;
        if read == 0 {
            return Ok(rows);
        }
        if !line.trim_ascii().is_empty() {
            rows += 1;
        }
    }
}

fn convert_field(row: usize, attribute: &OriginalAttribute, field: &str) -> Result<Value, IngestError> {
    if field.is_empty() {
        return Ok(Value::Null);
    }
    let invalid = |expected| IngestError::InvalidValue {
        row,
        column: attribute.name.clone(),
        value: field.to_owned(),
        expected,
    };
    match attribute.data_type {
        DataType::Integer => field
            .trim()
            .parse()
            .map(Value::Integer)
            .map_err(|_| invalid("INTEGER")),
        DataType::Real => field
            .trim()
            .parse()
            .map(Value::Real)
            .map_err(|_| invalid("REAL")),
        DataType::Blob => Ok(Value::Blob(field.as_bytes().to_vec())),
        DataType::Text | DataType::Geometry => Ok(Value::Text(field.to_owned())),
    }
}
