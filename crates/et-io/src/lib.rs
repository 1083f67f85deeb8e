#![forbid(unsafe_code)]

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use et_columnar::{Column, ColumnError};
use et_frame::{DataFrame, FrameError};
use et_types::{DType, Scalar};
use serde_json::{Map, Value};
use thiserror::Error;

#[cfg(feature = "sql-sqlite")]
mod sql;

#[cfg(feature = "sql-sqlite")]
pub use sql::{read_sql, write_sql};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("csv input has no headers")]
    MissingHeaders,
    #[error("unsupported sql value in column '{column}': {detail}")]
    UnsupportedSqlValue { column: String, detail: String },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "sql-sqlite")]
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Options for CSV ingestion.
///
/// Column dtypes are inferred per column: `Int64` when every non-empty field
/// parses as an integer, `Bool` when every one parses as a bool, `Utf8`
/// otherwise, after trimming surrounding whitespace. Columns listed in
/// `utf8_columns` skip inference and keep their raw text untrimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvReadOptions {
    pub utf8_columns: Vec<String>,
}

impl CsvReadOptions {
    #[must_use]
    pub fn with_utf8_columns(columns: &[&str]) -> Self {
        Self {
            utf8_columns: columns.iter().map(|name| (*name).to_owned()).collect(),
        }
    }
}

pub fn read_csv_str(input: &str, options: &CsvReadOptions) -> Result<DataFrame, IoError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());

    let headers = reader.headers().cloned().map_err(IoError::from)?;

    if headers.is_empty() {
        return Err(IoError::MissingHeaders);
    }

    let mut raw = vec![Vec::<String>::new(); headers.len()];
    for row in reader.records() {
        let record = row?;
        for (idx, values) in raw.iter_mut().enumerate() {
            values.push(record.get(idx).unwrap_or_default().to_owned());
        }
    }

    let forced = options
        .utf8_columns
        .iter()
        .map(String::as_str)
        .collect::<HashSet<_>>();

    let mut named = Vec::with_capacity(headers.len());
    for (name, fields) in headers.iter().zip(raw) {
        let column = if forced.contains(name) {
            utf8_column(fields)?
        } else {
            infer_column(fields)?
        };
        named.push((name.to_owned(), column));
    }

    Ok(DataFrame::from_columns(named)?)
}

pub fn read_csv_path(path: &Path, options: &CsvReadOptions) -> Result<DataFrame, IoError> {
    let input = fs::read_to_string(path)?;
    read_csv_str(&input, options)
}

pub fn write_csv_string(frame: &DataFrame) -> Result<String, IoError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer.write_record(frame.column_names())?;

    for row_idx in 0..frame.len() {
        let row = frame
            .columns()
            .map(|(_, column)| column.value(row_idx).map_or_else(String::new, scalar_to_csv))
            .collect::<Vec<_>>();
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

/// Serialize a frame as a JSON array of row objects, keys in column order.
pub fn write_json_records(frame: &DataFrame) -> Result<String, IoError> {
    let mut rows = Vec::with_capacity(frame.len());
    for row_idx in 0..frame.len() {
        let mut object = Map::new();
        for (name, column) in frame.columns() {
            let value = column.value(row_idx).map_or(Value::Null, scalar_to_json);
            object.insert(name.to_owned(), value);
        }
        rows.push(Value::Object(object));
    }
    Ok(serde_json::to_string_pretty(&Value::Array(rows))?)
}

fn utf8_column(fields: Vec<String>) -> Result<Column, ColumnError> {
    let values = fields
        .into_iter()
        .map(|field| {
            if field.is_empty() {
                Scalar::Null
            } else {
                Scalar::Utf8(field)
            }
        })
        .collect();
    Column::new(DType::Utf8, values)
}

fn infer_column(fields: Vec<String>) -> Result<Column, ColumnError> {
    let fields = fields
        .into_iter()
        .map(|field| field.trim().to_owned())
        .collect::<Vec<_>>();
    let present = fields.iter().filter(|field| !field.is_empty());

    if present.clone().all(|field| field.parse::<i64>().is_ok()) {
        let values = fields
            .iter()
            .map(|field| field.parse::<i64>().map_or(Scalar::Null, Scalar::Int64))
            .collect();
        return Column::new(DType::Int64, values);
    }

    if present.clone().all(|field| field.parse::<bool>().is_ok()) {
        let values = fields
            .iter()
            .map(|field| field.parse::<bool>().map_or(Scalar::Null, Scalar::Bool))
            .collect();
        return Column::new(DType::Bool, values);
    }

    utf8_column(fields)
}

fn scalar_to_csv(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Null => String::new(),
        Scalar::Bool(v) => v.to_string(),
        Scalar::Int64(v) => v.to_string(),
        Scalar::Utf8(v) => v.clone(),
    }
}

fn scalar_to_json(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::Null => Value::Null,
        Scalar::Bool(v) => Value::Bool(*v),
        Scalar::Int64(v) => Value::from(*v),
        Scalar::Utf8(v) => Value::String(v.clone()),
    }
}
