//! CSV loading with sample-based column type detection

use std::fs::File;
use std::io::{BufReader, Read};
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder, TimestampMillisecondBuilder};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};

use super::config::{CsvConfig, NullConfig};
use crate::Result;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Milliseconds since the Unix epoch for common date and datetime spellings
pub fn parse_datetime(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis());
        }
    }
    None
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
    }
}

/// Narrowest type every non-null sample of a column parses as
pub fn detect_column_type(samples: &[StringRecord], col: usize, nulls: &NullConfig) -> DataType {
    let mut is_int = true;
    let mut is_float = true;
    let mut is_bool = true;
    let mut is_datetime = true;
    let mut seen = false;

    for value in samples.iter().filter_map(|row| row.get(col)) {
        if nulls.is_null(value) {
            continue;
        }
        seen = true;
        let value = value.trim();
        is_int &= value.parse::<i64>().is_ok();
        is_float &= value.parse::<f64>().is_ok();
        is_bool &= parse_bool(value).is_some();
        is_datetime &= parse_datetime(value).is_some();
        if !(is_int || is_float || is_bool || is_datetime) {
            break;
        }
    }

    if !seen {
        DataType::Float64
    } else if is_int {
        DataType::Int64
    } else if is_float {
        DataType::Float64
    } else if is_bool {
        DataType::Boolean
    } else if is_datetime {
        DataType::Timestamp(TimeUnit::Millisecond, None)
    } else {
        DataType::Utf8
    }
}

fn build_column(rows: &[StringRecord], col: usize, data_type: &DataType, nulls: &NullConfig) -> ArrayRef {
    let cells = rows
        .iter()
        .map(|row| row.get(col).filter(|v| !nulls.is_null(v)).map(str::trim));

    match data_type {
        DataType::Int64 => {
            let mut builder = Int64Builder::with_capacity(rows.len());
            for cell in cells {
                builder.append_option(cell.and_then(|v| v.parse().ok()));
            }
            Arc::new(builder.finish())
        }
        DataType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(rows.len());
            for cell in cells {
                builder.append_option(cell.and_then(parse_bool));
            }
            Arc::new(builder.finish())
        }
        DataType::Timestamp(_, _) => {
            let mut builder = TimestampMillisecondBuilder::with_capacity(rows.len());
            for cell in cells {
                builder.append_option(cell.and_then(parse_datetime));
            }
            Arc::new(builder.finish())
        }
        DataType::Utf8 => {
            let mut builder = StringBuilder::new();
            for cell in cells {
                builder.append_option(cell);
            }
            Arc::new(builder.finish())
        }
        _ => {
            let mut builder = Float64Builder::with_capacity(rows.len());
            for cell in cells {
                builder.append_option(cell.and_then(|v| v.parse().ok()));
            }
            Arc::new(builder.finish())
        }
    }
}

/// Read delimited text into an Arrow batch
pub fn read_batch<R: Read>(reader: R, config: &CsvConfig) -> Result<RecordBatch> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(config.delimiter)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let rows = csv_reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
    let samples = &rows[..rows.len().min(config.sample_size)];

    let mut fields = Vec::new();
    let mut columns = Vec::new();
    for (col, name) in headers.iter().enumerate() {
        if !config.is_selected(name) {
            continue;
        }
        let detected = detect_column_type(samples, col, &config.null_config);
        let data_type = config.column_type(name, &detected);
        tracing::trace!("Column '{}' read as {:?}", name, data_type);
        columns.push(build_column(&rows, col, &data_type, &config.null_config));
        fields.push(Field::new(name, data_type, true));
    }

    tracing::debug!("Read {} rows and {} columns", rows.len(), columns.len());
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Read the file named by `config` into an Arrow batch
pub fn read_batch_from_path(config: &CsvConfig) -> Result<RecordBatch> {
    let file = File::open(&config.path)?;
    read_batch(BufReader::new(file), config)
}
