//! Building datasets from tables

pub mod config;
pub mod csv_reader;

use std::path::Path;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray, TimestampMillisecondArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use ndarray::Array1;

pub use config::{ColumnType, CsvConfig, NullConfig};
pub use csv_reader::{detect_column_type, parse_datetime, read_batch, read_batch_from_path};

use crate::component::Component;
use crate::data::Data;
use crate::{DataError, Result};

fn downcast<'a, T: 'static>(array: &'a ArrayRef, expected: &str) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| DataError::InvalidArgument(format!("column is not a {} array", expected)))
}

/// Convert one Arrow column. Unsupported types give `None`.
fn component_from_array(array: &ArrayRef) -> Result<Option<Component>> {
    let data_type = array.data_type();
    if data_type.is_numeric() || *data_type == DataType::Boolean {
        let values = cast(array, &DataType::Float64)?;
        let values = downcast::<Float64Array>(&values, "float")?;
        let values: Vec<f64> = values.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        return Ok(Some(Component::from_vec(values)));
    }

    match data_type {
        DataType::Utf8 | DataType::LargeUtf8 => {
            let labels = cast(array, &DataType::Utf8)?;
            let labels = downcast::<StringArray>(&labels, "string")?;
            // missing cells become their own empty category
            let labels: Vec<&str> = labels.iter().map(|v| v.unwrap_or("")).collect();
            Ok(Some(Component::categorical(&labels)))
        }
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => {
            let millis = cast(array, &DataType::Timestamp(TimeUnit::Millisecond, None))?;
            let millis = downcast::<TimestampMillisecondArray>(&millis, "timestamp")?;
            let millis: Vec<f64> = millis.iter().map(|v| v.map_or(f64::NAN, |m| m as f64)).collect();
            Ok(Some(Component::datetime(Array1::from(millis).into_dyn())))
        }
        _ => Ok(None),
    }
}

impl Data {
    /// One-dimensional dataset with one component per supported column.
    ///
    /// Numeric and boolean columns become numerical components, strings
    /// categorical ones and dates or timestamps date/time ones. Nulls read as
    /// NaN.
    pub fn from_record_batch(label: impl Into<String>, batch: &RecordBatch) -> Result<Self> {
        let mut data = Data::new(label, vec![batch.num_rows()]);
        let schema = batch.schema();
        for (field, column) in schema.fields().iter().zip(batch.columns()) {
            match component_from_array(column)? {
                Some(component) => {
                    data.add_component(field.name().as_str(), component)?;
                }
                None => tracing::warn!("Skipping column '{}' of type {:?}", field.name(), field.data_type()),
            }
        }
        tracing::info!(
            "Built '{}' with {} rows and {} components",
            data.label(),
            batch.num_rows(),
            data.main_components().len()
        );
        Ok(data)
    }
}

/// Load a CSV file with default options
pub fn read_csv(path: impl AsRef<Path>) -> Result<Data> {
    read_csv_with(&CsvConfig::new(path.as_ref()))
}

/// Load a CSV file as described by `config`
pub fn read_csv_with(config: &CsvConfig) -> Result<Data> {
    let batch = read_batch_from_path(config)?;
    Data::from_record_batch(config.label(), &batch)
}
