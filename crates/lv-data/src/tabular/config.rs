//! Options for reading delimited text files

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use arrow::datatypes::{DataType, TimeUnit};
use serde::{Deserialize, Serialize};

/// Column type that can be forced from a config file
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColumnType {
    Numerical,
    Categorical,
    DateTime,
}

impl From<ColumnType> for DataType {
    fn from(kind: ColumnType) -> Self {
        match kind {
            ColumnType::Numerical => DataType::Float64,
            ColumnType::Categorical => DataType::Utf8,
            ColumnType::DateTime => DataType::Timestamp(TimeUnit::Millisecond, None),
        }
    }
}

/// Cell values read as missing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NullConfig {
    pub patterns: Vec<String>,
    pub trim_whitespace: bool,
    pub case_sensitive: bool,
}

impl Default for NullConfig {
    fn default() -> Self {
        Self {
            patterns: ["", "-", "N/A", "NA", "null", "None", "NaN"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            trim_whitespace: true,
            case_sensitive: false,
        }
    }
}

impl NullConfig {
    pub fn is_null(&self, value: &str) -> bool {
        let value = if self.trim_whitespace { value.trim() } else { value };
        self.patterns.iter().any(|pattern| {
            if self.case_sensitive {
                value == pattern
            } else {
                value.eq_ignore_ascii_case(pattern)
            }
        })
    }

    pub fn add_pattern(&mut self, pattern: impl Into<String>) {
        let pattern = pattern.into();
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }
}

/// How one CSV file is turned into a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    pub path: PathBuf,

    /// Dataset label, the file stem when absent
    pub label: Option<String>,

    pub delimiter: u8,

    /// Columns to keep. Empty keeps all.
    pub selected_columns: HashSet<String>,

    /// Forced column types, bypassing detection
    pub column_types: HashMap<String, ColumnType>,

    pub null_config: NullConfig,

    /// Rows inspected for type detection
    pub sample_size: usize,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            label: None,
            delimiter: b',',
            selected_columns: HashSet::new(),
            column_types: HashMap::new(),
            null_config: NullConfig::default(),
            sample_size: 1000,
        }
    }
}

impl CsvConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Label given to the dataset
    pub fn label(&self) -> String {
        self.label.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .and_then(|n| n.to_str())
                .unwrap_or("data")
                .to_string()
        })
    }

    pub fn is_selected(&self, column: &str) -> bool {
        self.selected_columns.is_empty() || self.selected_columns.contains(column)
    }

    /// Detected type unless overridden
    pub fn column_type(&self, column: &str, detected: &DataType) -> DataType {
        self.column_types
            .get(column)
            .map(|kind| DataType::from(*kind))
            .unwrap_or_else(|| detected.clone())
    }
}
