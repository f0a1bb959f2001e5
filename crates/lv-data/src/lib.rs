//! Datasets, links and subsets for the linked-data model
//!
//! A [`DataCollection`] owns every [`Data`] and the links declared between
//! them. Component values are requested through the collection so that a
//! component missing from one dataset can be derived from linked ones.

pub mod collection;
pub mod commands;
pub mod component;
pub mod coordinates;
pub mod data;
pub mod derived;
pub mod link;
pub mod link_editor;
pub mod roi;
pub mod stats;
pub mod subset;
pub mod subset_state;
pub mod tabular;
pub mod view;

mod resolve;

use arrow::error::ArrowError;
use lv_core::{ComponentId, DataId, LinkId, SubsetId};
use thiserror::Error;

// Re-exports
pub use collection::{DataCollection, RemovedData};
pub use commands::{AddData, AddLink, ApplySubsetState, CommandValue, NewSubset, RemoveData};
pub use component::{Component, ComponentKind};
pub use coordinates::{AffineCoordinates, Coordinates, IdentityCoordinates};
pub use data::Data;
pub use derived::IndexedData;
pub use link::{functions, link_fn, ComponentLink, Link, LinkFn, LinkHelper, MultiLinkFn};
pub use link_editor::{EditorLink, LinkEditorState, LinkFunctionSpec};
pub use roi::{CircularRoi, PolygonalRoi, RectangularRoi, Roi, XRangeRoi, YRangeRoi};
pub use stats::{compute_histogram, compute_statistic, Statistic};
pub use subset::{Subset, SubsetStyle};
pub use subset_state::{CombineMode, Comparison, SubsetState};
pub use tabular::{read_csv, read_csv_with, CsvConfig};
pub use view::{View, ViewElem};

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Incompatible attribute: '{label}' ({component}) cannot be derived on {data}")]
    IncompatibleAttribute {
        component: ComponentId,
        label: String,
        data: DataId,
    },

    #[error("Shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Invalid mutation: {0}")]
    InvalidMutation(String),

    #[error("Invalid view: {0}")]
    InvalidView(String),

    #[error("Invalid link: {0}")]
    InvalidLink(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown data {0}")]
    UnknownData(DataId),

    #[error("Unknown subset {0}")]
    UnknownSubset(SubsetId),

    #[error("Unknown link {0}")]
    UnknownLink(LinkId),

    #[error("Unknown component {0}")]
    UnknownComponent(String),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("CSV parsing error: {0}")]
    Csv(String),
}

impl From<csv::Error> for DataError {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::Io(io_err) => DataError::Io(std::io::Error::new(io_err.kind(), error.to_string())),
            _ => DataError::Csv(error.to_string()),
        }
    }
}

impl DataError {
    /// Whether this error means "this attribute is not available here", the
    /// condition viewers use to disable a layer instead of failing.
    pub fn is_incompatible_attribute(&self) -> bool {
        matches!(self, DataError::IncompatibleAttribute { .. })
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
