//! Array-valued fields stored in a dataset

use std::sync::Arc;

use ndarray::{Array1, ArrayD};
use serde::{Deserialize, Serialize};

use crate::{DataError, Result};

/// What the values of a component represent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Numerical,
    /// Values are integer codes into an ordered category list
    Categorical,
    /// Values are milliseconds since the Unix epoch
    DateTime,
}

/// The values behind one component id
#[derive(Debug, Clone)]
pub struct Component {
    kind: ComponentKind,
    values: ArrayD<f64>,
    categories: Option<Arc<Vec<String>>>,
    units: Option<String>,
}

impl Component {
    /// Numerical component from an n-dimensional array
    pub fn numerical(values: ArrayD<f64>) -> Self {
        Self {
            kind: ComponentKind::Numerical,
            values,
            categories: None,
            units: None,
        }
    }

    /// One-dimensional numerical component
    pub fn from_vec(values: Vec<f64>) -> Self {
        Self::numerical(Array1::from(values).into_dyn())
    }

    /// One-dimensional categorical component. Categories are sorted and each
    /// value is stored as the index of its category.
    pub fn categorical<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut categories: Vec<String> = labels.iter().map(|l| l.as_ref().to_string()).collect();
        categories.sort();
        categories.dedup();

        let codes: Vec<f64> = labels
            .iter()
            .map(|l| {
                categories
                    .binary_search_by(|c| c.as_str().cmp(l.as_ref()))
                    .map(|i| i as f64)
                    .unwrap_or(f64::NAN)
            })
            .collect();

        let mut component = Self::from_vec(codes);
        component.kind = ComponentKind::Categorical;
        component.categories = Some(Arc::new(categories));
        component
    }

    /// Categorical component from precomputed codes
    pub fn categorical_codes(codes: ArrayD<f64>, categories: Vec<String>) -> Result<Self> {
        let max = categories.len() as f64;
        if codes.iter().any(|c| !c.is_nan() && (*c < 0.0 || *c >= max || c.fract() != 0.0)) {
            return Err(DataError::InvalidArgument(format!(
                "category codes must be integers in 0..{}",
                categories.len()
            )));
        }
        Ok(Self {
            kind: ComponentKind::Categorical,
            values: codes,
            categories: Some(Arc::new(categories)),
            units: None,
        })
    }

    /// Date/time component from epoch milliseconds
    pub fn datetime(millis: ArrayD<f64>) -> Self {
        Self {
            kind: ComponentKind::DateTime,
            values: millis,
            categories: None,
            units: None,
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn categories(&self) -> Option<&[String]> {
        self.categories.as_ref().map(|c| c.as_slice())
    }

    /// Code of a category label, if this component is categorical and has it
    pub fn category_code(&self, label: &str) -> Option<f64> {
        self.categories()?
            .iter()
            .position(|c| c == label)
            .map(|i| i as f64)
    }

    /// Replace the values keeping kind and categories. The shape must not change.
    pub fn set_values(&mut self, values: ArrayD<f64>) -> Result<()> {
        if values.shape() != self.values.shape() {
            return Err(DataError::ShapeMismatch {
                expected: self.values.shape().to_vec(),
                found: values.shape().to_vec(),
            });
        }
        self.values = values;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_categorical_codes_are_sorted() {
        let component = Component::categorical(&["b", "a", "c", "a"]);

        assert_eq!(component.kind(), ComponentKind::Categorical);
        assert_eq!(component.categories().unwrap(), &["a", "b", "c"]);
        assert_eq!(component.values().iter().copied().collect::<Vec<_>>(), vec![1.0, 0.0, 2.0, 0.0]);
        assert_eq!(component.category_code("c"), Some(2.0));
        assert_eq!(component.category_code("z"), None);
    }

    #[test]
    fn test_invalid_codes_rejected() {
        let codes = ArrayD::from_shape_vec(IxDyn(&[2]), vec![0.0, 5.0]).unwrap();
        assert!(Component::categorical_codes(codes, vec!["a".into()]).is_err());
    }

    #[test]
    fn test_set_values_keeps_shape() {
        let mut component = Component::from_vec(vec![1.0, 2.0]);
        let wrong = ArrayD::zeros(IxDyn(&[3]));
        assert!(matches!(component.set_values(wrong), Err(DataError::ShapeMismatch { .. })));
    }
}
