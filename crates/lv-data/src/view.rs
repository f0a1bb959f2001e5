//! Partial reads of n-dimensional arrays

use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Axis, Slice};
use serde::{Deserialize, Serialize};

use crate::{DataError, Result};

/// Selection along a single dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewElem {
    /// Fix the dimension at one index. The dimension is dropped from the result.
    Index(usize),
    /// Keep `start..end` with a stride. `end = None` runs to the end of the axis.
    Range {
        start: usize,
        end: Option<usize>,
        step: usize,
    },
}

impl ViewElem {
    /// The whole axis
    pub const ALL: ViewElem = ViewElem::Range {
        start: 0,
        end: None,
        step: 1,
    };

    pub fn range(start: usize, end: usize) -> Self {
        ViewElem::Range {
            start,
            end: Some(end),
            step: 1,
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, ViewElem::Index(_))
    }

    /// Clamp to an axis of length `len`, numpy style
    fn to_slice(self, len: usize) -> Slice {
        match self {
            ViewElem::Index(i) => Slice::new(i as isize, Some(i as isize + 1), 1),
            ViewElem::Range { start, end, step } => {
                let start = start.min(len);
                let end = end.map_or(len, |e| e.min(len)).max(start);
                Slice::new(start as isize, Some(end as isize), step as isize)
            }
        }
    }

    /// Number of elements kept along an axis of length `len`, `None` for indices
    fn kept(self, len: usize) -> Option<usize> {
        match self {
            ViewElem::Index(_) => None,
            ViewElem::Range { start, end, step } => {
                let start = start.min(len);
                let end = end.map_or(len, |e| e.min(len)).max(start);
                Some((end - start).div_ceil(step.max(1)))
            }
        }
    }
}

/// One [`ViewElem`] per dimension of the array being read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    elems: Vec<ViewElem>,
}

impl View {
    pub fn new(elems: Vec<ViewElem>) -> Self {
        Self { elems }
    }

    /// A view selecting everything in `ndim` dimensions
    pub fn full(ndim: usize) -> Self {
        Self {
            elems: vec![ViewElem::ALL; ndim],
        }
    }

    pub fn elems(&self) -> &[ViewElem] {
        &self.elems
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Check the view can be applied to an array of `shape`
    pub fn validate(&self, shape: &[usize]) -> Result<()> {
        if self.elems.len() != shape.len() {
            return Err(DataError::InvalidView(format!(
                "view has {} elements but data has {} dimensions",
                self.elems.len(),
                shape.len()
            )));
        }
        for (axis, (elem, &len)) in self.elems.iter().zip(shape).enumerate() {
            match *elem {
                ViewElem::Index(i) if i >= len => {
                    return Err(DataError::InvalidView(format!(
                        "index {} out of bounds for axis {} of length {}",
                        i, axis, len
                    )));
                }
                ViewElem::Range { step: 0, .. } => {
                    return Err(DataError::InvalidView(format!("zero step on axis {}", axis)));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Shape of `array[view]` for an array of `shape`
    pub fn result_shape(&self, shape: &[usize]) -> Vec<usize> {
        self.elems
            .iter()
            .zip(shape)
            .filter_map(|(elem, &len)| elem.kept(len))
            .collect()
    }

    /// Read-only view of `array` restricted to this selection
    pub fn apply<'a, T>(&self, array: &'a ArrayD<T>) -> Result<ArrayViewD<'a, T>> {
        self.validate(array.shape())?;
        let mut view = array.view();
        for (axis, elem) in self.elems.iter().enumerate() {
            let len = view.len_of(Axis(axis));
            view.slice_axis_inplace(Axis(axis), elem.to_slice(len));
        }
        for axis in (0..self.elems.len()).rev() {
            if self.elems[axis].is_index() {
                view = view.index_axis_move(Axis(axis), 0);
            }
        }
        Ok(view)
    }

    /// Mutable counterpart of [`View::apply`]
    pub fn apply_mut<'a, T>(&self, array: &'a mut ArrayD<T>) -> Result<ArrayViewMutD<'a, T>> {
        self.validate(array.shape())?;
        let mut view = array.view_mut();
        for (axis, elem) in self.elems.iter().enumerate() {
            let len = view.len_of(Axis(axis));
            view.slice_axis_inplace(Axis(axis), elem.to_slice(len));
        }
        for axis in (0..self.elems.len()).rev() {
            if self.elems[axis].is_index() {
                view = view.index_axis_move(Axis(axis), 0);
            }
        }
        Ok(view)
    }
}

/// Shape of `array[view]`, the whole shape when there is no view
pub fn view_shape(shape: &[usize], view: Option<&View>) -> Vec<usize> {
    match view {
        Some(view) => view.result_shape(shape),
        None => shape.to_vec(),
    }
}

/// Apply an optional view and take ownership of the result
pub fn read<T: Clone>(array: &ArrayD<T>, view: Option<&View>) -> Result<ArrayD<T>> {
    match view {
        Some(view) => Ok(view.apply(array)?.to_owned()),
        None => Ok(array.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn cube() -> ArrayD<f64> {
        ArrayD::from_shape_fn(IxDyn(&[3, 4, 2]), |idx| (idx[0] * 100 + idx[1] * 10 + idx[2]) as f64)
    }

    #[test]
    fn test_index_collapses_dimension() {
        let array = cube();
        let view = View::new(vec![ViewElem::Index(1), ViewElem::ALL, ViewElem::Index(0)]);

        let result = view.apply(&array).unwrap();
        assert_eq!(result.shape(), &[4]);
        assert_eq!(result.iter().copied().collect::<Vec<_>>(), vec![100.0, 110.0, 120.0, 130.0]);
        assert_eq!(view.result_shape(array.shape()), vec![4]);
    }

    #[test]
    fn test_strided_range() {
        let array = cube();
        let view = View::new(vec![
            ViewElem::Range { start: 0, end: None, step: 2 },
            ViewElem::range(1, 3),
            ViewElem::ALL,
        ]);

        let result = view.apply(&array).unwrap();
        assert_eq!(result.shape(), &[2, 2, 2]);
        assert_eq!(view.result_shape(array.shape()), vec![2, 2, 2]);
        assert_eq!(result[[1, 0, 1]], 211.0);
    }

    #[test]
    fn test_out_of_bounds_index() {
        let array = cube();
        let view = View::new(vec![ViewElem::Index(3), ViewElem::ALL, ViewElem::ALL]);
        assert!(matches!(view.apply(&array), Err(DataError::InvalidView(_))));
    }

    #[test]
    fn test_wrong_dimensionality() {
        let array = cube();
        let view = View::full(2);
        assert!(view.apply(&array).is_err());
    }

    #[test]
    fn test_apply_mut_fills_region() {
        let mut mask = ArrayD::from_elem(IxDyn(&[3, 4]), false);
        let view = View::new(vec![ViewElem::Index(2), ViewElem::range(1, 3)]);
        view.apply_mut(&mut mask).unwrap().fill(true);

        assert_eq!(mask.iter().filter(|m| **m).count(), 2);
        assert!(mask[[2, 1]] && mask[[2, 2]]);
    }
}
