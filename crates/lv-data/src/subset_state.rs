//! Composable boolean predicates over the samples of a dataset

use std::ops::{BitAnd, BitOr, BitXor, Not};
use std::sync::Arc;

use lv_core::{ComponentId, DataId};
use ndarray::{ArrayD, IxDyn, Zip};
use serde::{Deserialize, Serialize};

use crate::collection::DataCollection;
use crate::data::Data;
use crate::roi::Roi;
use crate::view::{self, View, ViewElem};
use crate::{DataError, Result};

/// Comparison used by [`SubsetState::Inequality`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl Comparison {
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Less => lhs < rhs,
            Comparison::LessEqual => lhs <= rhs,
            Comparison::Greater => lhs > rhs,
            Comparison::GreaterEqual => lhs >= rhs,
            Comparison::Equal => lhs == rhs,
            Comparison::NotEqual => lhs != rhs,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Less => "<",
            Comparison::LessEqual => "<=",
            Comparison::Greater => ">",
            Comparison::GreaterEqual => ">=",
            Comparison::Equal => "==",
            Comparison::NotEqual => "!=",
        }
    }
}

/// How a new selection is merged into an existing subset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CombineMode {
    #[default]
    Replace,
    And,
    Or,
    Xor,
    /// Keep what is selected now, minus the new selection
    AndNot,
}

impl CombineMode {
    pub fn combine(self, current: &SubsetState, new: SubsetState) -> SubsetState {
        match self {
            CombineMode::Replace => new,
            CombineMode::And => current & new,
            CombineMode::Or => current | new,
            CombineMode::Xor => current ^ new,
            CombineMode::AndNot => current & !new,
        }
    }
}

/// Immutable selection predicate.
///
/// States only refer to components by id, so a state built on one dataset
/// can be evaluated on any dataset where those ids resolve.
#[derive(Debug, Clone)]
pub enum SubsetState {
    Everything,
    Nothing,
    /// `lo <= att <= hi`, or strict bounds when not inclusive
    Range {
        att: ComponentId,
        lo: f64,
        hi: f64,
        inclusive: bool,
    },
    Inequality {
        att: ComponentId,
        op: Comparison,
        value: f64,
    },
    /// Categorical component takes one of the listed codes
    Categorical {
        att: ComponentId,
        codes: Arc<Vec<f64>>,
    },
    /// Explicit mask with the shape of `data`
    Mask {
        data: DataId,
        mask: Arc<ArrayD<bool>>,
    },
    /// Points whose `(xatt, yatt)` fall inside the region
    Roi {
        xatt: ComponentId,
        yatt: ComponentId,
        roi: Arc<dyn Roi>,
    },
    /// Sub-region of the grid of `data`
    Slice {
        data: DataId,
        slices: Arc<Vec<ViewElem>>,
    },
    And(Arc<SubsetState>, Arc<SubsetState>),
    Or(Arc<SubsetState>, Arc<SubsetState>),
    Xor(Arc<SubsetState>, Arc<SubsetState>),
    Not(Arc<SubsetState>),
}

impl SubsetState {
    /// Inclusive range
    pub fn range(att: ComponentId, lo: f64, hi: f64) -> Self {
        Self::range_with(att, lo, hi, true)
    }

    pub fn range_with(att: ComponentId, lo: f64, hi: f64, inclusive: bool) -> Self {
        SubsetState::Range {
            att,
            lo: lo.min(hi),
            hi: lo.max(hi),
            inclusive,
        }
    }

    pub fn inequality(att: ComponentId, op: Comparison, value: f64) -> Self {
        SubsetState::Inequality { att, op, value }
    }

    pub fn categories(att: ComponentId, codes: Vec<f64>) -> Self {
        SubsetState::Categorical {
            att,
            codes: Arc::new(codes),
        }
    }

    /// Mask state owned by `data`. The mask must have the data's shape.
    pub fn mask(data: &Data, mask: ArrayD<bool>) -> Result<Self> {
        if mask.shape() != data.shape() {
            return Err(DataError::ShapeMismatch {
                expected: data.shape().to_vec(),
                found: mask.shape().to_vec(),
            });
        }
        Ok(SubsetState::Mask {
            data: data.id(),
            mask: Arc::new(mask),
        })
    }

    pub fn roi(xatt: ComponentId, yatt: ComponentId, roi: impl Roi + 'static) -> Self {
        SubsetState::Roi {
            xatt,
            yatt,
            roi: Arc::new(roi),
        }
    }

    /// Slice state over the grid of `data`
    pub fn slice(data: &Data, slices: Vec<ViewElem>) -> Result<Self> {
        View::new(slices.clone()).validate(data.shape())?;
        Ok(SubsetState::Slice {
            data: data.id(),
            slices: Arc::new(slices),
        })
    }

    /// Every component id the state reads, without duplicates
    pub fn attributes(&self) -> Vec<ComponentId> {
        let mut out = Vec::new();
        self.collect_attributes(&mut out);
        out
    }

    fn collect_attributes(&self, out: &mut Vec<ComponentId>) {
        let mut push = |cid: ComponentId| {
            if !out.contains(&cid) {
                out.push(cid);
            }
        };
        match self {
            SubsetState::Range { att, .. }
            | SubsetState::Inequality { att, .. }
            | SubsetState::Categorical { att, .. } => push(*att),
            SubsetState::Roi { xatt, yatt, .. } => {
                push(*xatt);
                push(*yatt);
            }
            SubsetState::And(a, b) | SubsetState::Or(a, b) | SubsetState::Xor(a, b) => {
                a.collect_attributes(out);
                b.collect_attributes(out);
            }
            SubsetState::Not(a) => a.collect_attributes(out),
            SubsetState::Everything
            | SubsetState::Nothing
            | SubsetState::Mask { .. }
            | SubsetState::Slice { .. } => {}
        }
    }

    /// Evaluate on `data`. The result has the shape of `data[view]`.
    pub fn to_mask(&self, collection: &DataCollection, data: DataId, view: Option<&View>) -> Result<ArrayD<bool>> {
        let target = collection.data(data)?;
        if let Some(view) = view {
            view.validate(target.shape())?;
        }
        let shape = view::view_shape(target.shape(), view);

        match self {
            SubsetState::Everything => Ok(ArrayD::from_elem(IxDyn(&shape), true)),
            SubsetState::Nothing => Ok(ArrayD::from_elem(IxDyn(&shape), false)),
            SubsetState::Range { att, lo, hi, inclusive } => {
                let values = collection.get_data(data, *att, view)?;
                let (lo, hi) = (*lo, *hi);
                Ok(if *inclusive {
                    values.mapv(|v| lo <= v && v <= hi)
                } else {
                    values.mapv(|v| lo < v && v < hi)
                })
            }
            SubsetState::Inequality { att, op, value } => {
                let values = collection.get_data(data, *att, view)?;
                Ok(values.mapv(|v| op.apply(v, *value)))
            }
            SubsetState::Categorical { att, codes } => {
                let values = collection.get_data(data, *att, view)?;
                Ok(values.mapv(|v| codes.contains(&v)))
            }
            SubsetState::Mask { data: owner, mask } => {
                collection.check_pixel_aligned(*owner, data)?;
                view::read(mask, view)
            }
            SubsetState::Roi { xatt, yatt, roi } => {
                let x = collection.get_data(data, *xatt, view)?;
                let y = collection.get_data(data, *yatt, view)?;
                if !roi.defined() {
                    return Ok(ArrayD::from_elem(IxDyn(&shape), false));
                }
                if x.shape() != y.shape() {
                    return Err(DataError::ShapeMismatch {
                        expected: x.shape().to_vec(),
                        found: y.shape().to_vec(),
                    });
                }
                Ok(roi.contains_array(&x, &y))
            }
            SubsetState::Slice { data: owner, slices } => {
                collection.check_pixel_aligned(*owner, data)?;
                let owner_shape = collection.data(*owner)?.shape().to_vec();
                let mut full = ArrayD::from_elem(IxDyn(&owner_shape), false);
                View::new(slices.to_vec()).apply_mut(&mut full)?.fill(true);
                view::read(&full, view)
            }
            SubsetState::And(a, b) => combine(
                a.to_mask(collection, data, view)?,
                b.to_mask(collection, data, view)?,
                |x, y| x && y,
            ),
            SubsetState::Or(a, b) => combine(
                a.to_mask(collection, data, view)?,
                b.to_mask(collection, data, view)?,
                |x, y| x || y,
            ),
            SubsetState::Xor(a, b) => combine(
                a.to_mask(collection, data, view)?,
                b.to_mask(collection, data, view)?,
                |x, y| x != y,
            ),
            SubsetState::Not(a) => Ok(a.to_mask(collection, data, view)?.mapv(|x| !x)),
        }
    }

    /// Flat indices (row-major) of selected samples on `data`
    pub fn to_index_list(&self, collection: &DataCollection, data: DataId) -> Result<Vec<usize>> {
        let mask = self.to_mask(collection, data, None)?;
        Ok(mask
            .iter()
            .enumerate()
            .filter_map(|(i, selected)| selected.then_some(i))
            .collect())
    }
}

fn combine(a: ArrayD<bool>, b: ArrayD<bool>, f: impl Fn(bool, bool) -> bool) -> Result<ArrayD<bool>> {
    if a.shape() != b.shape() {
        return Err(DataError::ShapeMismatch {
            expected: a.shape().to_vec(),
            found: b.shape().to_vec(),
        });
    }
    Ok(Zip::from(&a).and(&b).map_collect(|&x, &y| f(x, y)))
}

impl BitAnd for SubsetState {
    type Output = SubsetState;

    fn bitand(self, rhs: SubsetState) -> SubsetState {
        SubsetState::And(Arc::new(self), Arc::new(rhs))
    }
}

impl BitOr for SubsetState {
    type Output = SubsetState;

    fn bitor(self, rhs: SubsetState) -> SubsetState {
        SubsetState::Or(Arc::new(self), Arc::new(rhs))
    }
}

impl BitXor for SubsetState {
    type Output = SubsetState;

    fn bitxor(self, rhs: SubsetState) -> SubsetState {
        SubsetState::Xor(Arc::new(self), Arc::new(rhs))
    }
}

impl Not for SubsetState {
    type Output = SubsetState;

    fn not(self) -> SubsetState {
        SubsetState::Not(Arc::new(self))
    }
}

impl BitAnd<SubsetState> for &SubsetState {
    type Output = SubsetState;

    fn bitand(self, rhs: SubsetState) -> SubsetState {
        self.clone() & rhs
    }
}

impl BitOr<SubsetState> for &SubsetState {
    type Output = SubsetState;

    fn bitor(self, rhs: SubsetState) -> SubsetState {
        self.clone() | rhs
    }
}

impl BitXor<SubsetState> for &SubsetState {
    type Output = SubsetState;

    fn bitxor(self, rhs: SubsetState) -> SubsetState {
        self.clone() ^ rhs
    }
}

impl Not for &SubsetState {
    type Output = SubsetState;

    fn not(self) -> SubsetState {
        !self.clone()
    }
}
