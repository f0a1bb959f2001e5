//! Reductions and histograms over (possibly linked) component values

use lv_core::{ComponentId, DataId};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

use crate::collection::DataCollection;
use crate::subset_state::SubsetState;
use crate::view::View;
use crate::{DataError, Result};

/// Reduction applied by [`compute_statistic`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Statistic {
    Minimum,
    Maximum,
    Mean,
    Median,
    Sum,
    /// Percentile in `[0, 100]`, linearly interpolated
    Percentile(f64),
}

impl Statistic {
    /// Reduce a set of samples. Empty input gives NaN.
    pub fn reduce(self, values: &mut [f64]) -> f64 {
        if values.is_empty() {
            return f64::NAN;
        }
        match self {
            Statistic::Minimum => values.iter().copied().fold(f64::INFINITY, f64::min),
            Statistic::Maximum => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Statistic::Sum => values.iter().sum(),
            Statistic::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Statistic::Median => percentile(values, 50.0),
            Statistic::Percentile(p) => percentile(values, p),
        }
    }
}

fn percentile(values: &mut [f64], p: f64) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let rank = p / 100.0 * (values.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    values[lower] * (1.0 - weight) + values[upper] * weight
}

/// Reduce `cid` on `data` over the given axes.
///
/// `axis` lists the axes to collapse; `None` collapses everything into a
/// zero-dimensional result. Samples outside `subset_state`, NaNs and, when
/// `finite` is set, infinities are ignored.
#[allow(clippy::too_many_arguments)]
pub fn compute_statistic(
    collection: &DataCollection,
    data: DataId,
    statistic: Statistic,
    cid: ComponentId,
    subset_state: Option<&SubsetState>,
    axis: Option<&[usize]>,
    finite: bool,
    view: Option<&View>,
) -> Result<ArrayD<f64>> {
    if let Statistic::Percentile(p) = statistic {
        if !(0.0..=100.0).contains(&p) {
            return Err(DataError::InvalidArgument(format!("percentile {} outside [0, 100]", p)));
        }
    }

    let values = collection.get_data(data, cid, view)?;
    let mask = match subset_state {
        Some(state) => Some(state.to_mask(collection, data, view)?),
        None => None,
    };

    let ndim = values.ndim();
    let reduced: Vec<usize> = match axis {
        Some(axes) => {
            if let Some(bad) = axes.iter().find(|a| **a >= ndim) {
                return Err(DataError::InvalidArgument(format!(
                    "axis {} out of range for {} dimensions",
                    bad, ndim
                )));
            }
            let mut axes = axes.to_vec();
            axes.sort_unstable();
            axes.dedup();
            axes
        }
        None => (0..ndim).collect(),
    };
    let kept: Vec<usize> = (0..ndim).filter(|a| !reduced.contains(a)).collect();

    // Kept axes first: the logical iteration order then walks one output
    // element's samples contiguously.
    let order: Vec<usize> = kept.iter().chain(reduced.iter()).copied().collect();
    let out_shape: Vec<usize> = kept.iter().map(|a| values.shape()[*a]).collect();
    let group: usize = reduced.iter().map(|a| values.shape()[*a]).product();

    let samples: Vec<f64> = values.permuted_axes(IxDyn(&order)).iter().copied().collect();
    let selected: Vec<bool> = match mask {
        Some(mask) => mask.permuted_axes(IxDyn(&order)).iter().copied().collect(),
        None => vec![true; samples.len()],
    };

    let out_len: usize = out_shape.iter().product();
    let mut out = Vec::with_capacity(out_len);
    let mut buffer = Vec::with_capacity(group);
    for i in 0..out_len {
        buffer.clear();
        let range = i * group..(i + 1) * group;
        for (&v, &keep) in samples[range.clone()].iter().zip(&selected[range]) {
            if keep && !v.is_nan() && (!finite || v.is_finite()) {
                buffer.push(v);
            }
        }
        out.push(statistic.reduce(&mut buffer));
    }

    tracing::trace!("{:?} of {} over axes {:?}", statistic, cid, reduced);
    Ok(ArrayD::from_shape_vec(IxDyn(&out_shape), out)?)
}

fn bin_index(v: f64, lo: f64, hi: f64, bins: usize) -> Option<usize> {
    if v.is_nan() || v < lo || v > hi {
        return None;
    }
    let index = ((v - lo) / (hi - lo) * bins as f64).floor() as usize;
    Some(index.min(bins - 1))
}

/// 1-D or 2-D histogram of components on `data`.
///
/// `range`, `bins` and `log` give one entry per component. The upper edge of
/// each range is inclusive. Log axes bin `log10` of the values and drop
/// non-positive samples.
pub fn compute_histogram(
    collection: &DataCollection,
    data: DataId,
    cids: &[ComponentId],
    range: &[(f64, f64)],
    bins: &[usize],
    log: &[bool],
    subset_state: Option<&SubsetState>,
) -> Result<ArrayD<f64>> {
    let n = cids.len();
    if n == 0 || n > 2 {
        return Err(DataError::InvalidArgument(format!("histograms take 1 or 2 components, got {}", n)));
    }
    if range.len() != n || bins.len() != n || log.len() != n {
        return Err(DataError::InvalidArgument(
            "range, bins and log need one entry per component".to_string(),
        ));
    }

    let mut edges = Vec::with_capacity(n);
    for i in 0..n {
        let (mut lo, mut hi) = range[i];
        if bins[i] == 0 {
            return Err(DataError::InvalidArgument("bin count must be positive".to_string()));
        }
        if log[i] {
            if lo <= 0.0 || hi <= 0.0 {
                return Err(DataError::InvalidArgument("log bins need a positive range".to_string()));
            }
            lo = lo.log10();
            hi = hi.log10();
        }
        if !(lo < hi) {
            return Err(DataError::InvalidArgument(format!("empty histogram range {:?}", range[i])));
        }
        edges.push((lo, hi));
    }

    let columns: Vec<ArrayD<f64>> = cids
        .iter()
        .map(|cid| collection.get_data(data, *cid, None))
        .collect::<Result<_>>()?;
    let mask = match subset_state {
        Some(state) => Some(state.to_mask(collection, data, None)?),
        None => None,
    };

    let mut counts = ArrayD::<f64>::zeros(IxDyn(bins));
    let flat: Vec<Vec<f64>> = columns.iter().map(|c| c.iter().copied().collect()).collect();
    let selected: Option<Vec<bool>> = mask.map(|m| m.iter().copied().collect());

    'samples: for j in 0..flat[0].len() {
        if let Some(selected) = &selected {
            if !selected[j] {
                continue;
            }
        }
        let mut index = Vec::with_capacity(n);
        for i in 0..n {
            let mut v = flat[i][j];
            if log[i] {
                if v <= 0.0 {
                    continue 'samples;
                }
                v = v.log10();
            }
            match bin_index(v, edges[i].0, edges[i].1, bins[i]) {
                Some(b) => index.push(b),
                None => continue 'samples,
            }
        }
        counts[IxDyn(&index)] += 1.0;
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Data;
    use crate::Component;
    use ndarray::{arr1, arr2, Array};

    fn cube() -> (DataCollection, DataId, ComponentId) {
        let mut data = Data::new("cube", vec![2, 3]);
        let values = Array::from_shape_vec(IxDyn(&[2, 3]), vec![1.0, 2.0, 3.0, 4.0, f64::NAN, f64::INFINITY]).unwrap();
        let cid = data.add_component("flux", Component::numerical(values)).unwrap();
        let mut dc = DataCollection::new();
        let id = dc.append(data).unwrap();
        (dc, id, cid)
    }

    #[test]
    fn test_scalar_statistics() {
        let (dc, id, cid) = cube();
        let stat = |s| compute_statistic(&dc, id, s, cid, None, None, true, None).unwrap()[IxDyn(&[])];

        assert_eq!(stat(Statistic::Minimum), 1.0);
        assert_eq!(stat(Statistic::Maximum), 4.0);
        assert_eq!(stat(Statistic::Sum), 10.0);
        assert_eq!(stat(Statistic::Mean), 2.5);
        assert_eq!(stat(Statistic::Median), 2.5);
        assert_eq!(stat(Statistic::Percentile(0.0)), 1.0);
    }

    #[test]
    fn test_infinite_kept_when_not_finite() {
        let (dc, id, cid) = cube();
        let max = compute_statistic(&dc, id, Statistic::Maximum, cid, None, None, false, None).unwrap();
        assert_eq!(max[IxDyn(&[])], f64::INFINITY);
    }

    #[test]
    fn test_profile_along_axis() {
        let (dc, id, cid) = cube();
        let columns = compute_statistic(&dc, id, Statistic::Sum, cid, None, Some(&[0]), true, None).unwrap();
        assert_eq!(columns, arr1(&[5.0, 2.0, 3.0]).into_dyn());

        let rows = compute_statistic(&dc, id, Statistic::Sum, cid, None, Some(&[1]), true, None).unwrap();
        assert_eq!(rows, arr1(&[6.0, 4.0]).into_dyn());
    }

    #[test]
    fn test_subset_restricts_samples() {
        let (dc, id, cid) = cube();
        let state = SubsetState::range(cid, 2.0, 3.0);
        let mean = compute_statistic(&dc, id, Statistic::Mean, cid, Some(&state), None, true, None).unwrap();
        assert_eq!(mean[IxDyn(&[])], 2.5);

        let empty = SubsetState::range(cid, 100.0, 200.0);
        let sum = compute_statistic(&dc, id, Statistic::Sum, cid, Some(&empty), None, true, None).unwrap();
        assert!(sum[IxDyn(&[])].is_nan());
    }

    #[test]
    fn test_bad_arguments() {
        let (dc, id, cid) = cube();
        let pct = compute_statistic(&dc, id, Statistic::Percentile(120.0), cid, None, None, true, None);
        assert!(matches!(pct, Err(DataError::InvalidArgument(_))));
        let axis = compute_statistic(&dc, id, Statistic::Sum, cid, None, Some(&[2]), true, None);
        assert!(matches!(axis, Err(DataError::InvalidArgument(_))));
    }

    #[test]
    fn test_histogram_upper_edge_inclusive() {
        let data = Data::from_columns("t", vec![("x", vec![0.0, 0.5, 1.0, 2.0, f64::NAN])]).unwrap();
        let x = data.id_for("x").unwrap();
        let mut dc = DataCollection::new();
        let id = dc.append(data).unwrap();

        let hist = compute_histogram(&dc, id, &[x], &[(0.0, 1.0)], &[2], &[false], None).unwrap();
        assert_eq!(hist, arr1(&[1.0, 2.0]).into_dyn());
    }

    #[test]
    fn test_histogram_2d_with_subset() {
        let data = Data::from_columns(
            "t",
            vec![("x", vec![0.1, 0.9, 0.9, 0.4]), ("y", vec![0.1, 0.1, 0.9, 0.6])],
        )
        .unwrap();
        let x = data.id_for("x").unwrap();
        let y = data.id_for("y").unwrap();
        let mut dc = DataCollection::new();
        let id = dc.append(data).unwrap();

        let all = compute_histogram(&dc, id, &[x, y], &[(0.0, 1.0), (0.0, 1.0)], &[2, 2], &[false, false], None)
            .unwrap();
        assert_eq!(all, arr2(&[[1.0, 1.0], [1.0, 1.0]]).into_dyn());

        let state = SubsetState::range(x, 0.5, 1.0);
        let some = compute_histogram(
            &dc,
            id,
            &[x, y],
            &[(0.0, 1.0), (0.0, 1.0)],
            &[2, 2],
            &[false, false],
            Some(&state),
        )
        .unwrap();
        assert_eq!(some, arr2(&[[0.0, 0.0], [1.0, 1.0]]).into_dyn());
    }

    #[test]
    fn test_histogram_log_bins() {
        let data = Data::from_columns("t", vec![("x", vec![-1.0, 1.0, 5.0, 50.0, 100.0])]).unwrap();
        let x = data.id_for("x").unwrap();
        let mut dc = DataCollection::new();
        let id = dc.append(data).unwrap();

        let hist = compute_histogram(&dc, id, &[x], &[(1.0, 100.0)], &[2], &[true], None).unwrap();
        assert_eq!(hist, arr1(&[2.0, 2.0]).into_dyn());

        let bad = compute_histogram(&dc, id, &[x], &[(0.0, 100.0)], &[2], &[true], None);
        assert!(matches!(bad, Err(DataError::InvalidArgument(_))));
    }
}
