//! Datasets computed on the fly from another dataset

use std::sync::Arc;

use lv_core::messages::NumericalDataChanged;
use lv_core::{ComponentId, DataId, Hub, SubscriptionId};
use ndarray::ArrayD;

use crate::collection::DataCollection;
use crate::component::ComponentKind;
use crate::stats::{self, Statistic};
use crate::subset_state::SubsetState;
use crate::view::{View, ViewElem};
use crate::{DataError, Result};

/// A lower-dimensional view of a dataset obtained by fixing some of its
/// dimensions at an index.
///
/// `indices` has one entry per dimension of the original: `Some(i)` fixes the
/// dimension, `None` keeps it. The original's storage is never copied; every
/// request is translated and forwarded.
pub struct IndexedData {
    id: DataId,
    original: DataId,
    original_shape: Vec<usize>,
    indices: Vec<Option<usize>>,
    pixel_ids: Vec<ComponentId>,
    original_pixel_ids: Vec<ComponentId>,
    indices_state: SubsetState,
    hub: Arc<Hub>,
    subscription: Option<SubscriptionId>,
}

impl IndexedData {
    pub fn new(collection: &DataCollection, original: DataId, indices: Vec<Option<usize>>) -> Result<Self> {
        let data = collection.data(original)?;
        let original_shape = data.shape().to_vec();
        check_indices(&original_shape, &indices)?;

        let id = DataId::new();
        let original_pixel_ids: Vec<ComponentId> = indices
            .iter()
            .zip(data.pixel_component_ids())
            .filter(|(index, _)| index.is_none())
            .map(|(_, cid)| *cid)
            .collect();
        let pixel_ids = original_pixel_ids.iter().map(|_| ComponentId::new(id)).collect();
        let indices_state = SubsetState::slice(data, slices_for(&indices))?;

        tracing::debug!("Indexed view {:?} of '{}'", indices, data.label());
        Ok(Self {
            id,
            original,
            original_shape,
            indices,
            pixel_ids,
            original_pixel_ids,
            indices_state,
            hub: collection.hub().clone(),
            subscription: None,
        })
    }

    pub fn id(&self) -> DataId {
        self.id
    }

    pub fn original(&self) -> DataId {
        self.original
    }

    pub fn indices(&self) -> &[Option<usize>] {
        &self.indices
    }

    /// Sizes of the free dimensions of the original
    pub fn shape(&self) -> Vec<usize> {
        self.indices
            .iter()
            .zip(&self.original_shape)
            .filter(|(index, _)| index.is_none())
            .map(|(_, len)| *len)
            .collect()
    }

    pub fn ndim(&self) -> usize {
        self.pixel_ids.len()
    }

    /// Original label followed by the indexing, e.g. `cube[:,1,:]`
    pub fn label(&self, collection: &DataCollection) -> Result<String> {
        let parts: Vec<String> = self
            .indices
            .iter()
            .map(|index| index.map_or_else(|| ":".to_string(), |i| i.to_string()))
            .collect();
        Ok(format!("{}[{}]", collection.data(self.original)?.label(), parts.join(",")))
    }

    /// Pixel ids of this view, one per free dimension
    pub fn pixel_component_ids(&self) -> &[ComponentId] {
        &self.pixel_ids
    }

    pub fn main_components(&self, collection: &DataCollection) -> Result<Vec<ComponentId>> {
        Ok(collection.data(self.original)?.main_components())
    }

    pub fn get_kind(&self, collection: &DataCollection, cid: ComponentId) -> Option<ComponentKind> {
        if self.pixel_ids.contains(&cid) {
            return Some(ComponentKind::Numerical);
        }
        collection.data(self.original).ok()?.get_kind(cid)
    }

    /// Subset state selecting the slab this view covers on the original
    pub fn indices_state(&self) -> &SubsetState {
        &self.indices_state
    }

    fn map_pixel(&self, cid: ComponentId) -> ComponentId {
        match self.pixel_ids.iter().position(|p| *p == cid) {
            Some(axis) => self.original_pixel_ids[axis],
            None => cid,
        }
    }

    /// Translate a view over this dataset into one over the original by
    /// reinserting the fixed indices
    pub fn to_original_view(&self, view: Option<&View>) -> Result<View> {
        let free: Vec<ViewElem> = match view {
            Some(view) => {
                view.validate(&self.shape())?;
                view.elems().to_vec()
            }
            None => vec![ViewElem::ALL; self.ndim()],
        };
        let mut free = free.into_iter();
        let elems = self
            .indices
            .iter()
            .map(|index| match index {
                Some(i) => Ok(ViewElem::Index(*i)),
                None => free
                    .next()
                    .ok_or_else(|| DataError::InvalidView("view shorter than free dimensions".to_string())),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(View::new(elems))
    }

    pub fn get_data(&self, collection: &DataCollection, cid: ComponentId, view: Option<&View>) -> Result<ArrayD<f64>> {
        let original_view = self.to_original_view(view)?;
        collection.get_data(self.original, self.map_pixel(cid), Some(&original_view))
    }

    pub fn get_mask(&self, collection: &DataCollection, state: &SubsetState, view: Option<&View>) -> Result<ArrayD<bool>> {
        let original_view = self.to_original_view(view)?;
        collection.get_mask(self.original, state, Some(&original_view))
    }

    /// Move the fixed indices. The set of free dimensions cannot change.
    /// Returns whether any index moved.
    pub fn set_indices(&mut self, collection: &DataCollection, indices: Vec<Option<usize>>) -> Result<bool> {
        check_indices(&self.original_shape, &indices)?;
        let mut changed = false;
        for (before, after) in self.indices.iter().zip(&indices) {
            match (before, after) {
                (Some(a), Some(b)) => changed |= a != b,
                (None, None) => {}
                _ => {
                    return Err(DataError::InvalidMutation(
                        "the positions of free dimensions cannot change".to_string(),
                    ));
                }
            }
        }

        self.indices_state = SubsetState::slice(collection.data(self.original)?, slices_for(&indices))?;
        self.indices = indices;

        if changed {
            self.notify_changed();
        }
        Ok(changed)
    }

    /// Publish a value change of this view when anyone listens for one
    fn notify_changed(&self) -> bool {
        if self.hub.subscriber_count::<NumericalDataChanged>() == 0 {
            return false;
        }
        self.hub.publish(NumericalDataChanged { data: self.id });
        true
    }

    /// Republish value changes of the original as changes of this view
    pub fn watch_original(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        let hub = Arc::downgrade(&self.hub);
        let (own, original) = (self.id, self.original);
        let id = self.hub.subscribe::<NumericalDataChanged, _>(move |message| {
            if message.data != original {
                return;
            }
            if let Some(hub) = hub.upgrade() {
                hub.publish(NumericalDataChanged { data: own });
            }
        });
        self.subscription = Some(id);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn compute_statistic(
        &self,
        collection: &DataCollection,
        statistic: Statistic,
        cid: ComponentId,
        subset_state: Option<&SubsetState>,
        axis: Option<&[usize]>,
        finite: bool,
        view: Option<&View>,
    ) -> Result<ArrayD<f64>> {
        let original_view = self.to_original_view(view)?;
        stats::compute_statistic(
            collection,
            self.original,
            statistic,
            self.map_pixel(cid),
            subset_state,
            axis,
            finite,
            Some(&original_view),
        )
    }

    /// Histogram over the slab covered by this view
    pub fn compute_histogram(
        &self,
        collection: &DataCollection,
        cids: &[ComponentId],
        range: &[(f64, f64)],
        bins: &[usize],
        log: &[bool],
        subset_state: Option<&SubsetState>,
    ) -> Result<ArrayD<f64>> {
        let state = match subset_state {
            Some(state) => state & self.indices_state.clone(),
            None => self.indices_state.clone(),
        };
        let cids: Vec<ComponentId> = cids.iter().map(|cid| self.map_pixel(*cid)).collect();
        stats::compute_histogram(collection, self.original, &cids, range, bins, log, Some(&state))
    }
}

impl Drop for IndexedData {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.hub.unsubscribe(id);
        }
    }
}

impl std::fmt::Debug for IndexedData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedData")
            .field("id", &self.id)
            .field("original", &self.original)
            .field("indices", &self.indices)
            .finish()
    }
}

fn check_indices(shape: &[usize], indices: &[Option<usize>]) -> Result<()> {
    if indices.len() != shape.len() {
        return Err(DataError::ShapeMismatch {
            expected: vec![shape.len()],
            found: vec![indices.len()],
        });
    }
    for (axis, (index, len)) in indices.iter().zip(shape).enumerate() {
        if let Some(i) = index {
            if i >= len {
                return Err(DataError::InvalidView(format!(
                    "index {} out of bounds for axis {} of length {}",
                    i, axis, len
                )));
            }
        }
    }
    Ok(())
}

fn slices_for(indices: &[Option<usize>]) -> Vec<ViewElem> {
    indices
        .iter()
        .map(|index| index.map_or(ViewElem::ALL, ViewElem::Index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Data;
    use crate::Component;
    use lv_core::messages::DataAdded;
    use ndarray::{arr1, arr2, IxDyn};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cube() -> (DataCollection, DataId, ComponentId) {
        let mut data = Data::new("cube", vec![3, 4, 2]);
        let values = ArrayD::from_shape_fn(IxDyn(&[3, 4, 2]), |idx| (idx[0] * 100 + idx[1] * 10 + idx[2]) as f64);
        let flux = data.add_component("flux", Component::numerical(values)).unwrap();
        let mut dc = DataCollection::new();
        let id = dc.append(data).unwrap();
        (dc, id, flux)
    }

    #[test]
    fn test_shape_and_label() {
        let (dc, id, _) = cube();
        let view = IndexedData::new(&dc, id, vec![Some(1), None, Some(0)]).unwrap();

        assert_eq!(view.shape(), vec![4]);
        assert_eq!(view.ndim(), 1);
        assert_eq!(view.label(&dc).unwrap(), "cube[1,:,0]");
        assert_eq!(view.pixel_component_ids().len(), 1);
    }

    #[test]
    fn test_reads_match_original() {
        let (dc, id, flux) = cube();
        let view = IndexedData::new(&dc, id, vec![Some(1), None, Some(0)]).unwrap();

        let direct = View::new(vec![ViewElem::Index(1), ViewElem::ALL, ViewElem::Index(0)]);
        assert_eq!(view.get_data(&dc, flux, None).unwrap(), dc.get_data(id, flux, Some(&direct)).unwrap());

        let part = View::new(vec![ViewElem::range(1, 3)]);
        assert_eq!(view.get_data(&dc, flux, Some(&part)).unwrap(), arr1(&[110.0, 120.0]).into_dyn());
    }

    #[test]
    fn test_own_pixel_ids_map_to_original() {
        let (dc, id, _) = cube();
        let view = IndexedData::new(&dc, id, vec![None, Some(2), None]).unwrap();
        let y = view.pixel_component_ids()[1];

        let values = view.get_data(&dc, y, None).unwrap();
        assert_eq!(values, arr2(&[[0.0, 1.0], [0.0, 1.0], [0.0, 1.0]]).into_dyn());
        assert_eq!(view.get_kind(&dc, y), Some(ComponentKind::Numerical));
    }

    #[test]
    fn test_invalid_indices() {
        let (dc, id, _) = cube();
        assert!(matches!(
            IndexedData::new(&dc, id, vec![Some(1), None]),
            Err(DataError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            IndexedData::new(&dc, id, vec![Some(3), None, None]),
            Err(DataError::InvalidView(_))
        ));
    }

    #[test]
    fn test_set_indices() {
        let (dc, id, flux) = cube();
        let mut view = IndexedData::new(&dc, id, vec![Some(1), None, Some(0)]).unwrap();

        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        let own = view.id();
        dc.hub().subscribe::<NumericalDataChanged, _>(move |m| {
            if m.data == own {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert!(!view.set_indices(&dc, vec![Some(1), None, Some(0)]).unwrap());
        assert!(view.set_indices(&dc, vec![Some(2), None, Some(1)]).unwrap());
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(view.get_data(&dc, flux, None).unwrap(), arr1(&[201.0, 211.0, 221.0, 231.0]).into_dyn());

        let err = view.set_indices(&dc, vec![None, Some(1), Some(1)]);
        assert!(matches!(err, Err(DataError::InvalidMutation(_))));
    }

    #[test]
    fn test_change_notice_needs_value_listeners() {
        let (dc, id, _) = cube();
        let view = IndexedData::new(&dc, id, vec![Some(1), None, Some(0)]).unwrap();

        // listeners for other messages do not count
        dc.hub().subscribe::<DataAdded, _>(|_| {});
        assert!(dc.hub().has_subscribers());
        assert!(!view.notify_changed());

        dc.hub().subscribe::<NumericalDataChanged, _>(|_| {});
        assert!(view.notify_changed());
    }

    #[test]
    fn test_forwards_original_changes() {
        let (mut dc, id, flux) = cube();
        let mut view = IndexedData::new(&dc, id, vec![Some(0), None, None]).unwrap();
        view.watch_original();

        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        let own = view.id();
        dc.hub().subscribe::<NumericalDataChanged, _>(move |m| {
            if m.data == own {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        dc.update_values(id, flux, ArrayD::zeros(IxDyn(&[3, 4, 2]))).unwrap();
        assert_eq!(notified.load(Ordering::SeqCst), 1);

        let subscribers = dc.hub().subscriber_count::<NumericalDataChanged>();
        drop(view);
        assert_eq!(dc.hub().subscriber_count::<NumericalDataChanged>(), subscribers - 1);
    }

    #[test]
    fn test_statistics_and_histogram_restricted() {
        let (dc, id, flux) = cube();
        let view = IndexedData::new(&dc, id, vec![Some(1), None, Some(0)]).unwrap();

        let max = view
            .compute_statistic(&dc, Statistic::Maximum, flux, None, None, true, None)
            .unwrap();
        assert_eq!(max[IxDyn(&[])], 130.0);

        let hist = view
            .compute_histogram(&dc, &[flux], &[(0.0, 400.0)], &[4], &[false], None)
            .unwrap();
        assert_eq!(hist, arr1(&[0.0, 4.0, 0.0, 0.0]).into_dyn());

        let high = SubsetState::range(flux, 115.0, 400.0);
        let hist = view
            .compute_histogram(&dc, &[flux], &[(0.0, 400.0)], &[4], &[false], Some(&high))
            .unwrap();
        assert_eq!(hist, arr1(&[0.0, 2.0, 0.0, 0.0]).into_dyn());
    }
}
