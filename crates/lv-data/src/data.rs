//! Shaped containers of components

use std::sync::Arc;

use indexmap::IndexMap;
use lv_core::{ComponentId, DataId, SubsetId};
use ndarray::ArrayD;

use crate::component::{Component, ComponentKind};
use crate::coordinates::{self, Coordinates, IdentityCoordinates};
use crate::link::ComponentLink;
use crate::subset::Subset;
use crate::view::{self, View};
use crate::{DataError, Result};

/// What backs a component id inside a dataset
#[derive(Debug, Clone)]
enum Role {
    Native(Component),
    Pixel(usize),
    World(usize),
    /// Output of a link registered on this dataset
    Derived,
}

#[derive(Debug, Clone)]
struct Entry {
    label: String,
    role: Role,
}

/// A named, n-dimensional dataset.
///
/// Every native component shares `shape`. Pixel and world coordinate ids are
/// created with the dataset, one per dimension.
#[derive(Debug, Clone)]
pub struct Data {
    id: DataId,
    label: String,
    shape: Vec<usize>,
    entries: IndexMap<ComponentId, Entry>,
    pixel_ids: Vec<ComponentId>,
    world_ids: Vec<ComponentId>,
    coordinates: Arc<dyn Coordinates>,
    local_links: Vec<ComponentLink>,
    subsets: IndexMap<SubsetId, Subset>,
}

impl Data {
    /// Create an empty dataset of the given shape
    pub fn new(label: impl Into<String>, shape: Vec<usize>) -> Self {
        let id = DataId::new();
        let coordinates: Arc<dyn Coordinates> = Arc::new(IdentityCoordinates);
        let mut data = Self {
            id,
            label: label.into(),
            shape,
            entries: IndexMap::new(),
            pixel_ids: Vec::new(),
            world_ids: Vec::new(),
            coordinates,
            local_links: Vec::new(),
            subsets: IndexMap::new(),
        };
        data.create_coordinate_ids();
        data
    }

    /// Build a one-dimensional dataset from named columns
    pub fn from_columns<S: Into<String>>(label: impl Into<String>, columns: Vec<(S, Vec<f64>)>) -> Result<Self> {
        let len = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        let mut data = Self::new(label, vec![len]);
        for (name, values) in columns {
            data.add_component(name, Component::from_vec(values))?;
        }
        Ok(data)
    }

    /// Replace the coordinate system. World ids keep their identity.
    pub fn with_coordinates(mut self, coordinates: Arc<dyn Coordinates>) -> Self {
        self.coordinates = coordinates;
        for (axis, cid) in self.world_ids.iter().enumerate() {
            if let Some(entry) = self.entries.get_mut(cid) {
                entry.label = self.coordinates.world_axis_label(axis);
            }
        }
        self
    }

    fn create_coordinate_ids(&mut self) {
        let ndim = self.shape.len();
        for axis in 0..ndim {
            let cid = ComponentId::new(self.id);
            let label = pixel_label(axis, ndim);
            self.entries.insert(cid, Entry { label, role: Role::Pixel(axis) });
            self.pixel_ids.push(cid);
        }
        for axis in 0..ndim {
            let cid = ComponentId::new(self.id);
            let label = self.coordinates.world_axis_label(axis);
            self.entries.insert(cid, Entry { label, role: Role::World(axis) });
            self.world_ids.push(cid);
        }
    }

    pub fn id(&self) -> DataId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn coordinates(&self) -> &Arc<dyn Coordinates> {
        &self.coordinates
    }

    /// Add a native component. Its shape must match the dataset.
    pub fn add_component(&mut self, label: impl Into<String>, component: Component) -> Result<ComponentId> {
        if component.shape() != self.shape.as_slice() {
            return Err(DataError::ShapeMismatch {
                expected: self.shape.clone(),
                found: component.shape().to_vec(),
            });
        }
        let cid = ComponentId::new(self.id);
        let label = label.into();
        tracing::trace!("Adding component '{}' to '{}'", label, self.label);
        self.entries.insert(cid, Entry { label, role: Role::Native(component) });
        Ok(cid)
    }

    /// Register a link computing one of this dataset's components from others.
    /// The output id is minted here and returned.
    pub fn add_derived_component<F>(&mut self, label: impl Into<String>, build: F) -> Result<ComponentId>
    where
        F: FnOnce(ComponentId) -> Result<ComponentLink>,
    {
        let cid = ComponentId::new(self.id);
        let link = build(cid)?;
        self.add_component_link(link, label)?;
        Ok(cid)
    }

    /// Register a link whose output belongs to this dataset
    pub fn add_component_link(&mut self, link: ComponentLink, label: impl Into<String>) -> Result<()> {
        let output = link.to_id();
        if output.parent() != self.id {
            return Err(DataError::InvalidLink(format!(
                "output {} does not belong to '{}'",
                output, self.label
            )));
        }
        if matches!(self.entries.get(&output), Some(Entry { role: Role::Native(_), .. })) {
            return Err(DataError::InvalidLink(format!(
                "output {} is already a stored component",
                output
            )));
        }
        self.entries
            .entry(output)
            .or_insert_with(|| Entry { label: String::new(), role: Role::Derived })
            .label = label.into();
        self.local_links.push(link);
        Ok(())
    }

    /// Links registered on this dataset
    pub fn local_links(&self) -> &[ComponentLink] {
        &self.local_links
    }

    /// Remove a native or derived component. Its id becomes dangling.
    pub fn remove_component(&mut self, cid: ComponentId) -> Result<Option<Component>> {
        match self.entries.get(&cid).map(|e| &e.role) {
            Some(Role::Pixel(_)) | Some(Role::World(_)) => {
                return Err(DataError::InvalidMutation("coordinate components cannot be removed".to_string()));
            }
            None => return Err(DataError::UnknownComponent(cid.to_string())),
            _ => {}
        }
        self.local_links.retain(|l| l.to_id() != cid);
        match self.entries.shift_remove(&cid) {
            Some(Entry { role: Role::Native(component), .. }) => Ok(Some(component)),
            _ => Ok(None),
        }
    }

    /// Rename a component keeping its identity. Returns the previous label.
    pub fn update_id(&mut self, cid: ComponentId, label: impl Into<String>) -> Result<String> {
        let entry = self
            .entries
            .get_mut(&cid)
            .ok_or_else(|| DataError::UnknownComponent(cid.to_string()))?;
        Ok(std::mem::replace(&mut entry.label, label.into()))
    }

    /// Replace the values of a native component
    pub fn update_values(&mut self, cid: ComponentId, values: ArrayD<f64>) -> Result<()> {
        match self.entries.get_mut(&cid) {
            Some(Entry { role: Role::Native(component), .. }) => component.set_values(values),
            _ => Err(DataError::UnknownComponent(cid.to_string())),
        }
    }

    pub fn contains(&self, cid: ComponentId) -> bool {
        self.entries.contains_key(&cid)
    }

    pub fn component_label(&self, cid: ComponentId) -> Option<&str> {
        self.entries.get(&cid).map(|e| e.label.as_str())
    }

    /// Id of the component with this label, if exactly one has it
    pub fn find_component_id(&self, label: &str) -> Option<ComponentId> {
        let mut matches = self.entries.iter().filter(|(_, e)| e.label == label);
        match (matches.next(), matches.next()) {
            (Some((cid, _)), None) => Some(*cid),
            _ => None,
        }
    }

    /// Like [`Data::find_component_id`] but failing with a descriptive error
    pub fn id_for(&self, label: &str) -> Result<ComponentId> {
        self.find_component_id(label)
            .ok_or_else(|| DataError::UnknownComponent(format!("'{}' on '{}'", label, self.label)))
    }

    /// All ids: coordinates first, then stored and derived components in
    /// insertion order
    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.entries.keys().copied().collect()
    }

    /// Stored components, in insertion order
    pub fn main_components(&self) -> Vec<ComponentId> {
        self.entries
            .iter()
            .filter(|(_, e)| matches!(e.role, Role::Native(_)))
            .map(|(cid, _)| *cid)
            .collect()
    }

    pub fn derived_components(&self) -> Vec<ComponentId> {
        self.entries
            .iter()
            .filter(|(_, e)| matches!(e.role, Role::Derived))
            .map(|(cid, _)| *cid)
            .collect()
    }

    pub fn pixel_component_ids(&self) -> &[ComponentId] {
        &self.pixel_ids
    }

    pub fn world_component_ids(&self) -> &[ComponentId] {
        &self.world_ids
    }

    pub fn get_component(&self, cid: ComponentId) -> Option<&Component> {
        match self.entries.get(&cid) {
            Some(Entry { role: Role::Native(component), .. }) => Some(component),
            _ => None,
        }
    }

    /// Kind of a component known to this dataset. Coordinates and derived
    /// components are numerical.
    pub fn get_kind(&self, cid: ComponentId) -> Option<ComponentKind> {
        self.entries.get(&cid).map(|e| match &e.role {
            Role::Native(component) => component.kind(),
            _ => ComponentKind::Numerical,
        })
    }

    /// Whether the values of `cid` can be produced without following links
    pub fn has_native(&self, cid: ComponentId) -> bool {
        matches!(
            self.entries.get(&cid).map(|e| &e.role),
            Some(Role::Native(_)) | Some(Role::Pixel(_)) | Some(Role::World(_))
        )
    }

    /// Values of a stored or coordinate component, `None` when `cid` needs
    /// link resolution
    pub fn native_values(&self, cid: ComponentId, view: Option<&View>) -> Result<Option<ArrayD<f64>>> {
        let role = match self.entries.get(&cid) {
            Some(entry) => &entry.role,
            None => return Ok(None),
        };
        match role {
            Role::Native(component) => view::read(component.values(), view).map(Some),
            Role::Pixel(axis) => view::read(&coordinates::pixel_grid(&self.shape, *axis), view).map(Some),
            Role::World(axis) => {
                let grids = coordinates::pixel_grids(&self.shape);
                let world = self.coordinates.pixel_to_world_axis(*axis, &grids);
                view::read(&world, view).map(Some)
            }
            Role::Derived => Ok(None),
        }
    }

    pub(crate) fn insert_subset(&mut self, subset: Subset) {
        self.subsets.insert(subset.id(), subset);
    }

    pub(crate) fn take_subset(&mut self, id: SubsetId) -> Option<Subset> {
        self.subsets.shift_remove(&id)
    }

    pub(crate) fn subset_mut(&mut self, id: SubsetId) -> Option<&mut Subset> {
        self.subsets.get_mut(&id)
    }

    pub fn subset(&self, id: SubsetId) -> Option<&Subset> {
        self.subsets.get(&id)
    }

    /// Subsets owned by this dataset, in creation order
    pub fn subsets(&self) -> impl Iterator<Item = &Subset> {
        self.subsets.values()
    }
}

fn pixel_label(axis: usize, ndim: usize) -> String {
    let name = match (ndim, axis) {
        (1, 0) | (2, 1) | (3, 2) => Some("x"),
        (2, 0) | (3, 1) => Some("y"),
        (3, 0) => Some("z"),
        _ => None,
    };
    match name {
        Some(name) => format!("Pixel Axis {} [{}]", axis, name),
        None => format!("Pixel Axis {}", axis),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinates::AffineCoordinates;
    use crate::view::ViewElem;
    use ndarray::{arr1, IxDyn};

    #[test]
    fn test_coordinate_ids_created() {
        let data = Data::new("cube", vec![3, 4, 2]);
        assert_eq!(data.pixel_component_ids().len(), 3);
        assert_eq!(data.world_component_ids().len(), 3);
        assert_eq!(data.component_label(data.pixel_component_ids()[0]), Some("Pixel Axis 0 [z]"));
        assert!(data.main_components().is_empty());
        assert_eq!(data.size(), 24);
    }

    #[test]
    fn test_add_component_shape_checked() {
        let mut data = Data::new("table", vec![3]);
        assert!(data.add_component("a", Component::from_vec(vec![1.0, 2.0, 3.0])).is_ok());
        let err = data.add_component("b", Component::from_vec(vec![1.0]));
        assert!(matches!(err, Err(DataError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_update_id_keeps_identity() {
        let mut data = Data::from_columns("table", vec![("a", vec![1.0, 2.0])]).unwrap();
        let a = data.id_for("a").unwrap();

        let old = data.update_id(a, "alpha").unwrap();
        assert_eq!(old, "a");
        assert_eq!(data.find_component_id("alpha"), Some(a));
        assert_eq!(data.find_component_id("a"), None);
    }

    #[test]
    fn test_ambiguous_label() {
        let mut data = Data::new("table", vec![1]);
        data.add_component("a", Component::from_vec(vec![1.0])).unwrap();
        data.add_component("a", Component::from_vec(vec![2.0])).unwrap();
        assert_eq!(data.find_component_id("a"), None);
    }

    #[test]
    fn test_remove_component_dangles() {
        let mut data = Data::from_columns("table", vec![("a", vec![1.0])]).unwrap();
        let a = data.id_for("a").unwrap();
        assert!(data.remove_component(a).unwrap().is_some());
        assert!(data.native_values(a, None).unwrap().is_none());

        let pixel = data.pixel_component_ids()[0];
        assert!(matches!(data.remove_component(pixel), Err(DataError::InvalidMutation(_))));
    }

    #[test]
    fn test_world_values_follow_coordinates() {
        let data = Data::new("image", vec![2, 3])
            .with_coordinates(Arc::new(AffineCoordinates::new(vec![1.0, 10.0], vec![0.0, 5.0])));
        let world_x = data.world_component_ids()[1];
        let view = View::new(vec![ViewElem::Index(1), ViewElem::ALL]);

        let values = data.native_values(world_x, Some(&view)).unwrap().unwrap();
        assert_eq!(values, arr1(&[5.0, 15.0, 25.0]).into_dyn());
    }

    #[test]
    fn test_derived_component_registration() {
        let mut data = Data::from_columns("table", vec![("a", vec![1.0, 2.0])]).unwrap();
        let a = data.id_for("a").unwrap();
        let doubled = data
            .add_derived_component("doubled", |out| {
                ComponentLink::new(vec![a], out, crate::link::functions::scale(2.0))
            })
            .unwrap();

        assert_eq!(data.derived_components(), vec![doubled]);
        assert!(!data.has_native(doubled));
        assert_eq!(data.local_links().len(), 1);
    }

    #[test]
    fn test_update_values() {
        let mut data = Data::from_columns("table", vec![("a", vec![1.0, 2.0])]).unwrap();
        let a = data.id_for("a").unwrap();
        data.update_values(a, ArrayD::from_elem(IxDyn(&[2]), 7.0)).unwrap();
        assert_eq!(data.get_component(a).unwrap().values()[[1]], 7.0);
    }
}
