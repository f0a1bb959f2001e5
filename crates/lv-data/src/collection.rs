//! The set of loaded datasets and the links between them

use std::sync::Arc;

use indexmap::IndexMap;
use lv_core::messages::{
    ComponentRenamed, DataAdded, DataRemoved, LinksChanged, NumericalDataChanged, SubsetCreated, SubsetDeleted,
    SubsetUpdated,
};
use lv_core::{ComponentId, CoreSettings, DataId, Hub, LinkId, SubsetId};
use ndarray::ArrayD;

use crate::coordinates;
use crate::data::Data;
use crate::link::{Link, LinkFn};
use crate::resolve::Resolver;
use crate::subset::Subset;
use crate::subset_state::{CombineMode, SubsetState};
use crate::view::View;
use crate::{DataError, Result};

/// What [`DataCollection::remove`] took out, enough to put it back
#[derive(Debug)]
pub struct RemovedData {
    pub data: Data,
    /// Position the dataset occupied
    pub position: usize,
    /// Links pruned because they referenced the dataset
    pub links: Vec<(LinkId, Link)>,
}

/// Ordered datasets plus the links declared between them.
///
/// The collection owns every dataset. Links, subset states and derived views
/// refer to datasets and components by id only.
pub struct DataCollection {
    data: IndexMap<DataId, Data>,
    links: IndexMap<LinkId, Link>,
    hub: Arc<Hub>,
    settings: CoreSettings,
}

impl DataCollection {
    pub fn new() -> Self {
        Self::with_settings(CoreSettings::default())
    }

    pub fn with_settings(settings: CoreSettings) -> Self {
        Self {
            data: IndexMap::new(),
            links: IndexMap::new(),
            hub: Arc::new(Hub::new()),
            settings,
        }
    }

    pub fn settings(&self) -> &CoreSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: CoreSettings) {
        self.settings = settings;
    }

    /// Hub on which collection changes are announced
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    // ---- datasets -------------------------------------------------------

    /// Add a dataset at the end
    pub fn append(&mut self, data: Data) -> Result<DataId> {
        let id = data.id();
        if self.data.contains_key(&id) {
            return Err(DataError::InvalidMutation(format!("'{}' is already in the collection", data.label())));
        }
        tracing::info!("Adding data '{}' with shape {:?}", data.label(), data.shape());
        self.data.insert(id, data);
        self.hub.publish(DataAdded { data: id });
        Ok(id)
    }

    /// Remove a dataset with its subsets and every link referencing it
    pub fn remove(&mut self, id: DataId) -> Result<RemovedData> {
        let (position, _, data) = self.data.shift_remove_full(&id).ok_or(DataError::UnknownData(id))?;

        let pruned: Vec<LinkId> = self
            .links
            .iter()
            .filter(|(_, link)| link.references_data(id))
            .map(|(link_id, _)| *link_id)
            .collect();
        let links: Vec<(LinkId, Link)> = pruned
            .iter()
            .filter_map(|link_id| self.links.shift_remove(link_id).map(|link| (*link_id, link)))
            .collect();

        tracing::info!("Removed data '{}', pruned {} link(s)", data.label(), links.len());
        for subset in data.subsets() {
            self.hub.publish(SubsetDeleted {
                subset: subset.id(),
                data: id,
            });
        }
        if !pruned.is_empty() {
            self.hub.publish(LinksChanged {
                added: Vec::new(),
                removed: pruned,
                edited: Vec::new(),
            });
        }
        self.hub.publish(DataRemoved { data: id });

        Ok(RemovedData { data, position, links })
    }

    /// Fails when `removed` could not be put back as a whole
    pub fn check_restore(&self, removed: &RemovedData) -> Result<()> {
        let id = removed.data.id();
        if self.data.contains_key(&id) {
            return Err(DataError::InvalidMutation(format!(
                "'{}' is already in the collection",
                removed.data.label()
            )));
        }
        for (link_id, link) in &removed.links {
            if self.links.contains_key(link_id) {
                return Err(DataError::InvalidMutation(format!("{} is already registered", link_id)));
            }
            self.check_link_parents(link, Some(id))?;
        }
        Ok(())
    }

    /// Put back what [`DataCollection::remove`] returned. Nothing changes
    /// unless the dataset and every one of its links can be restored.
    pub fn restore(&mut self, removed: RemovedData) -> Result<()> {
        self.check_restore(&removed)?;
        let RemovedData { data, position, links } = removed;
        let id = data.id();

        let position = position.min(self.data.len());
        self.data.shift_insert(position, id, data);
        self.hub.publish(DataAdded { data: id });

        let added: Vec<LinkId> = links.iter().map(|(link_id, _)| *link_id).collect();
        self.links.extend(links);
        if !added.is_empty() {
            self.hub.publish(LinksChanged {
                added,
                removed: Vec::new(),
                edited: Vec::new(),
            });
        }
        Ok(())
    }

    pub fn data(&self, id: DataId) -> Result<&Data> {
        self.data.get(&id).ok_or(DataError::UnknownData(id))
    }

    /// Mutable access for structural edits. Value changes should go through
    /// [`DataCollection::update_values`] so listeners are told.
    pub fn data_mut(&mut self, id: DataId) -> Result<&mut Data> {
        self.data.get_mut(&id).ok_or(DataError::UnknownData(id))
    }

    pub fn contains(&self, id: DataId) -> bool {
        self.data.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Data> {
        self.data.values()
    }

    pub fn ids(&self) -> Vec<DataId> {
        self.data.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn find_by_label(&self, label: &str) -> Option<&Data> {
        self.data.values().find(|d| d.label() == label)
    }

    /// Label of a component, looked up through its parent dataset
    pub fn component_label(&self, cid: ComponentId) -> String {
        self.data
            .get(&cid.parent())
            .and_then(|d| d.component_label(cid))
            .map(str::to_string)
            .unwrap_or_else(|| cid.to_string())
    }

    /// Rename a component; every link and state holding the id sees the new label
    pub fn update_id(&mut self, cid: ComponentId, label: impl Into<String>) -> Result<()> {
        let data_id = cid.parent();
        let new_label = label.into();
        let old_label = self.data_mut(data_id)?.update_id(cid, new_label.clone())?;
        self.hub.publish(ComponentRenamed {
            data: data_id,
            old_label,
            new_label,
        });
        Ok(())
    }

    /// Replace stored values and announce the change
    pub fn update_values(&mut self, data: DataId, cid: ComponentId, values: ArrayD<f64>) -> Result<()> {
        self.data_mut(data)?.update_values(cid, values)?;
        self.hub.publish(NumericalDataChanged { data });
        Ok(())
    }

    // ---- links ----------------------------------------------------------

    fn validate_link(&self, link: &Link) -> Result<()> {
        self.check_link_parents(link, None)
    }

    /// Every dataset `link` touches must be present, or be `pending`
    fn check_link_parents(&self, link: &Link, pending: Option<DataId>) -> Result<()> {
        for cid in link.from_ids().iter().chain(link.to_ids().iter()) {
            let parent = cid.parent();
            if Some(parent) != pending && !self.data.contains_key(&parent) {
                return Err(DataError::UnknownData(parent));
            }
        }
        Ok(())
    }

    /// Register a link between datasets of this collection
    pub fn add_link(&mut self, link: impl Into<Link>) -> Result<LinkId> {
        let link = link.into();
        self.validate_link(&link)?;
        let id = LinkId::new();
        tracing::debug!("Adding link {} ({})", id, link.description());
        self.links.insert(id, link);
        self.hub.publish(LinksChanged {
            added: vec![id],
            removed: Vec::new(),
            edited: Vec::new(),
        });
        Ok(id)
    }

    /// Register several links; nothing is added if any is invalid
    pub fn add_links(&mut self, links: Vec<Link>) -> Result<Vec<LinkId>> {
        for link in &links {
            self.validate_link(link)?;
        }
        let ids: Vec<LinkId> = links
            .into_iter()
            .map(|link| {
                let id = LinkId::new();
                self.links.insert(id, link);
                id
            })
            .collect();
        self.hub.publish(LinksChanged {
            added: ids.clone(),
            removed: Vec::new(),
            edited: Vec::new(),
        });
        Ok(ids)
    }

    pub fn remove_link(&mut self, id: LinkId) -> Result<Link> {
        let link = self.links.shift_remove(&id).ok_or(DataError::UnknownLink(id))?;
        self.hub.publish(LinksChanged {
            added: Vec::new(),
            removed: vec![id],
            edited: Vec::new(),
        });
        Ok(link)
    }

    /// Re-insert a link under a known id, used to undo a removal
    pub fn insert_link(&mut self, id: LinkId, link: Link) -> Result<()> {
        self.validate_link(&link)?;
        self.links.insert(id, link);
        self.hub.publish(LinksChanged {
            added: vec![id],
            removed: Vec::new(),
            edited: Vec::new(),
        });
        Ok(())
    }

    /// Swap the link stored under `id`, keeping its position
    pub fn replace_link(&mut self, id: LinkId, link: Link) -> Result<Link> {
        self.validate_link(&link)?;
        let slot = self.links.get_mut(&id).ok_or(DataError::UnknownLink(id))?;
        let old = std::mem::replace(slot, link);
        self.hub.publish(LinksChanged {
            added: Vec::new(),
            removed: Vec::new(),
            edited: vec![id],
        });
        Ok(old)
    }

    /// Change the function of a function link. The next request observes it.
    pub fn set_link_function(&mut self, id: LinkId, using: LinkFn) -> Result<()> {
        match self.links.get_mut(&id) {
            Some(Link::Function(link)) => link.set_using(using)?,
            Some(Link::Helper(_)) => {
                return Err(DataError::InvalidLink(format!("{} is a helper, not a function link", id)));
            }
            None => return Err(DataError::UnknownLink(id)),
        }
        self.hub.publish(LinksChanged {
            added: Vec::new(),
            removed: Vec::new(),
            edited: vec![id],
        });
        Ok(())
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    /// Links in declaration order
    pub fn external_links(&self) -> impl Iterator<Item = (LinkId, &Link)> {
        self.links.iter().map(|(id, link)| (*id, link))
    }

    /// Links connecting `a` and `b`, in either direction
    pub fn links_between(&self, a: DataId, b: DataId) -> Vec<LinkId> {
        self.links
            .iter()
            .filter(|(_, link)| link.connects(a, b))
            .map(|(id, _)| *id)
            .collect()
    }

    // ---- resolution -----------------------------------------------------

    /// Values of `cid` as observed on `data`, following links if needed
    pub fn get_data(&self, data: DataId, cid: ComponentId, view: Option<&View>) -> Result<ArrayD<f64>> {
        let target = self.data(data)?;
        Resolver::new(self, target).resolve(cid, view)
    }

    /// Whether `cid` can be derived on `data` at all
    pub fn is_resolvable(&self, data: DataId, cid: ComponentId) -> bool {
        match self.data.get(&data) {
            Some(target) => Resolver::new(self, target).can_resolve(cid),
            None => false,
        }
    }

    /// Evaluate a subset state on `data`
    pub fn get_mask(&self, data: DataId, state: &SubsetState, view: Option<&View>) -> Result<ArrayD<bool>> {
        state.to_mask(self, data, view)
    }

    pub(crate) fn incompatible(&self, cid: ComponentId, data: DataId) -> DataError {
        DataError::IncompatibleAttribute {
            component: cid,
            label: self.component_label(cid),
            data,
        }
    }

    /// Succeeds when `target` shares the pixel grid of `owner`: same shape and
    /// every pixel coordinate of `owner` resolves on `target` to the target's
    /// own grid.
    pub fn check_pixel_aligned(&self, owner: DataId, target: DataId) -> Result<()> {
        if owner == target {
            return Ok(());
        }
        let owner_data = self.data(owner)?;
        let target_data = self.data(target)?;
        if owner_data.shape() != target_data.shape() {
            return Err(DataError::ShapeMismatch {
                expected: owner_data.shape().to_vec(),
                found: target_data.shape().to_vec(),
            });
        }
        for (axis, cid) in owner_data.pixel_component_ids().iter().enumerate() {
            let resolved = self.get_data(target, *cid, None)?;
            if resolved != coordinates::pixel_grid(target_data.shape(), axis) {
                return Err(self.incompatible(*cid, target));
            }
        }
        Ok(())
    }

    /// Range state honouring the configured bound inclusivity
    pub fn range_state(&self, att: ComponentId, lo: f64, hi: f64) -> SubsetState {
        SubsetState::range_with(att, lo, hi, self.settings.subsets.inclusive_ranges)
    }

    // ---- subsets --------------------------------------------------------

    /// Create a subset owned by `data`
    pub fn new_subset(&mut self, data: DataId, label: impl Into<String>, state: SubsetState) -> Result<SubsetId> {
        let subset = Subset::new(data, label, state);
        let id = subset.id();
        self.data_mut(data)?.insert_subset(subset);
        self.hub.publish(SubsetCreated { subset: id, data });
        Ok(id)
    }

    /// Re-insert a previously removed subset
    pub fn restore_subset(&mut self, subset: Subset) -> Result<()> {
        let id = subset.id();
        let data = subset.data();
        self.data_mut(data)?.insert_subset(subset);
        self.hub.publish(SubsetCreated { subset: id, data });
        Ok(())
    }

    fn owner_of(&self, id: SubsetId) -> Result<DataId> {
        self.data
            .values()
            .find(|d| d.subset(id).is_some())
            .map(|d| d.id())
            .ok_or(DataError::UnknownSubset(id))
    }

    pub fn subset(&self, id: SubsetId) -> Result<&Subset> {
        self.data
            .values()
            .find_map(|d| d.subset(id))
            .ok_or(DataError::UnknownSubset(id))
    }

    pub fn subsets_of(&self, data: DataId) -> Result<Vec<&Subset>> {
        Ok(self.data(data)?.subsets().collect())
    }

    /// Replace a subset's state, returning the previous one
    pub fn set_subset_state(&mut self, id: SubsetId, state: SubsetState) -> Result<SubsetState> {
        self.apply_subset_state(id, state, CombineMode::Replace)
    }

    /// Merge a selection into a subset, returning the previous state
    pub fn apply_subset_state(&mut self, id: SubsetId, state: SubsetState, mode: CombineMode) -> Result<SubsetState> {
        let data = self.owner_of(id)?;
        let subset = self
            .data_mut(data)?
            .subset_mut(id)
            .ok_or(DataError::UnknownSubset(id))?;
        let previous = subset.apply_state(state, mode);
        tracing::debug!("Subset {} updated with {:?} mode", id, mode);
        self.hub.publish(SubsetUpdated { subset: id, data });
        Ok(previous)
    }

    pub fn remove_subset(&mut self, id: SubsetId) -> Result<Subset> {
        let data = self.owner_of(id)?;
        let subset = self
            .data_mut(data)?
            .take_subset(id)
            .ok_or(DataError::UnknownSubset(id))?;
        self.hub.publish(SubsetDeleted { subset: id, data });
        Ok(subset)
    }

    /// Evaluate a subset on any dataset where its attributes resolve
    pub fn subset_mask(&self, id: SubsetId, data: DataId, view: Option<&View>) -> Result<ArrayD<bool>> {
        self.subset(id)?.state().to_mask(self, data, view)
    }
}

impl Default for DataCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DataCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCollection")
            .field("data", &self.data.values().map(|d| d.label()).collect::<Vec<_>>())
            .field("links", &self.links.len())
            .finish()
    }
}
