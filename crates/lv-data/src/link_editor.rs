//! Editing model for the links between two datasets
//!
//! The editor works on a copy of the collection's links. Nothing changes in
//! the collection until [`LinkEditorState::apply`] is called.

use indexmap::IndexMap;
use lv_core::{ComponentId, DataId, LinkId};

use crate::collection::DataCollection;
use crate::link::{ComponentLink, Link, LinkFn};
use crate::{DataError, Result};

/// A link function that can be offered to the user
#[derive(Clone)]
pub struct LinkFunctionSpec {
    pub name: String,
    /// Parameter names, in call order
    pub input_names: Vec<String>,
    pub output_name: String,
    pub function: LinkFn,
    pub inverse: Option<LinkFn>,
    pub description: String,
}

impl LinkFunctionSpec {
    pub fn new(name: impl Into<String>, input_names: &[&str], output_name: impl Into<String>, function: LinkFn) -> Self {
        Self {
            name: name.into(),
            input_names: input_names.iter().map(|s| s.to_string()).collect(),
            output_name: output_name.into(),
            function,
            inverse: None,
            description: String::new(),
        }
    }

    pub fn with_inverse(mut self, inverse: LinkFn) -> Self {
        self.inverse = Some(inverse);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A function link whose parameters can be rebound
#[derive(Clone)]
pub struct EditableLink {
    function: LinkFn,
    inverse: Option<LinkFn>,
    data_in: DataId,
    data_out: DataId,
    inputs: IndexMap<String, ComponentId>,
    output_name: String,
    output: ComponentId,
    description: String,
}

impl EditableLink {
    fn from_component_link(link: &ComponentLink) -> Option<Self> {
        let data_in = link.from_ids().first()?.parent();
        Some(Self {
            function: link.using().clone(),
            inverse: link.inverse().cloned(),
            data_in,
            data_out: link.to_id().parent(),
            inputs: link.inputs().clone(),
            output_name: link.output_name().to_string(),
            output: link.to_id(),
            description: link.description().to_string(),
        })
    }

    pub fn data_in(&self) -> DataId {
        self.data_in
    }

    pub fn data_out(&self) -> DataId {
        self.data_out
    }

    pub fn inputs(&self) -> &IndexMap<String, ComponentId> {
        &self.inputs
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn output(&self) -> ComponentId {
        self.output
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The link as it would be registered
    pub fn to_link(&self) -> Result<ComponentLink> {
        let names = self.inputs.keys().cloned().collect();
        let from = self.inputs.values().copied().collect();
        let link = ComponentLink::with_names(names, from, self.output, self.output_name.clone(), self.function.clone())?
            .with_description(self.description.clone());
        Ok(match &self.inverse {
            Some(inverse) if self.inputs.len() == 1 => link.with_inverse(inverse.clone()),
            _ => link,
        })
    }
}

/// One entry of the working copy
#[derive(Clone)]
pub enum EditorLink {
    Function(EditableLink),
    /// Helpers are listed but not edited
    Fixed(Link),
}

impl EditorLink {
    fn connects(&self, a: DataId, b: DataId) -> bool {
        match self {
            EditorLink::Function(link) => {
                (link.data_in == a && link.data_out == b) || (link.data_in == b && link.data_out == a)
            }
            EditorLink::Fixed(link) => link.connects(a, b),
        }
    }

    fn to_link(&self) -> Result<Link> {
        match self {
            EditorLink::Function(link) => Ok(Link::Function(link.to_link()?)),
            EditorLink::Fixed(link) => Ok(link.clone()),
        }
    }
}

struct Entry {
    /// Id in the collection, `None` until applied
    id: Option<LinkId>,
    link: EditorLink,
    dirty: bool,
}

/// Working copy of a collection's links, viewed two datasets at a time
pub struct LinkEditorState {
    data1: Option<DataId>,
    data2: Option<DataId>,
    entries: Vec<Entry>,
    selected: Option<usize>,
}

impl LinkEditorState {
    /// Copy the links of `collection`. With exactly two datasets both are
    /// preselected.
    pub fn new(collection: &DataCollection) -> Self {
        let entries = collection
            .external_links()
            .map(|(id, link)| {
                let link = match link {
                    Link::Function(function) => EditableLink::from_component_link(function)
                        .map(EditorLink::Function)
                        .unwrap_or_else(|| EditorLink::Fixed(link.clone())),
                    Link::Helper(_) => EditorLink::Fixed(link.clone()),
                };
                Entry {
                    id: Some(id),
                    link,
                    dirty: false,
                }
            })
            .collect();

        let ids = collection.ids();
        let (data1, data2) = match ids.as_slice() {
            [a, b] => (Some(*a), Some(*b)),
            _ => (None, None),
        };

        let mut state = Self {
            data1,
            data2,
            entries,
            selected: None,
        };
        state.select_first();
        state
    }

    pub fn data1(&self) -> Option<DataId> {
        self.data1
    }

    pub fn data2(&self) -> Option<DataId> {
        self.data2
    }

    /// Change the pair of datasets being edited
    pub fn set_data(&mut self, collection: &DataCollection, data1: DataId, data2: DataId) -> Result<()> {
        collection.data(data1)?;
        collection.data(data2)?;
        self.data1 = Some(data1);
        self.data2 = Some(data2);
        self.select_first();
        Ok(())
    }

    fn select_first(&mut self) {
        self.selected = self.visible().first().copied();
    }

    fn visible(&self) -> Vec<usize> {
        match (self.data1, self.data2) {
            (Some(a), Some(b)) => self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.link.connects(a, b))
                .map(|(i, _)| i)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Links between the two selected datasets, in either direction
    pub fn links(&self) -> Vec<&EditorLink> {
        self.visible().into_iter().map(|i| &self.entries[i].link).collect()
    }

    /// Select the `index`-th entry of [`LinkEditorState::links`]
    pub fn select(&mut self, index: usize) -> Result<()> {
        let visible = self.visible();
        let entry = visible
            .get(index)
            .ok_or_else(|| DataError::InvalidArgument(format!("no link at position {}", index)))?;
        self.selected = Some(*entry);
        Ok(())
    }

    pub fn selected_link(&self) -> Option<&EditorLink> {
        self.selected.map(|i| &self.entries[i].link)
    }

    /// Add a link from `data1` to `data2` using `spec`. Parameter `i` is bound
    /// to the `i`-th stored component of `data1`, the output to the first
    /// stored component of `data2`.
    pub fn new_link(&mut self, collection: &DataCollection, spec: &LinkFunctionSpec) -> Result<()> {
        let (Some(data_in), Some(data_out)) = (self.data1, self.data2) else {
            return Err(DataError::InvalidArgument("select two datasets before adding a link".to_string()));
        };
        if !spec.function.accepts(spec.input_names.len()) {
            return Err(DataError::InvalidLink(format!(
                "'{}' declares {} parameters its function does not take",
                spec.name,
                spec.input_names.len()
            )));
        }
        let candidates = collection.data(data_in)?.main_components();
        let output = *collection
            .data(data_out)?
            .main_components()
            .first()
            .ok_or_else(|| DataError::InvalidLink("the output dataset has no components".to_string()))?;

        if candidates.is_empty() {
            return Err(DataError::InvalidLink("the input dataset has no components".to_string()));
        }
        let mut inputs = IndexMap::new();
        for (i, name) in spec.input_names.iter().enumerate() {
            let cid = candidates[i.min(candidates.len() - 1)];
            if inputs.insert(name.clone(), cid).is_some() {
                return Err(DataError::InvalidLink(format!("parameter '{}' declared twice", name)));
            }
        }

        let description = if spec.description.is_empty() {
            spec.name.clone()
        } else {
            spec.description.clone()
        };
        tracing::debug!("New '{}' link in editor", spec.name);
        self.entries.push(Entry {
            id: None,
            link: EditorLink::Function(EditableLink {
                function: spec.function.clone(),
                inverse: spec.inverse.clone(),
                data_in,
                data_out,
                inputs,
                output_name: spec.output_name.clone(),
                output,
                description,
            }),
            dirty: true,
        });
        self.selected = Some(self.entries.len() - 1);
        Ok(())
    }

    fn selected_function(&mut self) -> Result<&mut Entry> {
        let index = self
            .selected
            .ok_or_else(|| DataError::InvalidArgument("no link selected".to_string()))?;
        let entry = &mut self.entries[index];
        match entry.link {
            EditorLink::Function(_) => Ok(entry),
            EditorLink::Fixed(_) => Err(DataError::InvalidLink("helper links cannot be edited".to_string())),
        }
    }

    /// Rebind a parameter of the selected link
    pub fn set_input(&mut self, name: &str, cid: ComponentId) -> Result<()> {
        let entry = self.selected_function()?;
        if let EditorLink::Function(link) = &mut entry.link {
            if cid.parent() != link.data_in {
                return Err(DataError::InvalidLink(format!("{} is not a component of the input dataset", cid)));
            }
            let slot = link
                .inputs
                .get_mut(name)
                .ok_or_else(|| DataError::InvalidArgument(format!("no parameter named '{}'", name)))?;
            *slot = cid;
            entry.dirty = true;
        }
        Ok(())
    }

    /// Rebind the output of the selected link
    pub fn set_output(&mut self, cid: ComponentId) -> Result<()> {
        let entry = self.selected_function()?;
        if let EditorLink::Function(link) = &mut entry.link {
            if cid.parent() != link.data_out {
                return Err(DataError::InvalidLink(format!("{} is not a component of the output dataset", cid)));
            }
            link.output = cid;
            entry.dirty = true;
        }
        Ok(())
    }

    /// Drop the selected link from the working copy
    pub fn remove_link(&mut self) -> Result<()> {
        let index = self
            .selected
            .ok_or_else(|| DataError::InvalidArgument("no link selected".to_string()))?;
        self.entries.remove(index);
        self.select_first();
        Ok(())
    }

    /// Make the collection's links match the working copy
    pub fn apply(&mut self, collection: &mut DataCollection) -> Result<()> {
        let links: Vec<Option<Link>> = self
            .entries
            .iter()
            .map(|e| if e.dirty || e.id.is_none() { e.link.to_link().map(Some) } else { Ok(None) })
            .collect::<Result<_>>()?;

        let kept: Vec<LinkId> = self.entries.iter().filter_map(|e| e.id).collect();
        let stale: Vec<LinkId> = collection
            .external_links()
            .map(|(id, _)| id)
            .filter(|id| !kept.contains(id))
            .collect();
        for id in stale {
            collection.remove_link(id)?;
        }

        for (entry, link) in self.entries.iter_mut().zip(links) {
            let Some(link) = link else { continue };
            match entry.id {
                Some(id) => {
                    collection.replace_link(id, link)?;
                }
                None => entry.id = Some(collection.add_link(link)?),
            }
            entry.dirty = false;
        }
        tracing::info!("Applied {} link(s) from the editor", self.entries.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Data;
    use crate::link::functions;
    use ndarray::arr1;

    fn pair() -> (DataCollection, DataId, DataId) {
        let mut dc = DataCollection::new();
        let d1 = dc
            .append(Data::from_columns("d1", vec![("a", vec![1.0, 2.0]), ("b", vec![10.0, 20.0])]).unwrap())
            .unwrap();
        let d2 = dc
            .append(Data::from_columns("d2", vec![("c", vec![0.0, 0.0]), ("d", vec![0.0, 0.0])]).unwrap())
            .unwrap();
        (dc, d1, d2)
    }

    #[test]
    fn test_two_datasets_preselected() {
        let (dc, d1, d2) = pair();
        let editor = LinkEditorState::new(&dc);
        assert_eq!(editor.data1(), Some(d1));
        assert_eq!(editor.data2(), Some(d2));
        assert!(editor.links().is_empty());
    }

    #[test]
    fn test_new_link_default_bindings() {
        let (mut dc, d1, d2) = pair();
        let mut editor = LinkEditorState::new(&dc);
        let spec = LinkFunctionSpec::new("sum", &["first", "second"], "total", functions::add());
        editor.new_link(&dc, &spec).unwrap();

        let a = dc.data(d1).unwrap().id_for("a").unwrap();
        let b = dc.data(d1).unwrap().id_for("b").unwrap();
        let c = dc.data(d2).unwrap().id_for("c").unwrap();
        match editor.selected_link() {
            Some(EditorLink::Function(link)) => {
                assert_eq!(link.inputs().values().copied().collect::<Vec<_>>(), vec![a, b]);
                assert_eq!(link.output(), c);
                assert_eq!(link.description(), "sum");
            }
            _ => panic!("expected a function link"),
        }

        editor.apply(&mut dc).unwrap();
        assert_eq!(dc.get_data(d1, c, None).unwrap(), arr1(&[11.0, 22.0]).into_dyn());
        assert_eq!(dc.external_links().count(), 1);
    }

    #[test]
    fn test_rebinding_validates_parent() {
        let (mut dc, d1, d2) = pair();
        let mut editor = LinkEditorState::new(&dc);
        editor
            .new_link(&dc, &LinkFunctionSpec::new("double", &["x"], "y", functions::scale(2.0)))
            .unwrap();

        let b = dc.data(d1).unwrap().id_for("b").unwrap();
        let d = dc.data(d2).unwrap().id_for("d").unwrap();
        assert!(matches!(editor.set_input("x", d), Err(DataError::InvalidLink(_))));
        assert!(matches!(editor.set_input("z", b), Err(DataError::InvalidArgument(_))));
        editor.set_input("x", b).unwrap();
        editor.set_output(d).unwrap();
        editor.apply(&mut dc).unwrap();

        let c = dc.data(d2).unwrap().id_for("c").unwrap();
        assert_eq!(dc.get_data(d1, d, None).unwrap(), arr1(&[20.0, 40.0]).into_dyn());
        assert!(dc.get_data(d1, c, None).is_err());
    }

    #[test]
    fn test_remove_and_apply() {
        let (mut dc, d1, d2) = pair();
        let a = dc.data(d1).unwrap().id_for("a").unwrap();
        let c = dc.data(d2).unwrap().id_for("c").unwrap();
        dc.add_link(Link::same(a, c).unwrap()).unwrap();

        let mut editor = LinkEditorState::new(&dc);
        assert_eq!(editor.links().len(), 1);
        editor.remove_link().unwrap();
        assert!(editor.links().is_empty());

        editor.apply(&mut dc).unwrap();
        assert_eq!(dc.external_links().count(), 0);
    }

    #[test]
    fn test_new_link_needs_datasets() {
        let mut dc = DataCollection::new();
        dc.append(Data::from_columns("only", vec![("a", vec![1.0])]).unwrap()).unwrap();
        let mut editor = LinkEditorState::new(&dc);
        let spec = LinkFunctionSpec::new("id", &["x"], "y", functions::identity());
        assert!(matches!(editor.new_link(&dc, &spec), Err(DataError::InvalidArgument(_))));
    }

    #[test]
    fn test_new_link_rejects_wrong_parameter_count() {
        let (dc, _, _) = pair();
        let mut editor = LinkEditorState::new(&dc);
        let spec = LinkFunctionSpec::new("diff", &["x"], "y", functions::subtract());
        assert!(matches!(editor.new_link(&dc, &spec), Err(DataError::InvalidLink(_))));
        assert!(editor.links().is_empty());

        let spec = LinkFunctionSpec::new("diff", &["x1", "x2"], "y", functions::subtract());
        editor.new_link(&dc, &spec).unwrap();
        assert_eq!(editor.links().len(), 1);
    }
}
