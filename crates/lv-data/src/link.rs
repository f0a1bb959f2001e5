//! Declared functional relations between components
//!
//! A [`ComponentLink`] derives one component from others. A [`LinkHelper`]
//! derives several at once, typically a coordinate transform. Both are stored
//! in a collection as a [`Link`].

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use lv_core::{ComponentId, DataId};
use ndarray::ArrayD;

use crate::{DataError, Result};

type ArrayFn = dyn Fn(&[ArrayD<f64>]) -> ArrayD<f64> + Send + Sync;

/// Function mapping input arrays to one output array, with the number of
/// inputs it accepts
#[derive(Clone)]
pub struct LinkFn {
    arity: Option<usize>,
    function: Arc<ArrayFn>,
}

impl LinkFn {
    /// Function taking exactly `arity` inputs
    pub fn new<F>(arity: usize, f: F) -> Self
    where
        F: Fn(&[ArrayD<f64>]) -> ArrayD<f64> + Send + Sync + 'static,
    {
        Self {
            arity: Some(arity),
            function: Arc::new(f),
        }
    }

    /// Function taking any non-zero number of inputs
    pub fn variadic<F>(f: F) -> Self
    where
        F: Fn(&[ArrayD<f64>]) -> ArrayD<f64> + Send + Sync + 'static,
    {
        Self {
            arity: None,
            function: Arc::new(f),
        }
    }

    /// Declared input count, `None` for variadic functions
    pub fn arity(&self) -> Option<usize> {
        self.arity
    }

    pub fn accepts(&self, inputs: usize) -> bool {
        inputs > 0 && self.arity.map_or(true, |arity| arity == inputs)
    }

    fn check(&self, inputs: usize) -> Result<()> {
        if self.accepts(inputs) {
            Ok(())
        } else {
            Err(DataError::InvalidLink(format!(
                "function takes {} inputs, {} given",
                self.arity.map_or_else(|| "at least 1".to_string(), |a| a.to_string()),
                inputs
            )))
        }
    }

    /// Apply to `inputs`, which must match the declared arity
    pub fn call(&self, inputs: &[ArrayD<f64>]) -> Result<ArrayD<f64>> {
        self.check(inputs.len())?;
        Ok((self.function)(inputs))
    }
}

impl fmt::Debug for LinkFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkFn").field("arity", &self.arity).finish()
    }
}

/// Function mapping input arrays to several output arrays
pub type MultiLinkFn = Arc<dyn Fn(&[ArrayD<f64>]) -> Vec<ArrayD<f64>> + Send + Sync>;

/// Wrap a closure taking exactly `arity` inputs as a [`LinkFn`]
pub fn link_fn<F>(arity: usize, f: F) -> LinkFn
where
    F: Fn(&[ArrayD<f64>]) -> ArrayD<f64> + Send + Sync + 'static,
{
    LinkFn::new(arity, f)
}

/// Common link functions
pub mod functions {
    use super::{link_fn, LinkFn};

    /// Output equals the single input
    pub fn identity() -> LinkFn {
        link_fn(1, |inputs| inputs[0].clone())
    }

    /// Element-wise sum of all inputs
    pub fn add() -> LinkFn {
        LinkFn::variadic(|inputs| {
            let mut out = inputs[0].clone();
            for other in &inputs[1..] {
                out += other;
            }
            out
        })
    }

    /// First input minus the second
    pub fn subtract() -> LinkFn {
        link_fn(2, |inputs| &inputs[0] - &inputs[1])
    }

    /// Element-wise product of all inputs
    pub fn multiply() -> LinkFn {
        LinkFn::variadic(|inputs| {
            let mut out = inputs[0].clone();
            for other in &inputs[1..] {
                out *= other;
            }
            out
        })
    }

    /// Single input multiplied by a constant
    pub fn scale(factor: f64) -> LinkFn {
        link_fn(1, move |inputs| inputs[0].mapv(|v| v * factor))
    }

    /// Single input shifted by a constant
    pub fn offset(delta: f64) -> LinkFn {
        link_fn(1, move |inputs| inputs[0].mapv(|v| v + delta))
    }
}

/// Default parameter names for `n` inputs: `x` for one, `x1..xn` otherwise
fn default_input_names(n: usize) -> Vec<String> {
    if n == 1 {
        vec!["x".to_string()]
    } else {
        (1..=n).map(|i| format!("x{}", i)).collect()
    }
}

fn bind_inputs(names: Vec<String>, ids: Vec<ComponentId>) -> Result<IndexMap<String, ComponentId>> {
    if ids.is_empty() {
        return Err(DataError::InvalidLink("a link needs at least one input".to_string()));
    }
    if names.len() != ids.len() {
        return Err(DataError::InvalidLink(format!(
            "{} parameter names declared for {} inputs",
            names.len(),
            ids.len()
        )));
    }
    let count = names.len();
    let bound: IndexMap<String, ComponentId> = names.into_iter().zip(ids).collect();
    if bound.len() != count {
        return Err(DataError::InvalidLink("duplicate parameter names".to_string()));
    }
    Ok(bound)
}

fn check_shapes(inputs: &[ArrayD<f64>]) -> Result<()> {
    if let Some(first) = inputs.first() {
        if let Some(bad) = inputs.iter().find(|a| a.shape() != first.shape()) {
            return Err(DataError::ShapeMismatch {
                expected: first.shape().to_vec(),
                found: bad.shape().to_vec(),
            });
        }
    }
    Ok(())
}

/// Derives the `to` component from the `from` components
#[derive(Clone)]
pub struct ComponentLink {
    inputs: IndexMap<String, ComponentId>,
    output: ComponentId,
    output_name: String,
    using: LinkFn,
    inverse: Option<LinkFn>,
    description: String,
}

impl ComponentLink {
    /// Create a link with default parameter names
    pub fn new(from: Vec<ComponentId>, to: ComponentId, using: LinkFn) -> Result<Self> {
        let names = default_input_names(from.len());
        Self::with_names(names, from, to, "output", using)
    }

    /// Create a link whose parameters carry the given names, in order
    pub fn with_names(
        input_names: Vec<String>,
        from: Vec<ComponentId>,
        to: ComponentId,
        output_name: impl Into<String>,
        using: LinkFn,
    ) -> Result<Self> {
        let inputs = bind_inputs(input_names, from)?;
        using.check(inputs.len())?;
        if inputs.values().any(|cid| *cid == to) {
            return Err(DataError::InvalidLink("a link cannot output one of its inputs".to_string()));
        }
        Ok(Self {
            inputs,
            output: to,
            output_name: output_name.into(),
            using,
            inverse: None,
            description: String::new(),
        })
    }

    /// `to` is the same quantity as `from`
    pub fn identity(from: ComponentId, to: ComponentId) -> Result<Self> {
        Ok(Self::new(vec![from], to, functions::identity())?
            .with_inverse(functions::identity())
            .with_description("identity"))
    }

    /// Attach an inverse. Only single-input links can be inverted.
    pub fn with_inverse(mut self, inverse: LinkFn) -> Self {
        self.inverse = Some(inverse);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn from_ids(&self) -> Vec<ComponentId> {
        self.inputs.values().copied().collect()
    }

    pub fn to_id(&self) -> ComponentId {
        self.output
    }

    /// Ordered parameter name to component binding
    pub fn inputs(&self) -> &IndexMap<String, ComponentId> {
        &self.inputs
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.keys().map(|k| k.as_str()).collect()
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn using(&self) -> &LinkFn {
        &self.using
    }

    pub fn inverse(&self) -> Option<&LinkFn> {
        self.inverse.as_ref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Replace the forward function. It must accept the bound inputs.
    pub fn set_using(&mut self, using: LinkFn) -> Result<()> {
        using.check(self.inputs.len())?;
        self.using = using;
        Ok(())
    }

    pub fn set_inverse(&mut self, inverse: Option<LinkFn>) {
        self.inverse = inverse;
    }

    /// The reverse link `to -> from`, when an inverse exists and there is
    /// exactly one input
    pub fn inverse_link(&self) -> Option<ComponentLink> {
        let inverse = self.inverse.clone()?;
        if self.inputs.len() != 1 || !inverse.accepts(1) {
            return None;
        }
        let (name, from) = self.inputs.iter().next()?;
        let mut inputs = IndexMap::new();
        inputs.insert(self.output_name.clone(), self.output);
        Some(ComponentLink {
            inputs,
            output: *from,
            output_name: name.clone(),
            using: inverse,
            inverse: Some(self.using.clone()),
            description: self.description.clone(),
        })
    }

    /// Apply the function to resolved input arrays
    pub fn compute(&self, inputs: &[ArrayD<f64>]) -> Result<ArrayD<f64>> {
        if inputs.len() != self.inputs.len() {
            return Err(DataError::InvalidLink(format!(
                "expected {} inputs, got {}",
                self.inputs.len(),
                inputs.len()
            )));
        }
        check_shapes(inputs)?;
        let output = self.using.call(inputs)?;
        if let Some(first) = inputs.first() {
            if output.shape() != first.shape() {
                return Err(DataError::ShapeMismatch {
                    expected: first.shape().to_vec(),
                    found: output.shape().to_vec(),
                });
            }
        }
        Ok(output)
    }
}

impl fmt::Debug for ComponentLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentLink")
            .field("inputs", &self.inputs)
            .field("output", &self.output)
            .field("invertible", &self.inverse.is_some())
            .field("description", &self.description)
            .finish()
    }
}

/// A helper deriving several outputs from several inputs at once
#[derive(Clone)]
pub struct LinkHelper {
    inputs: IndexMap<String, ComponentId>,
    outputs: IndexMap<String, ComponentId>,
    forward: MultiLinkFn,
    backward: Option<MultiLinkFn>,
    description: String,
}

impl LinkHelper {
    pub fn new(
        input_names: Vec<String>,
        from: Vec<ComponentId>,
        output_names: Vec<String>,
        to: Vec<ComponentId>,
        forward: MultiLinkFn,
    ) -> Result<Self> {
        Ok(Self {
            inputs: bind_inputs(input_names, from)?,
            outputs: bind_inputs(output_names, to)?,
            forward,
            backward: None,
            description: String::new(),
        })
    }

    /// Attach the reverse transform, which maps outputs back onto inputs
    pub fn with_backward(mut self, backward: MultiLinkFn) -> Self {
        self.backward = Some(backward);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn from_ids(&self) -> Vec<ComponentId> {
        self.inputs.values().copied().collect()
    }

    pub fn to_ids(&self) -> Vec<ComponentId> {
        self.outputs.values().copied().collect()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_forward(&mut self, forward: MultiLinkFn) {
        self.forward = forward;
    }

    /// One single-output link per derived component, in both directions when
    /// a backward transform exists
    pub fn component_links(&self) -> Vec<ComponentLink> {
        let mut links = Self::project(&self.inputs, &self.outputs, &self.forward, &self.description);
        if let Some(backward) = &self.backward {
            links.extend(Self::project(&self.outputs, &self.inputs, backward, &self.description));
        }
        links
    }

    fn project(
        inputs: &IndexMap<String, ComponentId>,
        outputs: &IndexMap<String, ComponentId>,
        function: &MultiLinkFn,
        description: &str,
    ) -> Vec<ComponentLink> {
        outputs
            .iter()
            .enumerate()
            .map(|(index, (name, output))| {
                let function = function.clone();
                ComponentLink {
                    inputs: inputs.clone(),
                    output: *output,
                    output_name: name.clone(),
                    using: link_fn(inputs.len(), move |values| {
                        let mut results = function(values);
                        if index < results.len() {
                            results.swap_remove(index)
                        } else {
                            // Missing output: propagate NaNs rather than panic
                            values[0].mapv(|_| f64::NAN)
                        }
                    }),
                    inverse: None,
                    description: description.to_string(),
                }
            })
            .collect()
    }
}

impl fmt::Debug for LinkHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkHelper")
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("invertible", &self.backward.is_some())
            .field("description", &self.description)
            .finish()
    }
}

/// A link registered in a collection
#[derive(Debug, Clone)]
pub enum Link {
    Function(ComponentLink),
    Helper(LinkHelper),
}

impl Link {
    /// Declare that two components are the same quantity, in both directions
    pub fn same(a: ComponentId, b: ComponentId) -> Result<Self> {
        Ok(Link::Function(ComponentLink::identity(a, b)?))
    }

    pub fn from_ids(&self) -> Vec<ComponentId> {
        match self {
            Link::Function(link) => link.from_ids(),
            Link::Helper(helper) => helper.from_ids(),
        }
    }

    pub fn to_ids(&self) -> Vec<ComponentId> {
        match self {
            Link::Function(link) => vec![link.to_id()],
            Link::Helper(helper) => helper.to_ids(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Link::Function(link) => link.description(),
            Link::Helper(helper) => helper.description(),
        }
    }

    /// Datasets the inputs belong to, in first-seen order
    pub fn data_in(&self) -> Vec<DataId> {
        unique_parents(self.from_ids())
    }

    /// Datasets the outputs belong to, in first-seen order
    pub fn data_out(&self) -> Vec<DataId> {
        unique_parents(self.to_ids())
    }

    /// Whether any input or output belongs to `data`
    pub fn references_data(&self, data: DataId) -> bool {
        self.from_ids()
            .iter()
            .chain(self.to_ids().iter())
            .any(|cid| cid.parent() == data)
    }

    /// Whether the link connects `a` and `b`, in either direction
    pub fn connects(&self, a: DataId, b: DataId) -> bool {
        let data_in = self.data_in();
        let data_out = self.data_out();
        (data_in.contains(&a) && data_out.contains(&b)) || (data_in.contains(&b) && data_out.contains(&a))
    }

    /// Single-output links the resolver can follow, including inverses
    pub fn component_links(&self) -> Vec<ComponentLink> {
        match self {
            Link::Function(link) => {
                let mut links = vec![link.clone()];
                links.extend(link.inverse_link());
                links
            }
            Link::Helper(helper) => helper.component_links(),
        }
    }
}

impl From<ComponentLink> for Link {
    fn from(link: ComponentLink) -> Self {
        Link::Function(link)
    }
}

impl From<LinkHelper> for Link {
    fn from(helper: LinkHelper) -> Self {
        Link::Helper(helper)
    }
}

fn unique_parents(ids: Vec<ComponentId>) -> Vec<DataId> {
    let mut parents = Vec::new();
    for cid in ids {
        if !parents.contains(&cid.parent()) {
            parents.push(cid.parent());
        }
    }
    parents
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, IxDyn};

    fn ids(n: usize) -> (DataId, Vec<ComponentId>) {
        let data = DataId::new();
        (data, (0..n).map(|_| ComponentId::new(data)).collect())
    }

    #[test]
    fn test_arity_mismatch_rejected() {
        let (_, cids) = ids(3);
        let result = ComponentLink::with_names(
            vec!["a".into()],
            vec![cids[0], cids[1]],
            cids[2],
            "out",
            functions::add(),
        );
        assert!(matches!(result, Err(DataError::InvalidLink(_))));
    }

    #[test]
    fn test_function_arity_checked() {
        let (_, cids) = ids(3);
        let too_few = ComponentLink::new(vec![cids[0]], cids[2], functions::subtract());
        assert!(matches!(too_few, Err(DataError::InvalidLink(_))));

        let too_many = ComponentLink::new(vec![cids[0], cids[1]], cids[2], functions::scale(2.0));
        assert!(matches!(too_many, Err(DataError::InvalidLink(_))));

        let mut link = ComponentLink::new(vec![cids[0], cids[1]], cids[2], functions::subtract()).unwrap();
        assert!(link.set_using(functions::identity()).is_err());
        assert!(link.set_using(functions::multiply()).is_ok());
        assert_eq!(functions::add().arity(), None);
        assert_eq!(functions::subtract().arity(), Some(2));
    }

    #[test]
    fn test_call_rejects_wrong_input_count() {
        let values = [arr1(&[1.0]).into_dyn()];
        assert!(functions::subtract().call(&values).is_err());
        assert!(functions::add().call(&[]).is_err());
        assert_eq!(functions::offset(1.0).call(&values).unwrap(), arr1(&[2.0]).into_dyn());
    }

    #[test]
    fn test_named_parameters_keep_order() {
        let (_, cids) = ids(3);
        let link = ComponentLink::with_names(
            vec!["width".into(), "height".into()],
            vec![cids[0], cids[1]],
            cids[2],
            "area",
            functions::multiply(),
        )
        .unwrap();

        assert_eq!(link.input_names(), vec!["width", "height"]);
        assert_eq!(link.inputs()["height"], cids[1]);
        assert_eq!(link.output_name(), "area");
    }

    #[test]
    fn test_compute_add() {
        let (_, cids) = ids(3);
        let link = ComponentLink::new(vec![cids[0], cids[1]], cids[2], functions::add()).unwrap();
        let out = link
            .compute(&[arr1(&[1.0, 2.0]).into_dyn(), arr1(&[10.0, 20.0]).into_dyn()])
            .unwrap();
        assert_eq!(out, arr1(&[11.0, 22.0]).into_dyn());
    }

    #[test]
    fn test_compute_shape_mismatch() {
        let (_, cids) = ids(3);
        let link = ComponentLink::new(vec![cids[0], cids[1]], cids[2], functions::add()).unwrap();
        let result = link.compute(&[ArrayD::zeros(IxDyn(&[2])), ArrayD::zeros(IxDyn(&[3]))]);
        assert!(matches!(result, Err(DataError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_inverse_link() {
        let (_, a) = ids(1);
        let (_, b) = ids(1);
        let link = ComponentLink::new(vec![a[0]], b[0], functions::scale(2.0))
            .unwrap()
            .with_inverse(functions::scale(0.5));

        let inverse = link.inverse_link().unwrap();
        assert_eq!(inverse.to_id(), a[0]);
        assert_eq!(inverse.from_ids(), vec![b[0]]);
        assert_eq!(inverse.compute(&[arr1(&[4.0]).into_dyn()]).unwrap(), arr1(&[2.0]).into_dyn());
    }

    #[test]
    fn test_helper_expands_per_output() {
        let (_, inputs) = ids(2);
        let (out_data, outputs) = ids(2);
        let helper = LinkHelper::new(
            vec!["ra".into(), "dec".into()],
            inputs.clone(),
            vec!["l".into(), "b".into()],
            outputs.clone(),
            Arc::new(|v: &[ArrayD<f64>]| vec![&v[0] + &v[1], &v[0] - &v[1]]),
        )
        .unwrap();

        let link = Link::from(helper);
        assert_eq!(link.data_out(), vec![out_data]);

        let expanded = link.component_links();
        assert_eq!(expanded.len(), 2);
        let values = [arr1(&[3.0]).into_dyn(), arr1(&[1.0]).into_dyn()];
        assert_eq!(expanded[0].compute(&values).unwrap(), arr1(&[4.0]).into_dyn());
        assert_eq!(expanded[1].compute(&values).unwrap(), arr1(&[2.0]).into_dyn());
    }

    #[test]
    fn test_connects_either_direction() {
        let (d1, a) = ids(1);
        let (d2, b) = ids(1);
        let link = Link::same(a[0], b[0]).unwrap();
        assert!(link.connects(d1, d2));
        assert!(link.connects(d2, d1));
        assert!(!link.connects(d1, DataId::new()));
    }
}
