//! Session files describing datasets, links and subsets to build

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use lv_core::{CommandStack, ComponentId, CoreSettings, DataId};
use lv_data::{
    functions, AddData, AddLink, ComponentLink, CsvConfig, Data, DataCollection, LinkFn, NewSubset,
};
use serde::Deserialize;

/// Top-level session document
#[derive(Debug, Deserialize)]
pub struct SessionFile {
    #[serde(default)]
    pub settings: CoreSettings,

    pub datasets: Vec<DatasetSpec>,

    #[serde(default)]
    pub links: Vec<LinkSpec>,

    #[serde(default)]
    pub subsets: Vec<SubsetSpec>,

    #[serde(default)]
    pub histograms: Vec<HistogramSpec>,
}

/// One dataset, read from CSV or given inline
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DatasetSpec {
    Csv { csv: CsvConfig },
    Inline { label: String, columns: Vec<ColumnSpec> },
}

#[derive(Debug, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub values: Vec<f64>,
}

/// Link function names accepted in session files
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionSpec {
    Identity,
    Add,
    Subtract,
    Multiply,
    Scale(f64),
    Offset(f64),
}

impl FunctionSpec {
    fn link_fn(self) -> LinkFn {
        match self {
            FunctionSpec::Identity => functions::identity(),
            FunctionSpec::Add => functions::add(),
            FunctionSpec::Subtract => functions::subtract(),
            FunctionSpec::Multiply => functions::multiply(),
            FunctionSpec::Scale(factor) => functions::scale(factor),
            FunctionSpec::Offset(delta) => functions::offset(delta),
        }
    }
}

/// Link between components named as `dataset.component`
#[derive(Debug, Deserialize)]
pub struct LinkSpec {
    pub from: Vec<String>,
    pub to: String,
    #[serde(default = "default_function")]
    pub function: FunctionSpec,
}

fn default_function() -> FunctionSpec {
    FunctionSpec::Identity
}

/// Range subset created on `data`
#[derive(Debug, Deserialize)]
pub struct SubsetSpec {
    pub label: String,
    pub data: String,
    pub component: String,
    pub lo: f64,
    pub hi: f64,
}

#[derive(Debug, Deserialize)]
pub struct HistogramSpec {
    pub data: String,
    pub component: String,
    pub bins: Option<usize>,
}

impl SessionFile {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("Invalid session file {}", path.display()))
    }

    /// Run every dataset, link and subset as a command so the build can be
    /// unwound step by step.
    pub fn build(&self) -> Result<CommandStack<DataCollection>> {
        let mut stack = CommandStack::new(DataCollection::with_settings(self.settings.clone()))
            .with_max_history(self.settings.history.max_commands);

        for spec in &self.datasets {
            let data = match spec {
                DatasetSpec::Csv { csv } => lv_data::read_csv_with(csv)
                    .with_context(|| format!("Failed to load {}", csv.path.display()))?,
                DatasetSpec::Inline { label, columns } => {
                    let columns: Vec<(String, Vec<f64>)> =
                        columns.iter().map(|c| (c.name.clone(), c.values.clone())).collect();
                    Data::from_columns(label.clone(), columns)?
                }
            };
            stack.do_command(Box::new(AddData::new(data)))?;
        }

        for spec in &self.links {
            let from = spec
                .from
                .iter()
                .map(|name| find_component(stack.session(), name))
                .collect::<Result<Vec<_>>>()?;
            let to = find_component(stack.session(), &spec.to)?;
            let link = ComponentLink::new(from, to, spec.function.link_fn())
                .with_context(|| format!("Invalid link to '{}'", spec.to))?;
            stack.do_command(Box::new(AddLink::new(link)))?;
        }

        for spec in &self.subsets {
            let dc = stack.session();
            let data = find_data(dc, &spec.data)?;
            let state = dc.range_state(find_component(dc, &spec.component)?, spec.lo, spec.hi);
            stack.do_command(Box::new(NewSubset::new(data, spec.label.clone(), state)))?;
        }

        tracing::info!(
            "Session built: {} datasets, {} links, {} subsets",
            stack.session().len(),
            self.links.len(),
            self.subsets.len()
        );
        Ok(stack)
    }
}

pub fn find_data(dc: &DataCollection, label: &str) -> Result<DataId> {
    dc.find_by_label(label)
        .map(|d| d.id())
        .ok_or_else(|| anyhow!("No dataset named '{}'", label))
}

/// Look up `dataset.component`
pub fn find_component(dc: &DataCollection, name: &str) -> Result<ComponentId> {
    let Some((data, component)) = name.rsplit_once('.') else {
        bail!("Component '{}' should be written as dataset.component", name);
    };
    let data = dc.data(find_data(dc, data)?)?;
    Ok(data.id_for(component)?)
}
