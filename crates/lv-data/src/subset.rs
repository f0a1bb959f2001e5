//! Subsets: a selection state bound to one dataset plus display style

use lv_core::{DataId, SubsetId};
use serde::{Deserialize, Serialize};

use crate::subset_state::{CombineMode, SubsetState};

/// Display settings carried alongside a subset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsetStyle {
    /// RGBA color
    pub color: [u8; 4],
    pub alpha: f32,
    pub marker_size: f32,
    pub visible: bool,
}

impl Default for SubsetStyle {
    fn default() -> Self {
        Self {
            color: [228, 26, 28, 255],
            alpha: 0.5,
            marker_size: 3.0,
            visible: true,
        }
    }
}

/// A [`SubsetState`] owned by one dataset
#[derive(Debug, Clone)]
pub struct Subset {
    id: SubsetId,
    label: String,
    data: DataId,
    state: SubsetState,
    style: SubsetStyle,
}

impl Subset {
    pub fn new(data: DataId, label: impl Into<String>, state: SubsetState) -> Self {
        Self {
            id: SubsetId::new(),
            label: label.into(),
            data,
            state,
            style: SubsetStyle::default(),
        }
    }

    pub fn with_style(mut self, style: SubsetStyle) -> Self {
        self.style = style;
        self
    }

    pub fn id(&self) -> SubsetId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Owning dataset
    pub fn data(&self) -> DataId {
        self.data
    }

    pub fn state(&self) -> &SubsetState {
        &self.state
    }

    pub fn style(&self) -> &SubsetStyle {
        &self.style
    }

    pub fn style_mut(&mut self) -> &mut SubsetStyle {
        &mut self.style
    }

    /// Replace the state, returning the previous one
    pub fn set_state(&mut self, state: SubsetState) -> SubsetState {
        std::mem::replace(&mut self.state, state)
    }

    /// Merge a new selection into the current state. Returns the previous state.
    pub fn apply_state(&mut self, state: SubsetState, mode: CombineMode) -> SubsetState {
        let combined = mode.combine(&self.state, state);
        self.set_state(combined)
    }
}
