//! Opaque identifiers shared by every crate in the workspace.
//!
//! Identity is never derived from labels: two components called `x` on two
//! datasets are distinct ids, and renaming a component keeps its id.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a dataset inside a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataId(Uuid);

impl DataId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DataId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{}", short(&self.0))
    }
}

/// Identifier of a single field scoped to exactly one parent dataset.
///
/// The parent is part of the identity and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId {
    uid: Uuid,
    parent: DataId,
}

impl ComponentId {
    /// Mint a fresh id owned by `parent`
    pub fn new(parent: DataId) -> Self {
        Self {
            uid: Uuid::new_v4(),
            parent,
        }
    }

    /// The dataset this id belongs to
    pub fn parent(&self) -> DataId {
        self.parent
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cid:{}@{}", short(&self.uid), short(&self.parent.0))
    }
}

/// Identifier of a subset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubsetId(Uuid);

impl SubsetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubsetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubsetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subset:{}", short(&self.0))
    }
}

/// Identifier of a link registered in a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkId(Uuid);

impl LinkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link:{}", short(&self.0))
    }
}

fn short(uuid: &Uuid) -> String {
    let mut s = uuid.simple().to_string();
    s.truncate(8);
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_ids_are_unique_per_parent() {
        let data = DataId::new();
        let a = ComponentId::new(data);
        let b = ComponentId::new(data);

        assert_ne!(a, b);
        assert_eq!(a.parent(), data);
        assert_eq!(b.parent(), data);
    }

    #[test]
    fn test_display_is_short() {
        let data = DataId::new();
        let text = data.to_string();
        assert!(text.starts_with("data:"));
        assert_eq!(text.len(), "data:".len() + 8);
    }
}
