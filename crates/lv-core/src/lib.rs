//! Core building blocks for the linked-data model
//!
//! This crate provides the identifiers, the change-notification hub, the
//! undo/redo command stack and the shared settings used by `lv-data`.

pub mod command;
pub mod events;
pub mod ids;
pub mod settings;

// Re-export commonly used types
pub use command::{Command, CommandArgs, CommandError, CommandStack};
pub use events::{messages, Hub, Message, SubscriptionId};
pub use ids::{ComponentId, DataId, LinkId, SubsetId};
pub use settings::CoreSettings;
