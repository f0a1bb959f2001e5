//! Shared settings for resolution, subsets, histograms and command history

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading settings
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreSettings {
    /// Link resolution settings
    pub resolution: ResolutionSettings,

    /// Subset state defaults
    pub subsets: SubsetSettings,

    /// Histogram defaults
    pub histogram: HistogramSettings,

    /// Undo/redo settings
    pub history: HistorySettings,
}

/// How component requests are resolved through links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionSettings {
    /// Upper bound on link hops for one request. `None` bounds the search by
    /// the number of registered links.
    pub max_link_hops: Option<usize>,

    /// Prefer links whose inputs are available without further hops
    pub prefer_direct_links: bool,
}

/// Defaults applied when building subset states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubsetSettings {
    /// Whether range states include their bounds
    pub inclusive_ranges: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramSettings {
    pub default_bins: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Maximum number of undoable commands, unbounded if `None`
    pub max_commands: Option<usize>,
}

impl Default for ResolutionSettings {
    fn default() -> Self {
        Self {
            max_link_hops: None,
            prefer_direct_links: true,
        }
    }
}

impl Default for SubsetSettings {
    fn default() -> Self {
        Self {
            inclusive_ranges: true,
        }
    }
}

impl Default for HistogramSettings {
    fn default() -> Self {
        Self { default_bins: 10 }
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { max_commands: None }
    }
}

impl CoreSettings {
    /// Parse settings from a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!("Loading settings from {}", path.as_ref().display());
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.histogram.default_bins == 0 {
            return Err(SettingsError::Invalid {
                field: "histogram.default_bins",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.resolution.max_link_hops == Some(0) {
            return Err(SettingsError::Invalid {
                field: "resolution.max_link_hops",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = CoreSettings::from_json_str(r#"{"histogram": {"default_bins": 32}}"#).unwrap();
        assert_eq!(settings.histogram.default_bins, 32);
        assert!(settings.resolution.prefer_direct_links);
        assert!(settings.subsets.inclusive_ranges);
    }

    #[test]
    fn test_zero_bins_rejected() {
        let err = CoreSettings::from_json_str(r#"{"histogram": {"default_bins": 0}}"#);
        assert!(matches!(err, Err(SettingsError::Invalid { .. })));
    }

    #[test]
    fn test_round_trip_through_json() {
        let mut settings = CoreSettings::default();
        settings.history.max_commands = Some(50);
        let json = settings.to_json_string().unwrap();
        assert_eq!(CoreSettings::from_json_str(&json).unwrap(), settings);
    }
}
