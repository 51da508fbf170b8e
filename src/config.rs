use crate::constants::DEFAULT_REGION_SIZE;
use crate::error::SignallingError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for one rail graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Edge length of a region in grid cells
    pub region_size: i32,
    /// Queue edits that land in regions the host has not loaded
    pub defer_unloaded_regions: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            region_size: DEFAULT_REGION_SIZE,
            defer_unloaded_regions: false,
        }
    }
}

impl GraphConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from JSON; missing fields fall back to defaults
    ///
    /// # Errors
    ///
    /// Returns `Config` if the JSON is malformed or the region size is not positive.
    pub fn from_json_str(json: &str) -> Result<Self, SignallingError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SignallingError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `Config` if serialization fails.
    pub fn to_json_string(&self) -> Result<String, SignallingError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SignallingError::Config(format!("Failed to serialize config: {e}")))
    }

    /// Load settings from a JSON file, or defaults if the file does not exist
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, SignallingError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)
            .map_err(|e| SignallingError::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// # Errors
    ///
    /// Returns `Config` if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), SignallingError> {
        let json = self.to_json_string()?;
        std::fs::write(path, json)
            .map_err(|e| SignallingError::Config(format!("Failed to write {}: {e}", path.display())))
    }

    fn validate(&self) -> Result<(), SignallingError> {
        if self.region_size <= 0 {
            return Err(SignallingError::Config(format!(
                "region_size must be positive, got {}",
                self.region_size
            )));
        }
        Ok(())
    }
}
