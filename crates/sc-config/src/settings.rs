//! Settings types.
//!
//! Every section has a default so a partial scriptcast.json only overrides
//! what it names.

use serde::{Deserialize, Serialize};

/// Complete scriptcast configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub schema_version: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub refresh: RefreshSettings,

    #[serde(default)]
    pub boundary: BoundarySettings,

    #[serde(default)]
    pub dispatch: DispatchSettings,
}

/// Periodic client refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    /// Interval between refresh ticks (milliseconds).
    pub interval_ms: u64,
    /// Hard upper bound on records scanned while looking for the sentinel.
    pub max_scan_records: usize,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            max_scan_records: 4096,
        }
    }
}

/// Native boundary call limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundarySettings {
    pub validate_timeout_ms: u64,
    pub execute_timeout_ms: u64,
    /// Literal status text the validator returns for a well-formed script.
    pub success_marker: String,
    /// Native bridge library to load (platform default name when unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_path: Option<String>,
}

impl Default for BoundarySettings {
    fn default() -> Self {
        Self {
            validate_timeout_ms: 5000,
            execute_timeout_ms: 5000,
            success_marker: "success".to_string(),
            library_path: None,
        }
    }
}

/// Dispatch behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Hand an empty target list to the executor instead of failing.
    pub allow_empty_targets: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            allow_empty_targets: true,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            description: None,
            refresh: RefreshSettings::default(),
            boundary: BoundarySettings::default(),
            dispatch: DispatchSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::validate::ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::validate::ValidationError::IoError(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::parse_json(&content)
    }

    /// Parse settings from a JSON string.
    pub fn parse_json(json: &str) -> Result<Self, crate::validate::ValidationError> {
        serde_json::from_str(json).map_err(|e| {
            crate::validate::ValidationError::ParseError(format!("Invalid JSON: {}", e))
        })
    }

    pub fn refresh_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.refresh.interval_ms)
    }

    pub fn validate_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.boundary.validate_timeout_ms)
    }

    pub fn execute_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.boundary.execute_timeout_ms)
    }
}
