//! Configuration snapshots for startup logging and reproducibility.
//!
//! A snapshot captures the exact configuration in force when a command
//! starts, so log output can be tied back to the file that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::resolve::ConfigSource;
use crate::Settings;

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the configuration.
    pub schema_version: String,

    /// Path the settings were loaded from.
    #[serde(default)]
    pub path: Option<String>,

    /// Source of the configuration.
    pub source: String,

    /// SHA-256 hash of the file content (None for built-in defaults).
    #[serde(default)]
    pub content_hash: Option<String>,

    /// Key configuration values for quick reference.
    pub summary: ConfigSummary,
}

/// Summary of key configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub refresh_interval_ms: u64,
    pub max_scan_records: usize,
    pub validate_timeout_ms: u64,
    pub execute_timeout_ms: u64,
    pub allow_empty_targets: bool,
}

impl ConfigSnapshot {
    /// Build a snapshot for loaded settings.
    ///
    /// `content` is the raw file text when the settings came from disk.
    pub fn new(
        settings: &Settings,
        path: Option<&std::path::Path>,
        source: ConfigSource,
        content: Option<&str>,
    ) -> Self {
        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: settings.schema_version.clone(),
            path: path.map(|p| p.display().to_string()),
            source: source.to_string(),
            content_hash: content.map(hash_content),
            summary: ConfigSummary {
                refresh_interval_ms: settings.refresh.interval_ms,
                max_scan_records: settings.refresh.max_scan_records,
                validate_timeout_ms: settings.boundary.validate_timeout_ms,
                execute_timeout_ms: settings.boundary.execute_timeout_ms,
                allow_empty_targets: settings.dispatch.allow_empty_targets,
            },
        }
    }
}

/// SHA-256 of the given text, hex encoded.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
