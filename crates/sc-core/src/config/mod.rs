//! Configuration loading for sc-core.
//!
//! This module handles:
//! - Finding scriptcast.json (CLI > env > XDG > /etc > defaults)
//! - Schema checking (shape/type via serde, schema_version)
//! - Semantic validation (ranges, non-empty markers)
//! - A provenance snapshot for startup logging

pub use sc_config::{
    resolve_config, validate_settings, ConfigSnapshot, ConfigSource, Settings, ValidationError,
    CONFIG_SCHEMA_VERSION,
};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl From<ConfigError> for sc_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::VersionMismatch { expected, actual }
            | ConfigError::ValidationError(ValidationError::VersionMismatch { expected, actual }) => {
                sc_common::Error::VersionMismatch { expected, actual }
            }
            ConfigError::ValidationError(ValidationError::InvalidValue { field, message }) => {
                sc_common::Error::InvalidSettings(format!("{}: {}", field, message))
            }
            other => sc_common::Error::Config(other.to_string()),
        }
    }
}

/// Loaded settings with provenance.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub settings: Settings,
    /// File the settings came from (None for built-in defaults).
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
    /// Raw file text, kept for hashing.
    content: Option<String>,
}

impl ResolvedConfig {
    /// Built-in defaults with no file behind them.
    pub fn defaults() -> Self {
        ResolvedConfig {
            settings: Settings::default(),
            path: None,
            source: ConfigSource::BuiltinDefault,
            content: None,
        }
    }

    /// Snapshot for startup logging and `config show`.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot::new(
            &self.settings,
            self.path.as_deref(),
            self.source,
            self.content.as_deref(),
        )
    }
}

/// Load and validate configuration with the standard resolution order.
///
/// An explicit `cli_path` must exist; paths found through the environment
/// or standard directories are only used when present.
pub fn load_config(cli_path: Option<&Path>) -> Result<ResolvedConfig, ConfigError> {
    let resolved = resolve_config(cli_path);

    let Some(path) = resolved.path else {
        return Ok(ResolvedConfig::defaults());
    };

    if !path.exists() {
        return Err(ConfigError::NotFound { path });
    }

    let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
        path: path.clone(),
        source: e,
    })?;

    let settings: Settings =
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            source: e,
        })?;

    if settings.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(ConfigError::VersionMismatch {
            expected: CONFIG_SCHEMA_VERSION.to_string(),
            actual: settings.schema_version.clone(),
        });
    }

    validate_settings(&settings)?;

    Ok(ResolvedConfig {
        settings,
        path: Some(path),
        source: resolved.source,
        content: Some(content),
    })
}
