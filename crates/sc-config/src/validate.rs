//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::settings::Settings;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Shortest accepted refresh interval.
pub const MIN_REFRESH_INTERVAL_MS: u64 = 10;
/// Longest accepted refresh interval.
pub const MAX_REFRESH_INTERVAL_MS: u64 = 60_000;
/// Largest accepted sentinel scan bound.
pub const MAX_SCAN_RECORDS_LIMIT: usize = 1 << 20;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::InvalidValue { .. } => 11,
            ValidationError::VersionMismatch { .. } => 12,
        }
    }

    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate settings semantically.
pub fn validate_settings(settings: &Settings) -> ValidationResult<()> {
    if settings.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: settings.schema_version.clone(),
        });
    }

    let interval = settings.refresh.interval_ms;
    if !(MIN_REFRESH_INTERVAL_MS..=MAX_REFRESH_INTERVAL_MS).contains(&interval) {
        return Err(ValidationError::invalid(
            "refresh.interval_ms",
            format!(
                "must be between {} and {}, got {}",
                MIN_REFRESH_INTERVAL_MS, MAX_REFRESH_INTERVAL_MS, interval
            ),
        ));
    }

    let bound = settings.refresh.max_scan_records;
    if bound == 0 || bound > MAX_SCAN_RECORDS_LIMIT {
        return Err(ValidationError::invalid(
            "refresh.max_scan_records",
            format!("must be between 1 and {}, got {}", MAX_SCAN_RECORDS_LIMIT, bound),
        ));
    }

    if settings.boundary.validate_timeout_ms == 0 {
        return Err(ValidationError::invalid(
            "boundary.validate_timeout_ms",
            "must be at least 1",
        ));
    }
    if settings.boundary.execute_timeout_ms == 0 {
        return Err(ValidationError::invalid(
            "boundary.execute_timeout_ms",
            "must be at least 1",
        ));
    }

    let marker = &settings.boundary.success_marker;
    if marker.is_empty() {
        return Err(ValidationError::invalid(
            "boundary.success_marker",
            "must not be empty",
        ));
    }
    if marker.contains('\0') {
        return Err(ValidationError::invalid(
            "boundary.success_marker",
            "must not contain NUL",
        ));
    }

    if let Some(lib) = &settings.boundary.library_path {
        if lib.trim().is_empty() {
            return Err(ValidationError::invalid(
                "boundary.library_path",
                "must not be blank when set",
            ));
        }
    }

    Ok(())
}
