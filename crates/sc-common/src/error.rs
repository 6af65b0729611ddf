//! Error types for Scriptcast.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Validator Unreachable
//!   Reason: validate call failed: timed out after 5000ms
//!   Fix: Check that the native library is loaded and responsive, then retry.
//! ```
//!
//! # Machine-Facing Output
//!
//! ```json
//! {
//!   "code": 21,
//!   "category": "selection",
//!   "message": "client 7 is not tracked",
//!   "recoverable": false,
//!   "suggested_action": "refresh",
//!   "context": { "client_id": 7 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for Scriptcast operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file errors.
    Config,
    /// Client enumeration errors.
    Enumeration,
    /// Operator selection errors.
    Selection,
    /// Script validation errors.
    Validation,
    /// Script execution errors.
    Execution,
    /// File I/O and serialization errors.
    Io,
    /// Native boundary availability.
    Platform,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Enumeration => write!(f, "enumeration"),
            ErrorCategory::Selection => write!(f, "selection"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Execution => write!(f, "execution"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Platform => write!(f, "platform"),
        }
    }
}

/// Suggested follow-up for callers that automate around errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the operation.
    Retry,
    /// Wait for the next refresh tick and look again.
    Refresh,
    /// Fix the script and dispatch again.
    FixScript,
    /// Run configuration validation.
    RunCheck,
    /// Select at least one client.
    SelectClients,
    /// Manual intervention required.
    ManualIntervention,
    /// Abort the operation.
    Abort,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::Refresh => write!(f, "refresh"),
            SuggestedAction::FixScript => write!(f, "fix_script"),
            SuggestedAction::RunCheck => write!(f, "run_check"),
            SuggestedAction::SelectClients => write!(f, "select_clients"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
            SuggestedAction::Abort => write!(f, "abort"),
        }
    }
}

/// Unified error type for Scriptcast.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },

    // Enumeration / registry errors (20-29)
    #[error("enumerate call failed: {0}")]
    Enumeration(String),

    #[error("client {id} is not tracked")]
    UnknownClient { id: i32 },

    // Validation errors (30-39)
    #[error("{diagnostic}")]
    CompileRejected { diagnostic: String },

    #[error("validate call failed: {0}")]
    ValidatorUnreachable(String),

    // Execution errors (40-49)
    #[error("execute call failed: {0}")]
    ExecutorUnreachable(String),

    #[error("no clients selected")]
    EmptyTargets,

    #[error("{call} call timed out after {millis}ms")]
    BoundaryTimeout { call: String, millis: u64 },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Platform errors (70-79)
    #[error("native boundary unavailable: {0}")]
    BoundaryUnavailable(String),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Enumeration and selection errors
    /// - 30-39: Validation errors
    /// - 40-49: Execution errors
    /// - 60-69: I/O errors
    /// - 70-79: Platform errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidSettings(_) => 11,
            Error::VersionMismatch { .. } => 12,
            Error::Enumeration(_) => 20,
            Error::UnknownClient { .. } => 21,
            Error::CompileRejected { .. } => 30,
            Error::ValidatorUnreachable(_) => 31,
            Error::ExecutorUnreachable(_) => 40,
            Error::EmptyTargets => 41,
            Error::BoundaryTimeout { .. } => 42,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::BoundaryUnavailable(_) => 70,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidSettings(_) | Error::VersionMismatch { .. } => {
                ErrorCategory::Config
            }

            Error::Enumeration(_) => ErrorCategory::Enumeration,
            Error::UnknownClient { .. } => ErrorCategory::Selection,

            Error::CompileRejected { .. } | Error::ValidatorUnreachable(_) => {
                ErrorCategory::Validation
            }

            Error::ExecutorUnreachable(_) | Error::EmptyTargets | Error::BoundaryTimeout { .. } => {
                ErrorCategory::Execution
            }

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,

            Error::BoundaryUnavailable(_) => ErrorCategory::Platform,
        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) => true,
            Error::InvalidSettings(_) => true,
            Error::VersionMismatch { .. } => true,

            // The next periodic tick retries enumeration on its own.
            Error::Enumeration(_) => true,
            Error::UnknownClient { .. } => false,

            Error::CompileRejected { .. } => true,
            Error::ValidatorUnreachable(_) => true,

            Error::ExecutorUnreachable(_) => true,
            Error::EmptyTargets => true,
            Error::BoundaryTimeout { .. } => true,

            Error::Io(_) => true,
            Error::Json(_) => true,

            Error::BoundaryUnavailable(_) => false,
        }
    }

    /// Returns the suggested follow-up.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) => SuggestedAction::RunCheck,
            Error::InvalidSettings(_) => SuggestedAction::RunCheck,
            Error::VersionMismatch { .. } => SuggestedAction::RunCheck,

            Error::Enumeration(_) => SuggestedAction::Refresh,
            Error::UnknownClient { .. } => SuggestedAction::Refresh,

            Error::CompileRejected { .. } => SuggestedAction::FixScript,
            Error::ValidatorUnreachable(_) => SuggestedAction::Retry,

            Error::ExecutorUnreachable(_) => SuggestedAction::Retry,
            Error::EmptyTargets => SuggestedAction::SelectClients,
            Error::BoundaryTimeout { .. } => SuggestedAction::Retry,

            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::ManualIntervention,

            Error::BoundaryUnavailable(_) => SuggestedAction::Abort,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => {
                "Run 'sc-core config check' to validate configuration, or check syntax in scriptcast.json."
            }
            Error::InvalidSettings(_) => {
                "Fix the reported field in scriptcast.json or remove it to fall back to the default."
            }
            Error::VersionMismatch { .. } => {
                "Update schema_version in scriptcast.json to the version this build expects."
            }

            Error::Enumeration(_) => {
                "The client list could not be read. It is retried on the next refresh tick."
            }
            Error::UnknownClient { .. } => {
                "The client exited or was never listed. Run 'sc-core clients' to see current ids."
            }

            Error::CompileRejected { .. } => "Fix the reported compile error and dispatch again.",
            Error::ValidatorUnreachable(_) => {
                "Check that the native library is loaded and responsive, then retry."
            }

            Error::ExecutorUnreachable(_) => {
                "The script was valid but could not be handed to the executor. Retry the dispatch."
            }
            Error::EmptyTargets => {
                "Select at least one client, or set dispatch.allow_empty_targets to true."
            }
            Error::BoundaryTimeout { .. } => {
                "The native call did not return in time. Raise the boundary timeout or retry."
            }

            Error::Io(_) => "Check that the script file exists and is readable. Retry the operation.",
            Error::Json(_) => {
                "Invalid JSON in file. Check syntax with 'cat <file> | jq .' or restore from backup."
            }

            Error::BoundaryUnavailable(_) => {
                "This build has no native library linked. Rebuild with '--features native'."
            }
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidSettings(_) => "Invalid Settings",
            Error::VersionMismatch { .. } => "Schema Version Mismatch",

            Error::Enumeration(_) => "Enumeration Failed",
            Error::UnknownClient { .. } => "Unknown Client",

            Error::CompileRejected { .. } => "Compiler Error",
            Error::ValidatorUnreachable(_) => "Validator Unreachable",

            Error::ExecutorUnreachable(_) => "Executor Unreachable",
            Error::EmptyTargets => "No Clients Selected",
            Error::BoundaryTimeout { .. } => "Boundary Timeout",

            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",

            Error::BoundaryUnavailable(_) => "Native Boundary Unavailable",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested follow-up.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (e.g., client id, timeout).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::UnknownClient { id } => {
                context.insert("client_id".to_string(), serde_json::json!(id));
            }
            Error::BoundaryTimeout { call, millis } => {
                context.insert("call".to_string(), serde_json::json!(call));
                context.insert("timeout_ms".to_string(), serde_json::json!(millis));
            }
            Error::VersionMismatch { expected, actual } => {
                context.insert("expected".to_string(), serde_json::json!(expected));
                context.insert("actual".to_string(), serde_json::json!(actual));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for human-readable stderr output.
///
/// Compile rejections print the validator's diagnostic verbatim with no
/// decoration beyond the headline; everything else gets a reason and fix.
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    if let Error::CompileRejected { diagnostic } = err {
        return format!(
            "{red}✗{reset} {headline}\n{diagnostic}",
            red = red,
            reset = reset,
            headline = err.headline(),
            diagnostic = diagnostic
        );
    }

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
