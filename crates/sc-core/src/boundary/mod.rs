//! Contract with the external client bridge.
//!
//! The bridge owns every client process. It is reached through four calls:
//!
//! - `Initialize()`, once, before anything else
//! - enumerate: a sentinel-terminated array of `{name, id}` records
//! - validate: single-byte script text in, heap status text out
//! - execute: UTF-8 script text plus single-byte target names, no result
//!
//! The traits here describe those calls in owned Rust types. [`raw`] holds
//! the C layout and encodings, [`guard`] puts a deadline on a call, and
//! `native` (feature `native`) loads the real bridge at runtime.

pub mod guard;
pub mod raw;

#[cfg(feature = "native")]
pub mod native;

use std::sync::Arc;
use std::time::Duration;

use sc_common::ClientRecord;
use sc_config::BoundarySettings;
use thiserror::Error;

/// One of the bridge entry points, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundaryCall {
    Initialize,
    Enumerate,
    Validate,
    Execute,
}

impl BoundaryCall {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundaryCall::Initialize => "initialize",
            BoundaryCall::Enumerate => "enumerate",
            BoundaryCall::Validate => "validate",
            BoundaryCall::Execute => "execute",
        }
    }
}

impl std::fmt::Display for BoundaryCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single bridge call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoundaryError {
    #[error("native boundary unavailable: {0}")]
    Unavailable(String),

    #[error("{call} call failed: {reason}")]
    CallFailed { call: BoundaryCall, reason: String },

    #[error("{call} call timed out after {}ms", .after.as_millis())]
    TimedOut { call: BoundaryCall, after: Duration },
}

impl BoundaryError {
    pub fn call_failed(call: BoundaryCall, reason: impl Into<String>) -> Self {
        BoundaryError::CallFailed {
            call,
            reason: reason.into(),
        }
    }
}

impl From<BoundaryError> for sc_common::Error {
    fn from(err: BoundaryError) -> Self {
        match err {
            BoundaryError::Unavailable(reason) => sc_common::Error::BoundaryUnavailable(reason),
            BoundaryError::TimedOut { call, after } => sc_common::Error::BoundaryTimeout {
                call: call.to_string(),
                millis: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
            },
            BoundaryError::CallFailed { call, reason } => match call {
                BoundaryCall::Enumerate => sc_common::Error::Enumeration(reason),
                BoundaryCall::Validate => sc_common::Error::ValidatorUnreachable(reason),
                BoundaryCall::Execute => sc_common::Error::ExecutorUnreachable(reason),
                BoundaryCall::Initialize => sc_common::Error::BoundaryUnavailable(reason),
            },
        }
    }
}

/// The enumerator could not produce a usable snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnumerationError {
    #[error("enumerate call failed: {0}")]
    Unreachable(String),

    #[error("enumerate call failed: client list has no terminator within {scanned} records")]
    Unterminated { scanned: usize },

    #[error("enumerate call failed: client list pointer is null")]
    NullRecordPointer,
}

impl From<BoundaryError> for EnumerationError {
    fn from(err: BoundaryError) -> Self {
        match err {
            BoundaryError::CallFailed { reason, .. } => EnumerationError::Unreachable(reason),
            other => EnumerationError::Unreachable(other.to_string()),
        }
    }
}

impl From<EnumerationError> for sc_common::Error {
    fn from(err: EnumerationError) -> Self {
        let reason = match err {
            EnumerationError::Unreachable(reason) => reason,
            EnumerationError::Unterminated { scanned } => {
                format!("client list has no terminator within {} records", scanned)
            }
            EnumerationError::NullRecordPointer => "client list pointer is null".to_string(),
        };
        sc_common::Error::Enumeration(reason)
    }
}

/// Produces the current client snapshot.
pub trait Enumerator: Send + Sync {
    /// Read one snapshot, scanning at most `max_records` records for the
    /// terminator. Records come back in bridge order, blank names included.
    fn enumerate(&self, max_records: usize) -> Result<Vec<ClientRecord>, EnumerationError>;
}

/// Remote compile check.
pub trait Validator: Send + Sync {
    /// Hand single-byte script text to the validator and return its status
    /// text. The success marker comparison is the caller's job.
    fn validate(&self, source: &[u8]) -> Result<String, BoundaryError>;
}

/// Fire-and-forget script execution.
pub trait Executor: Send + Sync {
    /// `source` is UTF-8; each target is a single-byte encoded client name.
    fn execute(&self, source: &[u8], targets: &[Vec<u8>]) -> Result<(), BoundaryError>;
}

/// The complete bridge.
pub trait Boundary: Enumerator + Validator + Executor {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// One-time setup. Implementations make repeat calls harmless.
    fn initialize(&self) -> Result<(), BoundaryError>;
}

/// Open the bridge this build supports.
///
/// Builds without the `native` feature have no bridge and always return
/// [`BoundaryError::Unavailable`].
pub fn open(settings: &BoundarySettings) -> Result<Arc<dyn Boundary>, BoundaryError> {
    #[cfg(feature = "native")]
    {
        let path = settings
            .library_path
            .clone()
            .unwrap_or_else(native::default_library_name);
        let boundary = native::NativeBoundary::load(&path)?;
        boundary.initialize()?;
        Ok(Arc::new(boundary))
    }

    #[cfg(not(feature = "native"))]
    {
        let _ = settings;
        Err(BoundaryError::Unavailable(
            "sc-core was built without the native feature".to_string(),
        ))
    }
}
