//! Scriptcast common types, IDs, and errors.
//!
//! This crate provides foundational types shared across sc-core modules:
//! - Client identity and snapshot record types
//! - Common error types with stable codes
//! - Output format specifications

pub mod error;
pub mod id;
pub mod output;

pub use error::{
    format_error_human, Error, ErrorCategory, Result, StructuredError, SuggestedAction,
};
pub use id::{ClientId, ClientRecord};
pub use output::OutputFormat;

/// Schema version stamped on JSON payloads emitted by sc-core.
pub const SCHEMA_VERSION: &str = "1.0.0";
