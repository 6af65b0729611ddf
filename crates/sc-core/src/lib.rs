//! Scriptcast Core Library
//!
//! This library provides the core functionality for scriptcast:
//! - The native bridge contract and its adapters
//! - The client registry and its periodic refresh
//! - Validate-then-execute script dispatch
//! - The interactive operator console
//! - Configuration loading, logging and exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod boundary;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod exit_codes;
pub mod logging;
pub mod poller;
pub mod registry;
pub mod render;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock_boundary;
