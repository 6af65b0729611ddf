//! Structured event definitions for logging.
//!
//! Every event is emitted with a dotted name from [`event_names`] as its
//! tracing target, and carries the run correlation ids and the [`Stage`].

use serde::{Deserialize, Serialize};

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Stages a scriptcast run moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup, configuration and boundary initialization.
    Init,
    /// Reading the client list and reconciling the registry.
    Enumerate,
    /// Operator selection changes.
    Select,
    /// Remote compile check.
    Validate,
    /// Handing a script to the executor.
    Execute,
    /// Interactive operator loop.
    Console,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Enumerate => "enumerate",
            Stage::Select => "select",
            Stage::Validate => "validate",
            Stage::Execute => "execute",
            Stage::Console => "console",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Boundary
    pub const BOUNDARY_INITIALIZED: &str = "boundary.initialized";
    pub const BOUNDARY_UNAVAILABLE: &str = "boundary.unavailable";
    pub const BOUNDARY_TIMEOUT: &str = "boundary.timeout";

    // Enumerate stage
    pub const REGISTRY_REFRESHED: &str = "registry.refreshed";
    pub const REGISTRY_REFRESH_FAILED: &str = "registry.refresh_failed";
    pub const REGISTRY_CLIENT_ADDED: &str = "registry.client_added";
    pub const REGISTRY_CLIENT_REMOVED: &str = "registry.client_removed";
    pub const REGISTRY_SNAPSHOT_STALE: &str = "registry.snapshot_stale";

    // Select stage
    pub const SELECTION_CHANGED: &str = "selection.changed";
    pub const SELECTION_UNKNOWN_CLIENT: &str = "selection.unknown_client";

    // Validate / execute stages
    pub const DISPATCH_STARTED: &str = "dispatch.started";
    pub const DISPATCH_REJECTED: &str = "dispatch.rejected";
    pub const DISPATCH_SENT: &str = "dispatch.sent";
    pub const DISPATCH_FAILED: &str = "dispatch.failed";

    // Poller
    pub const POLLER_STARTED: &str = "poller.started";
    pub const POLLER_STOPPED: &str = "poller.stopped";

    // Console
    pub const CONSOLE_COMMAND: &str = "console.command";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const CONFIG_ERROR: &str = "config.error";
}

/// Correlation ids stamped on every event of one sc-core invocation.
///
/// Pass it to [`crate::log_event!`]; the JSONL layer lifts `run_id`,
/// `host_id` and `stage` to the top level of each record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogContext {
    pub run_id: String,
    pub host_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            host_id: host_id.into(),
        }
    }
}
