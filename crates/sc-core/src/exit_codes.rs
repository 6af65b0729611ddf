//! Exit codes for the sc-core CLI.
//!
//! Exit codes communicate operation outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-3: Operational outcomes (parse outcome from code, not output)
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors and boundary failures

/// Exit codes for sc-core operations.
///
/// These codes are a stable contract for automation. Changes require
/// a major version bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Operational Outcomes (0-3)
    // ========================================================================
    /// Nothing to report / command completed
    Clean = 0,

    /// Script validated and handed to the executor
    Dispatched = 1,

    /// Validator rejected the script; nothing executed
    CompileRejected = 2,

    /// Empty selection with empty dispatch disabled
    NothingSelected = 3,

    // ========================================================================
    // User / Environment Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Configuration missing, unreadable or invalid
    ConfigError = 11,

    /// No native bridge in this build, or it failed to load
    BoundaryUnavailable = 12,

    /// Selection change named an id that is not tracked
    UnknownClient = 13,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error, or a bridge call failed
    InternalError = 20,

    /// I/O error
    IoError = 21,

    /// A bridge call did not return before its deadline
    TimeoutError = 22,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Completed without error (codes 0-1).
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean | ExitCode::Dispatched)
    }

    /// Operational outcome rather than an error (codes 0-9).
    pub fn is_operational(self) -> bool {
        (self as i32) < 10
    }

    /// User/environment error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        let code = self as i32;
        (10..20).contains(&code)
    }

    /// Internal error (codes 20-29).
    pub fn is_internal_error(self) -> bool {
        let code = self as i32;
        code >= 20
    }

    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::Dispatched => "OK_DISPATCHED",
            ExitCode::CompileRejected => "OK_REJECTED",
            ExitCode::NothingSelected => "OK_NOTHING_SELECTED",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::BoundaryUnavailable => "ERR_BOUNDARY_UNAVAILABLE",
            ExitCode::UnknownClient => "ERR_UNKNOWN_CLIENT",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
            ExitCode::TimeoutError => "ERR_TIMEOUT",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<&sc_common::Error> for ExitCode {
    fn from(err: &sc_common::Error) -> Self {
        use sc_common::Error;
        match err {
            Error::Config(_) | Error::InvalidSettings(_) | Error::VersionMismatch { .. } => {
                ExitCode::ConfigError
            }
            Error::UnknownClient { .. } => ExitCode::UnknownClient,
            Error::CompileRejected { .. } => ExitCode::CompileRejected,
            Error::EmptyTargets => ExitCode::NothingSelected,
            Error::BoundaryTimeout { .. } => ExitCode::TimeoutError,
            Error::BoundaryUnavailable(_) => ExitCode::BoundaryUnavailable,
            Error::Io(_) => ExitCode::IoError,
            Error::Enumeration(_)
            | Error::ValidatorUnreachable(_)
            | Error::ExecutorUnreachable(_)
            | Error::Json(_) => ExitCode::InternalError,
        }
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
