//! Validate-then-execute dispatch.
//!
//! A script reaches the executor only after the validator answers with the
//! success marker. Any other answer is a compile error and nothing runs.
//! Targets are the names of the selected clients, read after validation.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sc_config::Settings;
use serde::Serialize;
use thiserror::Error;

use crate::boundary::guard::call_with_timeout;
use crate::boundary::raw::{encode_ascii_lossy, encode_single_byte};
use crate::boundary::{Boundary, BoundaryCall, BoundaryError};
use crate::logging::{event_names, redact_for_log, SCRIPT_PREVIEW_LEN};
use crate::registry::SharedRegistry;

/// Validator verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompileStatus {
    Success,
    CompileError { message: String },
}

impl CompileStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, CompileStatus::Success)
    }
}

/// Outcome of a dispatch that reached a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchResult {
    /// Handed to the executor. Per-target results are not reported back.
    Sent { targets: Vec<String> },
    /// The validator refused the script; the executor was not called.
    Rejected { diagnostic: String },
}

/// A dispatch that could not reach a verdict or could not hand off.
///
/// A timed-out call counts as unreachable; the cause keeps the detail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("validate call failed: {}", failure_reason(.cause))]
    ValidatorUnreachable { cause: BoundaryError },

    #[error("execute call failed: {}", failure_reason(.cause))]
    ExecutorUnreachable { cause: BoundaryError },

    #[error("no clients selected")]
    EmptyTargets,
}

impl DispatchError {
    /// The underlying bridge failure, if any.
    pub fn cause(&self) -> Option<&BoundaryError> {
        match self {
            DispatchError::ValidatorUnreachable { cause }
            | DispatchError::ExecutorUnreachable { cause } => Some(cause),
            DispatchError::EmptyTargets => None,
        }
    }
}

impl From<DispatchError> for sc_common::Error {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::ValidatorUnreachable { cause }
            | DispatchError::ExecutorUnreachable { cause } => cause.into(),
            DispatchError::EmptyTargets => sc_common::Error::EmptyTargets,
        }
    }
}

fn failure_reason(err: &BoundaryError) -> String {
    match err {
        BoundaryError::CallFailed { reason, .. } => reason.clone(),
        BoundaryError::TimedOut { after, .. } => {
            format!("timed out after {}ms", after.as_millis())
        }
        BoundaryError::Unavailable(reason) => reason.clone(),
    }
}

/// Dispatcher knobs, normally taken from [`Settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    pub success_marker: String,
    pub validate_timeout: Duration,
    pub execute_timeout: Duration,
    pub allow_empty_targets: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        DispatchOptions::from(&Settings::default())
    }
}

impl From<&Settings> for DispatchOptions {
    fn from(settings: &Settings) -> Self {
        DispatchOptions {
            success_marker: settings.boundary.success_marker.clone(),
            validate_timeout: settings.validate_timeout(),
            execute_timeout: settings.execute_timeout(),
            allow_empty_targets: settings.dispatch.allow_empty_targets,
        }
    }
}

/// Gates execution on remote validation.
pub struct ScriptDispatcher {
    boundary: Arc<dyn Boundary>,
    options: DispatchOptions,
}

impl ScriptDispatcher {
    pub fn new(boundary: Arc<dyn Boundary>, options: DispatchOptions) -> Self {
        ScriptDispatcher { boundary, options }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Ask the validator whether `source` compiles.
    ///
    /// The script goes out single-byte encoded; non-ASCII characters arrive
    /// as `?`.
    pub fn check_compilable(&self, source: &str) -> Result<CompileStatus, DispatchError> {
        let encoded = encode_ascii_lossy(source);
        let boundary = Arc::clone(&self.boundary);
        let status = call_with_timeout(
            BoundaryCall::Validate,
            self.options.validate_timeout,
            move || boundary.validate(&encoded),
        )
        .map_err(|cause| DispatchError::ValidatorUnreachable { cause })?;

        if status == self.options.success_marker {
            Ok(CompileStatus::Success)
        } else {
            Ok(CompileStatus::CompileError { message: status })
        }
    }

    /// Validate `source`, then execute it against the registry's selection.
    pub fn dispatch(
        &self,
        source: &str,
        registry: &SharedRegistry,
    ) -> Result<DispatchResult, DispatchError> {
        self.dispatch_with(source, || registry.selected_names())
    }

    /// Validate `source`, then execute it against `targets`.
    pub fn dispatch_to(
        &self,
        source: &str,
        targets: Vec<String>,
    ) -> Result<DispatchResult, DispatchError> {
        self.dispatch_with(source, move || targets)
    }

    fn dispatch_with(
        &self,
        source: &str,
        targets: impl FnOnce() -> Vec<String>,
    ) -> Result<DispatchResult, DispatchError> {
        tracing::info!(
            target: event_names::DISPATCH_STARTED,
            script_len = source.len(),
            script = %redact_for_log(source, SCRIPT_PREVIEW_LEN),
            "validating script"
        );

        let status = match self.check_compilable(source) {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(target: event_names::DISPATCH_FAILED, error = %err, "dispatch aborted");
                return Err(err);
            }
        };

        if let CompileStatus::CompileError { message } = status {
            tracing::info!(
                target: event_names::DISPATCH_REJECTED,
                diagnostic = %message,
                "validator rejected script"
            );
            return Ok(DispatchResult::Rejected {
                diagnostic: message,
            });
        }

        let targets = targets();
        if targets.is_empty() && !self.options.allow_empty_targets {
            tracing::warn!(target: event_names::DISPATCH_FAILED, "no clients selected");
            return Err(DispatchError::EmptyTargets);
        }

        let source_bytes = source.as_bytes().to_vec();
        let encoded_targets: Vec<Vec<u8>> =
            targets.iter().map(|name| encode_single_byte(name)).collect();
        let boundary = Arc::clone(&self.boundary);
        let result = call_with_timeout(
            BoundaryCall::Execute,
            self.options.execute_timeout,
            move || boundary.execute(&source_bytes, &encoded_targets),
        );

        match result {
            Ok(()) => {
                tracing::info!(
                    target: event_names::DISPATCH_SENT,
                    target_count = targets.len(),
                    "script handed to executor"
                );
                Ok(DispatchResult::Sent { targets })
            }
            Err(cause) => {
                let err = DispatchError::ExecutorUnreachable { cause };
                tracing::warn!(target: event_names::DISPATCH_FAILED, error = %err, "dispatch failed");
                Err(err)
            }
        }
    }
}

/// Read a script from a file, or from stdin when `arg` is `-`.
pub fn read_script(arg: &str) -> std::io::Result<String> {
    if arg == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(Path::new(arg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_boundary::MockBoundary;
    use sc_common::{ClientId, ClientRecord};

    fn setup(mock: MockBoundary) -> (Arc<MockBoundary>, ScriptDispatcher, SharedRegistry) {
        let mock = Arc::new(mock);
        let dispatcher = ScriptDispatcher::new(mock.clone(), DispatchOptions::default());
        let registry = SharedRegistry::new();
        registry.refresh(&[ClientRecord::new(1, "alice"), ClientRecord::new(2, "bob")]);
        (mock, dispatcher, registry)
    }

    #[test]
    fn rejected_script_never_executes() {
        let (mock, dispatcher, registry) =
            setup(MockBoundary::new().rejecting("bad", "line 1: unexpected symbol near 'bad'"));

        let result = dispatcher.dispatch("bad syntax", &registry).unwrap();
        assert_eq!(
            result,
            DispatchResult::Rejected {
                diagnostic: "line 1: unexpected symbol near 'bad'".into()
            }
        );
        assert_eq!(mock.validation_count(), 1);
        assert_eq!(mock.execution_count(), 0);
    }

    #[test]
    fn valid_script_executes_once_with_selection() {
        let (mock, dispatcher, registry) = setup(MockBoundary::new());
        registry.set_selected(ClientId(1), false).unwrap();

        let result = dispatcher.dispatch("print('hi')", &registry).unwrap();
        assert_eq!(
            result,
            DispatchResult::Sent {
                targets: vec!["bob".into()]
            }
        );

        let executions = mock.executions();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].source_text(), "print('hi')");
        assert_eq!(executions[0].target_names(), vec!["bob"]);
    }

    #[test]
    fn empty_selection_still_executes_by_default() {
        let (mock, dispatcher, registry) = setup(MockBoundary::new());
        registry.deselect_all();

        let result = dispatcher.dispatch("x = 1", &registry).unwrap();
        assert_eq!(result, DispatchResult::Sent { targets: vec![] });
        assert_eq!(mock.execution_count(), 1);
        assert!(mock.executions()[0].targets.is_empty());
    }

    #[test]
    fn empty_selection_fails_when_disallowed() {
        let mock = Arc::new(MockBoundary::new());
        let options = DispatchOptions {
            allow_empty_targets: false,
            ..DispatchOptions::default()
        };
        let dispatcher = ScriptDispatcher::new(mock.clone(), options);

        let err = dispatcher.dispatch_to("x = 1", vec![]).unwrap_err();
        assert_eq!(err, DispatchError::EmptyTargets);
        assert_eq!(mock.execution_count(), 0);
    }

    #[test]
    fn validator_failure_blocks_execution() {
        let (mock, dispatcher, registry) =
            setup(MockBoundary::new().validator_fails("bridge not injected"));

        let err = dispatcher.dispatch("x = 1", &registry).unwrap_err();
        assert_eq!(err.to_string(), "validate call failed: bridge not injected");
        assert_eq!(mock.execution_count(), 0);
    }

    #[test]
    fn executor_failure_is_reported() {
        let (_mock, dispatcher, registry) =
            setup(MockBoundary::new().executor_fails("pipe closed"));

        let err = dispatcher.dispatch("x = 1", &registry).unwrap_err();
        assert!(err.to_string().starts_with("execute call failed"));
        let unified: sc_common::Error = err.into();
        assert_eq!(unified.code(), 40);
    }

    #[test]
    fn validator_timeout_is_unreachable() {
        let mock = Arc::new(MockBoundary::new().validate_delay(Duration::from_millis(300)));
        let options = DispatchOptions {
            validate_timeout: Duration::from_millis(20),
            ..DispatchOptions::default()
        };
        let dispatcher = ScriptDispatcher::new(mock.clone(), options);

        let err = dispatcher.check_compilable("x = 1").unwrap_err();
        assert_eq!(err.to_string(), "validate call failed: timed out after 20ms");
        assert!(matches!(
            err.cause(),
            Some(BoundaryError::TimedOut {
                call: BoundaryCall::Validate,
                ..
            })
        ));
        let unified: sc_common::Error = err.into();
        assert_eq!(unified.code(), 42);
    }

    #[test]
    fn encodings_differ_per_call() {
        let (mock, dispatcher, registry) = setup(MockBoundary::new());
        registry.refresh(&[ClientRecord::new(3, "Jos\u{e9}")]);

        dispatcher.dispatch("s = 'h\u{e9}'", &registry).unwrap();

        assert_eq!(mock.validations()[0], b"s = 'h?'".to_vec());
        let exec = &mock.executions()[0];
        assert_eq!(exec.source, "s = 'h\u{e9}'".as_bytes().to_vec());
        assert_eq!(exec.targets, vec![b"Jos\xe9".to_vec()]);
    }

    #[test]
    fn custom_success_marker() {
        let mock = Arc::new(MockBoundary::new().responding("OK"));
        let options = DispatchOptions {
            success_marker: "OK".into(),
            ..DispatchOptions::default()
        };
        let dispatcher = ScriptDispatcher::new(mock, options);
        assert_eq!(
            dispatcher.check_compilable("x").unwrap(),
            CompileStatus::Success
        );
    }

    #[test]
    fn success_marker_is_exact() {
        let mock = Arc::new(MockBoundary::new().responding("success "));
        let dispatcher = ScriptDispatcher::new(mock, DispatchOptions::default());
        assert_eq!(
            dispatcher.check_compilable("x").unwrap(),
            CompileStatus::CompileError {
                message: "success ".into()
            }
        );
    }

    #[test]
    fn read_script_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.lua");
        std::fs::write(&path, "print('hello')").unwrap();
        assert_eq!(
            read_script(path.to_str().unwrap()).unwrap(),
            "print('hello')"
        );
        assert!(read_script(dir.path().join("missing.lua").to_str().unwrap()).is_err());
    }
}
