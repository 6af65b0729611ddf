//! Scripted in-memory bridge for tests.
//!
//! `MockBoundary` serves a programmable client list, answers validation
//! from a configured rule, and records every validate and execute call so
//! tests can assert what crossed the boundary and in which encoding.
//!
//! # Example
//!
//! ```ignore
//! use sc_core::mock_boundary::MockBoundary;
//! use sc_common::ClientRecord;
//!
//! let mock = MockBoundary::new()
//!     .with_clients(vec![ClientRecord::new(1, "alice")])
//!     .rejecting("syntax", "line 1: '=' expected");
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sc_common::ClientRecord;

use crate::boundary::raw::decode_single_byte;
use crate::boundary::{
    Boundary, BoundaryCall, BoundaryError, EnumerationError, Enumerator, Executor, Validator,
};

/// One recorded execute call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionCall {
    /// Script bytes as received (UTF-8).
    pub source: Vec<u8>,
    /// Target names as received (single-byte).
    pub targets: Vec<Vec<u8>>,
}

impl ExecutionCall {
    pub fn source_text(&self) -> String {
        String::from_utf8_lossy(&self.source).into_owned()
    }

    pub fn target_names(&self) -> Vec<String> {
        self.targets.iter().map(|t| decode_single_byte(t)).collect()
    }
}

#[derive(Debug, Clone)]
enum ValidatorRule {
    /// Always answer with this text.
    Respond(String),
    /// Answer with the diagnostic when the script contains the needle.
    RejectContaining { needle: String, diagnostic: String },
    /// The call itself fails.
    Fail(String),
}

#[derive(Debug)]
struct MockState {
    current: Vec<ClientRecord>,
    queued: VecDeque<Result<Vec<ClientRecord>, EnumerationError>>,
    validator: ValidatorRule,
    validate_delay: Option<Duration>,
    executor_failure: Option<String>,
    validations: Vec<Vec<u8>>,
    executions: Vec<ExecutionCall>,
    enumerations: usize,
    initializations: usize,
}

/// In-memory bridge.
#[derive(Debug)]
pub struct MockBoundary {
    state: Mutex<MockState>,
}

impl Default for MockBoundary {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBoundary {
    /// No clients; every script validates.
    pub fn new() -> Self {
        MockBoundary {
            state: Mutex::new(MockState {
                current: Vec::new(),
                queued: VecDeque::new(),
                validator: ValidatorRule::Respond("success".to_string()),
                validate_delay: None,
                executor_failure: None,
                validations: Vec::new(),
                executions: Vec::new(),
                enumerations: 0,
                initializations: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── builders ────────────────────────────────────────────────────

    pub fn with_clients(self, clients: Vec<ClientRecord>) -> Self {
        self.set_clients(clients);
        self
    }

    /// Validator answers `status` for every script.
    pub fn responding(self, status: impl Into<String>) -> Self {
        self.lock().validator = ValidatorRule::Respond(status.into());
        self
    }

    /// Validator rejects scripts containing `needle` with `diagnostic`.
    pub fn rejecting(self, needle: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        self.lock().validator = ValidatorRule::RejectContaining {
            needle: needle.into(),
            diagnostic: diagnostic.into(),
        };
        self
    }

    pub fn validator_fails(self, reason: impl Into<String>) -> Self {
        self.lock().validator = ValidatorRule::Fail(reason.into());
        self
    }

    pub fn executor_fails(self, reason: impl Into<String>) -> Self {
        self.lock().executor_failure = Some(reason.into());
        self
    }

    pub fn validate_delay(self, delay: Duration) -> Self {
        self.lock().validate_delay = Some(delay);
        self
    }

    // ── runtime control ─────────────────────────────────────────────

    /// Replace the client list served from now on.
    pub fn set_clients(&self, clients: Vec<ClientRecord>) {
        self.lock().current = clients;
    }

    /// Make the next enumerate call fail. Later calls serve the list again.
    pub fn fail_next_enumeration(&self, err: EnumerationError) {
        self.lock().queued.push_back(Err(err));
    }

    // ── recorded calls ──────────────────────────────────────────────

    pub fn validations(&self) -> Vec<Vec<u8>> {
        self.lock().validations.clone()
    }

    pub fn validation_count(&self) -> usize {
        self.lock().validations.len()
    }

    pub fn executions(&self) -> Vec<ExecutionCall> {
        self.lock().executions.clone()
    }

    pub fn execution_count(&self) -> usize {
        self.lock().executions.len()
    }

    pub fn enumeration_count(&self) -> usize {
        self.lock().enumerations
    }

    pub fn initialization_count(&self) -> usize {
        self.lock().initializations
    }
}

impl Enumerator for MockBoundary {
    fn enumerate(&self, max_records: usize) -> Result<Vec<ClientRecord>, EnumerationError> {
        let mut state = self.lock();
        state.enumerations += 1;
        if let Some(result) = state.queued.pop_front() {
            return result;
        }
        // Mirror the bounded scan: a list longer than the bound has no
        // terminator in reach.
        if state.current.len() >= max_records {
            return Err(EnumerationError::Unterminated {
                scanned: max_records,
            });
        }
        Ok(state.current.clone())
    }
}

impl Validator for MockBoundary {
    fn validate(&self, source: &[u8]) -> Result<String, BoundaryError> {
        let (rule, delay) = {
            let mut state = self.lock();
            state.validations.push(source.to_vec());
            (state.validator.clone(), state.validate_delay)
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        match rule {
            ValidatorRule::Respond(status) => Ok(status),
            ValidatorRule::RejectContaining { needle, diagnostic } => {
                if decode_single_byte(source).contains(&needle) {
                    Ok(diagnostic)
                } else {
                    Ok("success".to_string())
                }
            }
            ValidatorRule::Fail(reason) => {
                Err(BoundaryError::call_failed(BoundaryCall::Validate, reason))
            }
        }
    }
}

impl Executor for MockBoundary {
    fn execute(&self, source: &[u8], targets: &[Vec<u8>]) -> Result<(), BoundaryError> {
        let mut state = self.lock();
        if let Some(reason) = &state.executor_failure {
            return Err(BoundaryError::call_failed(
                BoundaryCall::Execute,
                reason.clone(),
            ));
        }
        state.executions.push(ExecutionCall {
            source: source.to_vec(),
            targets: targets.to_vec(),
        });
        Ok(())
    }
}

impl Boundary for MockBoundary {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn initialize(&self) -> Result<(), BoundaryError> {
        self.lock().initializations += 1;
        Ok(())
    }
}
