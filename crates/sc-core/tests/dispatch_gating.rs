//! Dispatch gating against the in-memory bridge.
//!
//! Requires the `test-utils` feature.

use std::sync::Arc;
use std::time::Duration;

use sc_common::ClientRecord;
use sc_core::boundary::BoundaryError;
use sc_core::dispatch::{
    CompileStatus, DispatchError, DispatchOptions, DispatchResult, ScriptDispatcher,
};
use sc_core::exit_codes::ExitCode;
use sc_core::mock_boundary::MockBoundary;
use sc_core::registry::SharedRegistry;

fn clients() -> Vec<ClientRecord> {
    vec![
        ClientRecord::new(10, "alice"),
        ClientRecord::new(11, "bob"),
        ClientRecord::new(12, "carol"),
    ]
}

fn setup(mock: MockBoundary) -> (Arc<MockBoundary>, SharedRegistry, ScriptDispatcher) {
    let mock = Arc::new(mock.with_clients(clients()));
    let registry = SharedRegistry::new();
    registry.refresh_from(mock.as_ref(), 64).unwrap();
    let dispatcher = ScriptDispatcher::new(mock.clone(), DispatchOptions::default());
    (mock, registry, dispatcher)
}

#[test]
fn valid_script_reaches_selected_clients_only() {
    let (mock, registry, dispatcher) = setup(MockBoundary::new());
    registry.set_selected(11.into(), false).unwrap();

    let result = dispatcher.dispatch("print('hi')", &registry).unwrap();
    assert_eq!(
        result,
        DispatchResult::Sent {
            targets: vec!["alice".into(), "carol".into()]
        }
    );

    let calls = mock.executions();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].source_text(), "print('hi')");
    assert_eq!(calls[0].target_names(), vec!["alice", "carol"]);
}

#[test]
fn rejected_script_never_executes() {
    let (mock, registry, dispatcher) =
        setup(MockBoundary::new().rejecting("end end", "[string \"x\"]:1: 'eof' expected near 'end'"));

    let result = dispatcher.dispatch("if x then end end", &registry).unwrap();
    assert_eq!(
        result,
        DispatchResult::Rejected {
            diagnostic: "[string \"x\"]:1: 'eof' expected near 'end'".into()
        }
    );
    assert_eq!(mock.validation_count(), 1);
    assert_eq!(mock.execution_count(), 0);
}

#[test]
fn success_marker_comparison_is_exact() {
    let (mock, registry, dispatcher) = setup(MockBoundary::new().responding("Success "));
    let result = dispatcher.dispatch("return 1", &registry).unwrap();
    assert!(matches!(result, DispatchResult::Rejected { .. }));
    assert_eq!(mock.execution_count(), 0);
}

#[test]
fn custom_marker_is_honored() {
    let mock = Arc::new(MockBoundary::new().responding("OK").with_clients(clients()));
    let options = DispatchOptions {
        success_marker: "OK".into(),
        ..DispatchOptions::default()
    };
    let dispatcher = ScriptDispatcher::new(mock.clone(), options);
    assert_eq!(
        dispatcher.check_compilable("return 1").unwrap(),
        CompileStatus::Success
    );
}

#[test]
fn unreachable_validator_blocks_execution() {
    let (mock, registry, dispatcher) = setup(MockBoundary::new().validator_fails("bridge crashed"));
    let err = dispatcher.dispatch("return 1", &registry).unwrap_err();

    assert!(matches!(err, DispatchError::ValidatorUnreachable { .. }));
    assert!(err.to_string().starts_with("validate call failed"));
    assert_eq!(mock.execution_count(), 0);
}

#[test]
fn slow_validator_times_out() {
    let (mock, registry, _) =
        setup(MockBoundary::new().validate_delay(Duration::from_millis(500)));
    let options = DispatchOptions {
        validate_timeout: Duration::from_millis(20),
        ..DispatchOptions::default()
    };
    let dispatcher = ScriptDispatcher::new(mock.clone(), options);

    let err = dispatcher.dispatch("return 1", &registry).unwrap_err();
    assert!(matches!(
        err.cause(),
        Some(BoundaryError::TimedOut { .. })
    ));
    assert_eq!(mock.execution_count(), 0);

    let unified = sc_common::Error::from(err);
    assert_eq!(unified.code(), 42);
    assert_eq!(ExitCode::from(&unified), ExitCode::TimeoutError);
}

#[test]
fn executor_failure_names_the_call() {
    let (_, registry, dispatcher) = setup(MockBoundary::new().executor_fails("no runtime"));
    let err = dispatcher.dispatch("return 1", &registry).unwrap_err();
    assert_eq!(err.to_string(), "execute call failed: no runtime");
}

#[test]
fn empty_selection_is_sent_by_default() {
    let (mock, registry, dispatcher) = setup(MockBoundary::new());
    registry.deselect_all();

    let result = dispatcher.dispatch("return 1", &registry).unwrap();
    assert_eq!(result, DispatchResult::Sent { targets: vec![] });
    assert_eq!(mock.execution_count(), 1);
    assert!(mock.executions()[0].targets.is_empty());
}

#[test]
fn empty_selection_can_be_refused() {
    let (mock, registry, _) = setup(MockBoundary::new());
    registry.deselect_all();
    let options = DispatchOptions {
        allow_empty_targets: false,
        ..DispatchOptions::default()
    };
    let dispatcher = ScriptDispatcher::new(mock.clone(), options);

    let err = dispatcher.dispatch("return 1", &registry).unwrap_err();
    assert_eq!(err, DispatchError::EmptyTargets);
    // Validation still ran first.
    assert_eq!(mock.validation_count(), 1);
    assert_eq!(mock.execution_count(), 0);
}

#[test]
fn encodings_differ_per_call() {
    let (mock, registry, dispatcher) = setup(MockBoundary::new());
    dispatcher.dispatch("print('héllo')", &registry).unwrap();

    assert_eq!(mock.validations()[0], b"print('h?llo')".to_vec());
    assert_eq!(mock.executions()[0].source_text(), "print('héllo')");
}

#[test]
fn targets_reflect_selection_at_dispatch_time() {
    let (mock, registry, dispatcher) = setup(MockBoundary::new());
    dispatcher.dispatch("a()", &registry).unwrap();
    registry.set_selected(10.into(), false).unwrap();
    dispatcher.dispatch("b()", &registry).unwrap();

    let calls = mock.executions();
    assert_eq!(calls[0].target_names(), vec!["alice", "bob", "carol"]);
    assert_eq!(calls[1].target_names(), vec!["bob", "carol"]);
}
