//! Every error variant carries a stable code, category and remediation.

use sc_common::{format_error_human, Error, ErrorCategory, StructuredError, SuggestedAction};

fn all_variants() -> Vec<Error> {
    vec![
        Error::Config("missing".into()),
        Error::InvalidSettings("refresh.interval_ms: too small".into()),
        Error::VersionMismatch {
            expected: "1.0.0".into(),
            actual: "2.0.0".into(),
        },
        Error::Enumeration("null list".into()),
        Error::UnknownClient { id: 4 },
        Error::CompileRejected {
            diagnostic: "line 1: oops".into(),
        },
        Error::ValidatorUnreachable("gone".into()),
        Error::ExecutorUnreachable("gone".into()),
        Error::EmptyTargets,
        Error::BoundaryTimeout {
            call: "execute".into(),
            millis: 5000,
        },
        Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "x.lua")),
        Error::Json(serde_json::from_str::<serde_json::Value>("{").unwrap_err()),
        Error::BoundaryUnavailable("no library".into()),
    ]
}

#[test]
fn codes_are_unique() {
    let mut codes: Vec<u32> = all_variants().iter().map(Error::code).collect();
    let total = codes.len();
    codes.sort_unstable();
    codes.dedup();
    assert_eq!(codes.len(), total);
}

#[test]
fn codes_fall_in_category_ranges() {
    for err in all_variants() {
        let code = err.code();
        let range = match err.category() {
            ErrorCategory::Config => 10..20,
            ErrorCategory::Enumeration | ErrorCategory::Selection => 20..30,
            ErrorCategory::Validation => 30..40,
            ErrorCategory::Execution => 40..50,
            ErrorCategory::Io => 60..70,
            ErrorCategory::Platform => 70..80,
        };
        assert!(range.contains(&code), "{} has code {}", err, code);
    }
}

#[test]
fn every_variant_has_guidance() {
    for err in all_variants() {
        assert!(!err.remediation().is_empty());
        assert!(!err.headline().is_empty());
    }
}

#[test]
fn structured_timeout_carries_call_and_deadline() {
    let err = Error::BoundaryTimeout {
        call: "validate".into(),
        millis: 250,
    };
    let structured = StructuredError::from(&err);
    assert_eq!(structured.code, 42);
    assert_eq!(structured.suggested_action, SuggestedAction::Retry);
    assert_eq!(structured.context["call"], "validate");
    assert_eq!(structured.context["timeout_ms"], 250);
}

#[test]
fn human_format_is_reachable_from_crate_root() {
    for err in all_variants() {
        let plain = format_error_human(&err, false);
        assert!(plain.starts_with('✗'), "{plain}");
        assert!(!plain.contains('\x1b'), "{plain}");
        assert!(format_error_human(&err, true).contains("\x1b[31m"));
    }

    let rejected = Error::CompileRejected {
        diagnostic: "[string]:1: '=' expected".into(),
    };
    let text = format_error_human(&rejected, false);
    assert!(text.ends_with("\n[string]:1: '=' expected"));
    assert!(!text.contains("Fix:"));
}
