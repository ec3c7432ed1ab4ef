//! Taxonomy behavior as seen from calling crates.

use capstan_errors::{
    is_prefix_matches, is_retryable, prefix_matches, ErrorEnvelope, StructuredError,
};
use serde_json::json;

// ---------------------------------------------------------------------------
// Interop with anyhow
// ---------------------------------------------------------------------------

#[test]
fn classification_survives_anyhow_context() {
    let err = anyhow::Error::new(StructuredError::with_all_info(
        3,
        "upstream",
        "unavailable",
        None,
        true,
    ))
    .context("calling pricing service");

    assert!(err.chain().any(is_retryable));
    assert!(err.chain().any(|e| is_prefix_matches(e, "upstream")));
}

#[test]
fn foreign_anyhow_errors_are_not_retryable() {
    let err = anyhow::anyhow!("upstream: unavailable");
    assert!(!err.chain().any(is_retryable));
    assert!(!err.chain().any(|e| prefix_matches(e, "upstream")));
}

// ---------------------------------------------------------------------------
// Wire envelope
// ---------------------------------------------------------------------------

#[test]
fn envelope_serializes_compactly() {
    let err = StructuredError::new(5, "auth", "token expired", None);
    let value = serde_json::to_value(err.envelope()).unwrap();
    assert_eq!(
        value,
        json!({
            "code": 5,
            "prefix": "auth",
            "message": "token expired",
            "retryable": false,
        })
    );
}

#[test]
fn envelope_deserializes_with_defaults() {
    let envelope: ErrorEnvelope = serde_json::from_value(json!({
        "code": 9,
        "prefix": "billing",
        "message": "card declined",
    }))
    .unwrap();

    let err = StructuredError::from(envelope);
    assert_eq!(err.to_string(), "billing: card declined");
    assert!(!err.retryable());
    assert!(err.data().is_none());
    assert!(!err.stack_trace().is_empty());
}

// ---------------------------------------------------------------------------
// Internal errors
// ---------------------------------------------------------------------------

#[test]
fn internal_error_composes_code_into_prefix() {
    let cause = std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out");
    let err = StructuredError::internal_with_cause(cause, "failed", None, "1");

    assert_eq!(err.to_string(), "internal_service.1: failed: read timed out");
    assert!(err.prefix_matches("internal_service.1"));
    assert!(!err.prefix_matches("internal_service"));
    assert_eq!(
        err.cause().map(|c| c.to_string()).as_deref(),
        Some("read timed out")
    );
}

#[test]
fn promoted_errors_keep_identity_through_clone() {
    let original = StructuredError::with_all_info(1, "T", "failed", None, true);
    let cloned = original.clone();
    let promoted = StructuredError::from_error(cloned);
    assert_eq!(promoted.stack_trace(), original.stack_trace());
    assert!(is_retryable(&promoted));
}
