//! Global tracing subscriber installation
//!
//! Kept in its own test binary so the stderr subscriber does not leak into
//! other tests.

use callwrap::logging::init_tracing;

#[test]
fn test_init_twice_is_harmless() {
    assert!(init_tracing(false), "first install must succeed");
    assert!(!init_tracing(true), "second install must be a no-op");
    tracing::info!("subscriber installed");
}
