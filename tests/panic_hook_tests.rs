//! Panic capture when the host replaces the panic hook
//!
//! Kept in its own test binary: it swaps the process-wide panic hook, which
//! would race with panic capture in other tests.

use callwrap::{CallAnalyzer, CallFailure, MemorySink};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn explode(_: ()) -> Result<(), CallFailure> {
    panic!("exploded")
}
const EXPLODE_LINE: u32 = line!() - 2;

static HOST_HOOK_CALLS: AtomicUsize = AtomicUsize::new(0);

#[test]
fn test_capture_recovers_after_hook_replaced() {
    let analyzer = CallAnalyzer::new();
    let explode = analyzer
        .wrap_with_sink("explode", Arc::new(MemorySink::new()))
        .apply(explode);

    assert_eq!(explode(()), None);

    std::panic::set_hook(Box::new(|_| {
        HOST_HOOK_CALLS.fetch_add(1, Ordering::SeqCst);
    }));

    // The host hook sees this one; capture is re-armed on top of it
    assert_eq!(explode(()), None);
    assert_eq!(explode(()), None);
    assert_eq!(explode(()), None);

    let rows = analyzer.report().into_rows();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|row| row.exception == "exploded"));
    assert!(rows.iter().all(|row| row.line > 0));
    assert_eq!(rows[0].line, EXPLODE_LINE);
    assert_eq!(rows[2].line, EXPLODE_LINE, "capture must be re-armed");
    assert_eq!(rows[3].line, EXPLODE_LINE);
    assert_eq!(HOST_HOOK_CALLS.load(Ordering::SeqCst), 1);

    // Panics outside wrapped calls still reach the host hook
    let _ = std::panic::catch_unwind(|| panic!("outside"));
    assert_eq!(HOST_HOOK_CALLS.load(Ordering::SeqCst), 2);
}
