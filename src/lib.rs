//! Callwrap - call-wrapping utilities that attach behavior to functions
//!
//! This library wraps arbitrary functions without touching their bodies:
//!
//! - [`notify`]: send a notification on a background thread around each call,
//!   joined before the call returns
//! - [`analyzer`]: record timing, failures and per-function call counts into
//!   an in-memory ledger, with one log sink per function and CSV/JSON reports
//! - [`retry`]: retry a failing call a bounded number of times with a fixed delay
//!
//! Wrapped functions take one argument (use a tuple for several) and return
//! `Result<R, CallFailure>`. Build failures with [`CallFailure::new`] or let
//! `?` convert foreign errors; either way the failure records the body's own
//! source line. A panic inside the body counts as a failure too.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod failure;
pub mod logging;
pub mod notify;
pub mod report;
pub mod retry;
pub mod sink;

pub use analyzer::{Analyze, CallAnalyzer, CallRecord, NO_EXCEPTION};
pub use error::{Error, Result};
pub use failure::CallFailure;
pub use notify::{
    FnTransport, LogTransport, Notification, NotificationConfig, NotificationError,
    NotificationWrapper, Transport,
};
pub use report::{FunctionSummary, Report};
pub use retry::{RetryExhausted, RetryPolicy, RetryState, Sleeper, ThreadSleeper};
pub use sink::{ConsoleSink, FileSink, LogSink, LogTarget, MemorySink};
