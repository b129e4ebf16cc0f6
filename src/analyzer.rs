//! Per-call timing and failure analysis
//!
//! A [`CallAnalyzer`] owns a ledger of [`CallRecord`]s. Functions wrapped
//! through [`CallAnalyzer::wrap`] append one record per invocation (success
//! or failure), bump a per-function view counter, and write one line to the
//! function's log sink.
//!
//! Failures are swallowed by [`Analyze::apply`]: the wrapped call returns
//! `None` and the failure is only visible in the ledger and the log. Callers
//! that need the failure use [`Analyze::apply_checked`], which records the
//! same data and hands the [`CallFailure`] back.
//!
//! # Example
//!
//! ```
//! use callwrap::{CallAnalyzer, CallFailure, MemorySink};
//! use std::sync::Arc;
//!
//! let analyzer = CallAnalyzer::new();
//! let divide = analyzer
//!     .wrap_with_sink("divide", Arc::new(MemorySink::new()))
//!     .apply(|(a, b): (i32, i32)| -> Result<i32, CallFailure> { Ok(a / b) });
//!
//! assert_eq!(divide((10, 2)), Some(5));
//! assert_eq!(divide((10, 0)), None);
//!
//! let report = analyzer.report();
//! assert_eq!(report.len(), 2);
//! assert_eq!(report.rows()[1].exception, "attempt to divide by zero");
//! assert_eq!(report.rows()[1].views, 2);
//! ```
//!
//! # Concurrency
//!
//! The ledger, view counters and sink registry live behind one mutex. The
//! lock is held only for bookkeeping, never while the wrapped body runs.

use crate::error::Result;
use crate::failure::{self, CallFailure};
use crate::report::Report;
use crate::sink::{LogSink, LogTarget};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Exception descriptor for calls that did not fail
pub const NO_EXCEPTION: &str = "N/A";

/// One completed invocation of an analyzed function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Function identifier given at wrap time
    #[serde(rename = "Func")]
    pub func: String,
    /// Elapsed wall time in seconds, rounded to microseconds
    #[serde(rename = "Time")]
    pub time: f64,
    /// Failure message, or [`NO_EXCEPTION`]
    #[serde(rename = "Exception")]
    pub exception: String,
    /// Source line of the failure, 0 on success
    #[serde(rename = "Line")]
    pub line: u32,
    /// Invocation count of `func` including this call
    #[serde(rename = "Views")]
    pub views: u64,
}

impl CallRecord {
    pub fn is_failure(&self) -> bool {
        self.exception != NO_EXCEPTION
    }

    fn log_message(&self, elapsed: f64) -> String {
        format!(
            "Func: {} - {:.6} - {} - {}",
            self.func, elapsed, self.exception, self.line
        )
    }
}

#[derive(Debug, Default)]
struct Ledger {
    records: Vec<CallRecord>,
    views: HashMap<String, u64>,
    sinks: HashMap<String, Arc<dyn LogSink>>,
}

/// Collector of call records; clones share the same ledger
#[derive(Debug, Clone, Default)]
pub struct CallAnalyzer {
    ledger: Arc<Mutex<Ledger>>,
}

impl CallAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decorator for the function identified by `name`, logging to `target`
    ///
    /// The sink is created the first time `name` is wrapped; later wraps of
    /// the same name share it and ignore `target`.
    pub fn wrap(&self, name: impl Into<String>, target: &LogTarget) -> Result<Analyze> {
        let name = name.into();
        let existing = self.ledger.lock().sinks.get(&name).cloned();
        let sink = match existing {
            Some(sink) => sink,
            None => {
                // Opened without the lock; a racing wrap of the same name may win
                let opened = target.open()?;
                Arc::clone(
                    self.ledger
                        .lock()
                        .sinks
                        .entry(name.clone())
                        .or_insert(opened),
                )
            }
        };

        Ok(Analyze {
            analyzer: self.clone(),
            name,
            sink,
        })
    }

    /// Like [`CallAnalyzer::wrap`] with an already-built sink
    pub fn wrap_with_sink(&self, name: impl Into<String>, sink: Arc<dyn LogSink>) -> Analyze {
        let name = name.into();
        let sink = Arc::clone(
            self.ledger
                .lock()
                .sinks
                .entry(name.clone())
                .or_insert(sink),
        );

        Analyze {
            analyzer: self.clone(),
            name,
            sink,
        }
    }

    /// Snapshot of the ledger; does not clear it
    pub fn report(&self) -> Report {
        Report::new(self.ledger.lock().records.clone())
    }

    /// Snapshot the ledger and save it as CSV to `path`
    pub fn report_to(&self, path: impl AsRef<Path>) -> Result<Report> {
        let report = self.report();
        report.save(path)?;
        Ok(report)
    }

    /// Number of records in the ledger
    pub fn len(&self) -> usize {
        self.ledger.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.lock().records.is_empty()
    }

    /// Invocations seen so far for `name`
    pub fn views(&self, name: &str) -> u64 {
        self.ledger.lock().views.get(name).copied().unwrap_or(0)
    }

    fn begin(&self, name: &str) -> u64 {
        let mut ledger = self.ledger.lock();
        let views = ledger.views.entry(name.to_string()).or_insert(0);
        *views += 1;
        *views
    }

    fn finish(&self, record: CallRecord) {
        self.ledger.lock().records.push(record);
    }
}

/// Decorator produced by [`CallAnalyzer::wrap`]
#[derive(Debug, Clone)]
pub struct Analyze {
    analyzer: CallAnalyzer,
    name: String,
    sink: Arc<dyn LogSink>,
}

impl Analyze {
    /// Function identifier records are filed under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wrap `f`; failures are recorded and swallowed, yielding `None`
    pub fn apply<F, A, R>(self, f: F) -> impl Fn(A) -> Option<R>
    where
        F: Fn(A) -> std::result::Result<R, CallFailure>,
    {
        move |args| self.invoke(&f, args).ok()
    }

    /// Wrap `f`; failures are recorded and returned to the caller
    pub fn apply_checked<F, A, R>(
        self,
        f: F,
    ) -> impl Fn(A) -> std::result::Result<R, CallFailure>
    where
        F: Fn(A) -> std::result::Result<R, CallFailure>,
    {
        move |args| self.invoke(&f, args)
    }

    fn invoke<F, A, R>(&self, f: &F, args: A) -> std::result::Result<R, CallFailure>
    where
        F: Fn(A) -> std::result::Result<R, CallFailure>,
    {
        let views = self.analyzer.begin(&self.name);
        let start = Instant::now();
        let outcome = failure::invoke(f, args);
        let elapsed = start.elapsed().as_secs_f64();

        let (exception, line) = match &outcome {
            Ok(_) => (NO_EXCEPTION.to_string(), 0),
            Err(failure) => (failure.message().to_string(), failure.line()),
        };
        let record = CallRecord {
            func: self.name.clone(),
            time: round_micros(elapsed),
            exception,
            line,
            views,
        };

        self.sink.info(&record.log_message(elapsed));
        if record.is_failure() {
            tracing::warn!(
                func = %record.func,
                time = record.time,
                exception = %record.exception,
                line = record.line,
                views = record.views,
                "analyzed call failed"
            );
        } else {
            tracing::info!(
                func = %record.func,
                time = record.time,
                views = record.views,
                "analyzed call completed"
            );
        }

        self.analyzer.finish(record);
        outcome
    }
}

fn round_micros(seconds: f64) -> f64 {
    (seconds * 1_000_000.0).round() / 1_000_000.0
}
