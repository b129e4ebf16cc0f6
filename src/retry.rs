//! Bounded fixed-delay retry
//!
//! A [`RetryPolicy`] wraps a function so that a failure (an `Err` return or a
//! panic) triggers another attempt after a fixed delay, up to `max_attempts`
//! attempts in total.
//!
//! ```text
//! Idle ──call──► Attempting ──ok──────────────────────► Succeeded
//!                   │  ▲
//!       fail, left  │  │ delay elapsed
//!                   ▼  │
//!                 Sleeping
//!
//! Attempting ──fail, none left──► Exhausted
//! ```
//!
//! No state survives between calls: every call starts at attempt 0. Each
//! failed attempt is reported through `tracing` (`Attempt N failed: ...`)
//! and exhaustion as `Function failed after N attempts`. There is no sleep
//! after the final attempt.
//!
//! # Example
//!
//! ```
//! use callwrap::{CallFailure, RetryPolicy};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//!
//! let calls = AtomicU32::new(0);
//! let fetch = RetryPolicy::new(3, Duration::ZERO).unwrap().apply(|_: ()| {
//!     if calls.fetch_add(1, Ordering::SeqCst) < 2 {
//!         Err(CallFailure::new("not yet"))
//!     } else {
//!         Ok(42)
//!     }
//! });
//!
//! assert_eq!(fetch(()), Some(42));
//! assert_eq!(calls.load(Ordering::SeqCst), 3);
//! ```

use crate::error::{Error, Result};
use crate::failure::{self, CallFailure};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Every attempt failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Function failed after {attempts} attempts: {last}")]
pub struct RetryExhausted {
    pub attempts: u32,
    /// Failure of the final attempt
    pub last: CallFailure,
}

/// States a retried call moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryState {
    Idle,
    Attempting,
    Sleeping,
    Succeeded,
    Exhausted,
}

/// Blocks the calling thread between attempts
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps with `std::thread::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Bounded attempt count with a fixed delay between attempts
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .field("sleeper", &"<sleeper>")
            .finish()
    }
}

impl RetryPolicy {
    /// Delay used when none is configured
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

    /// `max_attempts` must be at least 1
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self> {
        if max_attempts == 0 {
            return Err(Error::InvalidPolicy(
                "max_attempts must be at least 1 (got 0)".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            delay,
            sleeper: Arc::new(ThreadSleeper),
        })
    }

    /// Like [`RetryPolicy::new`] with the delay in (fractional) seconds
    pub fn from_secs(max_attempts: u32, delay_secs: f64) -> Result<Self> {
        let delay = Duration::try_from_secs_f64(delay_secs).map_err(|_| {
            Error::InvalidPolicy(format!(
                "delay must be a finite, non-negative number of seconds (got {})",
                delay_secs
            ))
        })?;
        Self::new(max_attempts, delay)
    }

    /// Replace the sleeper used between attempts
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wrap `f`; returns `None` once every attempt has failed
    pub fn apply<F, A, R>(self, f: F) -> impl Fn(A) -> Option<R>
    where
        F: Fn(A) -> std::result::Result<R, CallFailure>,
        A: Clone,
    {
        move |args| self.run(&f, args).ok()
    }

    /// Wrap `f`; returns [`RetryExhausted`] once every attempt has failed
    pub fn apply_checked<F, A, R>(
        self,
        f: F,
    ) -> impl Fn(A) -> std::result::Result<R, RetryExhausted>
    where
        F: Fn(A) -> std::result::Result<R, CallFailure>,
        A: Clone,
    {
        move |args| self.run(&f, args)
    }

    fn run<F, A, R>(&self, f: &F, args: A) -> std::result::Result<R, RetryExhausted>
    where
        F: Fn(A) -> std::result::Result<R, CallFailure>,
        A: Clone,
    {
        let mut attempts = 0;
        tracing::trace!(
            state = ?RetryState::Idle,
            max_attempts = self.max_attempts,
            "retry start"
        );

        loop {
            tracing::trace!(state = ?RetryState::Attempting, attempt = attempts + 1);
            let failure = match failure::invoke(f, args.clone()) {
                Ok(value) => {
                    tracing::trace!(state = ?RetryState::Succeeded, attempts = attempts + 1);
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            attempts += 1;
            tracing::warn!(
                attempt = attempts,
                error = %failure,
                "Attempt {} failed: {}",
                attempts,
                failure
            );

            if attempts >= self.max_attempts {
                tracing::error!(
                    state = ?RetryState::Exhausted,
                    attempts,
                    "Function failed after {} attempts",
                    attempts
                );
                return Err(RetryExhausted {
                    attempts,
                    last: failure,
                });
            }

            tracing::trace!(state = ?RetryState::Sleeping, delay = ?self.delay);
            self.sleeper.sleep(self.delay);
        }
    }
}
