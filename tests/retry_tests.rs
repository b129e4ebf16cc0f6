//! Integration tests for RetryPolicy
//!
//! Attempt counting, sleep accounting and exhaustion behavior.

use callwrap::{CallFailure, Error, RetryPolicy, Sleeper};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default, Clone)]
struct CountingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl CountingSleeper {
    fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Sleeper for CountingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

#[test]
fn test_two_failures_then_42() {
    let calls = AtomicU32::new(0);
    let answer = RetryPolicy::new(3, Duration::ZERO)
        .unwrap()
        .apply(|_: ()| {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= 2 {
                Err(CallFailure::new(format!("failure #{}", call)))
            } else {
                Ok(42)
            }
        });

    assert_eq!(answer(()), Some(42));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_always_failing_makes_max_attempts_calls() {
    let calls = AtomicU32::new(0);
    let sleeper = CountingSleeper::default();
    let delay = Duration::from_millis(250);
    let broken = RetryPolicy::new(5, delay)
        .unwrap()
        .with_sleeper(sleeper.clone())
        .apply(|_: ()| -> Result<u8, CallFailure> {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CallFailure::new("still broken"))
        });

    assert_eq!(broken(()), None);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(sleeper.sleeps(), vec![delay; 4]);
}

#[test]
fn test_checked_variant_reports_last_failure() {
    let calls = AtomicU32::new(0);
    let broken = RetryPolicy::new(3, Duration::ZERO)
        .unwrap()
        .apply_checked(|_: ()| -> Result<(), CallFailure> {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Err(CallFailure::new(format!("failure #{}", call)))
        });

    let exhausted = broken(()).unwrap_err();
    assert_eq!(exhausted.attempts, 3);
    assert_eq!(exhausted.last.message(), "failure #3");
    assert_eq!(
        exhausted.to_string(),
        "Function failed after 3 attempts: failure #3"
    );
}

#[test]
fn test_real_sleep_between_attempts() {
    let calls = AtomicU32::new(0);
    let delay = Duration::from_millis(20);
    let flaky = RetryPolicy::new(3, delay).unwrap().apply(|_: ()| {
        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
            Err(CallFailure::new("not yet"))
        } else {
            Ok("done")
        }
    });

    let start = Instant::now();
    assert_eq!(flaky(()), Some("done"));
    assert!(start.elapsed() >= delay * 2);
}

#[test]
fn test_arguments_are_replayed_on_each_attempt() {
    let seen = Mutex::new(Vec::new());
    let record = RetryPolicy::new(3, Duration::ZERO)
        .unwrap()
        .apply(|(name, n): (String, u32)| {
            let mut seen = seen.lock().unwrap();
            seen.push((name.clone(), n));
            if seen.len() < 3 {
                Err(CallFailure::new("again"))
            } else {
                Ok(format!("{}-{}", name, n))
            }
        });

    assert_eq!(record(("job".to_string(), 9)), Some("job-9".to_string()));
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|(name, n)| name == "job" && *n == 9));
}

fn timed_out() -> std::io::Result<String> {
    Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"))
}

#[test]
fn test_std_errors_are_retried() {
    let calls = AtomicU32::new(0);
    let read = RetryPolicy::new(2, Duration::ZERO)
        .unwrap()
        .apply_checked(|_: ()| -> Result<String, CallFailure> {
            calls.fetch_add(1, Ordering::SeqCst);
            let text = timed_out()?;
            Ok(text)
        });
    let question_mark_line = line!() - 3;

    let err = read(()).unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(err.last.message(), "timed out");
    assert_eq!(
        err.last.line(),
        question_mark_line,
        "line must point at the `?` in the retried body"
    );
    assert!(err.last.file().ends_with("retry_tests.rs"));
}

#[test]
fn test_zero_attempts_is_invalid() {
    assert!(matches!(
        RetryPolicy::new(0, Duration::from_secs(1)),
        Err(Error::InvalidPolicy(_))
    ));
}
