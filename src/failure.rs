//! Failures raised by wrapped call bodies
//!
//! A wrapped body can fail in two ways: it returns `Err`, or it panics.
//! Both are folded into a [`CallFailure`] carrying a human-readable message
//! and the source location where the failure surfaced.
//!
//! # Source locations
//!
//! - `Err` values: wrapped bodies return `Result<R, CallFailure>`.
//!   [`CallFailure::new`] and `CallFailure::from` are `#[track_caller]`, and
//!   so is the conversion behind `?`, so the recorded line is the one in the
//!   body where the failure was built or where `?` converted a foreign error.
//!   `err.into()` goes through the blanket `Into` impl and loses the caller;
//!   use `?` or `CallFailure::from(err)` instead.
//! - Panics: a process-wide panic hook records the panic's own `Location`
//!   while the thread is inside a wrapped call. Outside wrapped calls the hook
//!   defers to whatever hook was installed before it.
//!
//! If the host replaces the panic hook after the first wrapped call, the next
//! panic inside a wrapped call is reported with a location inside this module
//! (the message is still the panic's). That call re-arms the capture hook on
//! top of the host's hook, so later panics are located again.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::atomic::{AtomicBool, Ordering};

/// A failed call: what went wrong, and where
#[derive(Clone, PartialEq, Eq)]
pub struct CallFailure {
    message: String,
    file: String,
    line: u32,
}

impl CallFailure {
    /// Build a failure located at the caller
    ///
    /// # Example
    /// ```
    /// use callwrap::CallFailure;
    ///
    /// let failure = CallFailure::new("disk full");
    /// assert_eq!(failure.message(), "disk full");
    /// assert_eq!(failure.line(), line!() - 2);
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self::at(message, Location::caller())
    }

    /// Build a failure at an explicit source location
    pub fn at(message: impl Into<String>, location: &Location<'_>) -> Self {
        Self {
            message: message.into(),
            file: location.file().to_string(),
            line: location.line(),
        }
    }

    /// Rendering of the underlying error or panic payload
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Source file the failure surfaced in
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Source line the failure surfaced at (always > 0)
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Fallback when a panic slipped past the capture hook
    #[track_caller]
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        Self::new(payload_message(payload))
    }
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallFailure")
            .field("message", &self.message)
            .field("location", &format_args!("{}:{}", self.file, self.line))
            .finish()
    }
}

// CallFailure deliberately does not implement std::error::Error, which keeps
// this blanket impl coherent with `impl<T> From<T> for T`.
impl<E> From<E> for CallFailure
where
    E: std::error::Error,
{
    #[track_caller]
    fn from(err: E) -> Self {
        Self::new(err.to_string())
    }
}

thread_local! {
    /// Nesting depth of wrapped calls on this thread
    static CAPTURE_DEPTH: Cell<usize> = const { Cell::new(0) };
    /// Panic recorded by the hook, waiting to be picked up by `invoke`
    static CAPTURED: RefCell<Option<CallFailure>> = const { RefCell::new(None) };
}

/// Whether the capture hook is believed to be the active panic hook
static HOOK_ARMED: AtomicBool = AtomicBool::new(false);

fn install_hook() {
    if HOOK_ARMED
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return;
    }
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if CAPTURE_DEPTH.with(Cell::get) == 0 {
            previous(info);
            return;
        }
        let message = payload_message(info.payload());
        let failure = match info.location() {
            Some(location) => CallFailure::at(message, location),
            None => CallFailure::new(message),
        };
        CAPTURED.with(|slot| *slot.borrow_mut() = Some(failure));
    }));
}

/// The capture hook missed a panic, so another hook replaced it
fn rearm_hook() {
    if HOOK_ARMED.swap(false, Ordering::AcqRel) {
        tracing::debug!("panic hook was replaced, capture hook re-armed for the next call");
    }
}

/// Marks the current thread as inside a wrapped call for its lifetime
struct CaptureGuard;

impl CaptureGuard {
    fn enter() -> Self {
        CAPTURE_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        CAPTURE_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Run a wrapped body once, folding `Err` and panics into a [`CallFailure`]
///
/// Panics never escape this function and are not printed by the default hook.
pub(crate) fn invoke<F, A, R>(f: &F, args: A) -> Result<R, CallFailure>
where
    F: Fn(A) -> Result<R, CallFailure>,
{
    install_hook();
    let _guard = CaptureGuard::enter();
    CAPTURED.with(|slot| slot.borrow_mut().take());

    match panic::catch_unwind(AssertUnwindSafe(|| f(args))) {
        Ok(result) => result,
        Err(payload) => match CAPTURED.with(|slot| slot.borrow_mut().take()) {
            Some(failure) => Err(failure),
            None => {
                rearm_hook();
                Err(CallFailure::from_payload(payload.as_ref()))
            }
        },
    }
}
