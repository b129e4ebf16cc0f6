//! Notifications fired alongside a wrapped call
//!
//! [`NotificationWrapper::wrap`] fixes a subject and body; applying the
//! resulting [`Notification`] to a function yields a function that, on every
//! call:
//!
//! 1. spawns a background thread that sends exactly one notification,
//! 2. runs the wrapped body on the calling thread,
//! 3. joins the notification thread before returning.
//!
//! ```text
//! caller ──┬── f(args) ───────────────┬── join ──► result of f
//!          └── spawn: transport.send ─┘
//! ```
//!
//! The join is unconditional: it also happens when the body panics (the panic
//! resumes afterwards). Transport errors and transport panics are logged and
//! never change the wrapped call's outcome.
//!
//! Delivery itself is delegated to a [`Transport`]; mail submission, TLS and
//! authentication live entirely inside the transport implementation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Errors surfaced by a notification transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Recipient rejected: {recipient}")]
    Rejected { recipient: String },

    #[error("Notification task panicked: {0}")]
    Panicked(String),
}

/// Endpoint, credentials and recipients for notifications
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Submission endpoint, e.g. `smtp.example.com:587`
    pub host: String,
    /// Account name; also used as the sender address
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl NotificationConfig {
    pub fn new<I, S>(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        recipients: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            recipients: recipients.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("recipients", &self.recipients)
            .finish()
    }
}

/// Capability to deliver a subject + body message to the configured recipients
pub trait Transport: Send + Sync {
    fn send(
        &self,
        config: &NotificationConfig,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError>;
}

/// Dry-run transport: logs the message through `tracing` instead of sending it
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl Transport for LogTransport {
    fn send(
        &self,
        config: &NotificationConfig,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            host = %config.host,
            from = %config.username,
            recipients = ?config.recipients,
            subject,
            body,
            "notification"
        );
        Ok(())
    }
}

/// Adapts a closure into a [`Transport`]
pub struct FnTransport<F>(F);

impl<F> FnTransport<F>
where
    F: Fn(&NotificationConfig, &str, &str) -> Result<(), NotificationError> + Send + Sync,
{
    pub fn new(send: F) -> Self {
        Self(send)
    }
}

impl<F> Transport for FnTransport<F>
where
    F: Fn(&NotificationConfig, &str, &str) -> Result<(), NotificationError> + Send + Sync,
{
    fn send(
        &self,
        config: &NotificationConfig,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        (self.0)(config, subject, body)
    }
}

/// Factory for notification decorators sharing one config and transport
#[derive(Clone)]
pub struct NotificationWrapper {
    config: Arc<NotificationConfig>,
    transport: Arc<dyn Transport>,
}

impl NotificationWrapper {
    pub fn new(config: NotificationConfig, transport: impl Transport + 'static) -> Self {
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(config: NotificationConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    /// Decorator that sends `subject`/`body` around every wrapped call
    pub fn wrap(&self, subject: impl Into<String>, body: impl Into<String>) -> Notification {
        let subject: String = subject.into();
        let body: String = body.into();
        Notification {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
            subject: Arc::from(subject),
            body: Arc::from(body),
        }
    }
}

impl fmt::Debug for NotificationWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationWrapper")
            .field("config", &self.config)
            .field("transport", &"<transport>")
            .finish()
    }
}

/// Decorator produced by [`NotificationWrapper::wrap`]
#[derive(Clone)]
pub struct Notification {
    config: Arc<NotificationConfig>,
    transport: Arc<dyn Transport>,
    subject: Arc<str>,
    body: Arc<str>,
}

impl Notification {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Send one notification synchronously and report the outcome
    pub fn dispatch(&self) -> Result<(), NotificationError> {
        self.transport.send(&self.config, &self.subject, &self.body)
    }

    /// Wrap `f`; its arguments and result pass through untouched
    pub fn apply<F, A, R>(self, f: F) -> impl Fn(A) -> R
    where
        F: Fn(A) -> R,
    {
        move |args| {
            let task = self.spawn();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(args)));
            if let Some(handle) = task {
                settle(&self.subject, handle.join());
            }
            match outcome {
                Ok(result) => result,
                Err(payload) => panic::resume_unwind(payload),
            }
        }
    }

    /// Start the notification thread; falls back to sending inline if the
    /// thread cannot be created
    fn spawn(&self) -> Option<JoinHandle<Result<(), NotificationError>>> {
        let task = self.clone();
        match thread::Builder::new()
            .name("callwrap-notify".to_string())
            .spawn(move || task.dispatch())
        {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::warn!(error = %err, "could not spawn notification thread, sending inline");
                let inline = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch()));
                settle(&self.subject, inline);
                None
            }
        }
    }
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("config", &self.config)
            .field("subject", &self.subject)
            .field("body", &self.body)
            .finish()
    }
}

/// Log the outcome of a joined notification task
fn settle(subject: &str, joined: thread::Result<Result<(), NotificationError>>) {
    let error = match joined {
        Ok(Ok(())) => {
            tracing::debug!(subject, "notification sent");
            return;
        }
        Ok(Err(err)) => err,
        Err(payload) => NotificationError::Panicked(panic_text(payload.as_ref())),
    };
    tracing::warn!(subject, error = %error, "notification failed");
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> NotificationConfig {
        NotificationConfig::new(
            "smtp.example.com:587",
            "bot@example.com",
            "hunter2",
            ["ops@example.com"],
        )
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let debug = format!("{:?}", config());
        assert!(debug.contains("bot@example.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_config_new_collects_recipients() {
        let config = NotificationConfig::new("h", "u", "p", vec!["a", "b"]);
        assert_eq!(config.recipients, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_wrap_keeps_subject_and_body() {
        let wrapper = NotificationWrapper::new(config(), LogTransport);
        let notification = wrapper.wrap("Job started", "nightly export");
        assert_eq!(notification.subject(), "Job started");
        assert_eq!(notification.body(), "nightly export");
        assert_eq!(wrapper.config().host, "smtp.example.com:587");
    }

    #[test]
    fn test_dispatch_passes_message_to_transport() {
        let transport = FnTransport::new(|config, subject, body| {
            assert_eq!(config.recipients, vec!["ops@example.com".to_string()]);
            assert_eq!(subject, "s");
            assert_eq!(body, "b");
            Ok(())
        });
        let wrapper = NotificationWrapper::new(config(), transport);
        assert!(wrapper.wrap("s", "b").dispatch().is_ok());
    }

    #[test]
    fn test_one_send_per_call() {
        let sent = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&sent);
        let transport = FnTransport::new(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let add_one = NotificationWrapper::new(config(), transport)
            .wrap("s", "b")
            .apply(|x: i32| x + 1);

        assert_eq!(add_one(1), 2);
        assert_eq!(add_one(2), 3);
        assert_eq!(sent.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_transport_error_is_isolated() {
        let transport = FnTransport::new(|_, _, _| {
            Err(NotificationError::Transport("connection refused".to_string()))
        });
        let notification = NotificationWrapper::new(config(), transport).wrap("s", "b");
        assert_eq!(
            notification.dispatch(),
            Err(NotificationError::Transport("connection refused".to_string()))
        );
        let echo = notification.apply(|s: String| s.to_uppercase());
        assert_eq!(echo("ok".to_string()), "OK");
    }

    #[test]
    fn test_panic_text() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("smtp down");
        assert_eq!(panic_text(payload.as_ref()), "smtp down");
        let payload: Box<dyn std::any::Any + Send> = Box::new(1u8);
        assert_eq!(panic_text(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_error_display() {
        let err = NotificationError::Rejected {
            recipient: "x@example.com".to_string(),
        };
        assert_eq!(err.to_string(), "Recipient rejected: x@example.com");
    }
}
