//! Tracing subscriber setup
//!
//! The wrappers emit structured `tracing` events (analyzed calls, retry
//! attempts, notification failures). Binaries embedding callwrap can install
//! a stderr subscriber with [`init_tracing`]; libraries should leave
//! subscriber setup to their host.

use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber
///
/// With `debug` every event down to TRACE is shown; otherwise `RUST_LOG`
/// decides, defaulting to INFO. Returns `false` when a global subscriber was
/// already installed, in which case nothing changes.
pub fn init_tracing(debug: bool) -> bool {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

