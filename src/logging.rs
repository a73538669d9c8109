//! Subscriber setup for the binary. Library code only emits `tracing` events.

use std::io;

use tracing_subscriber::EnvFilter;

/// Installs a stderr `fmt` subscriber filtered by `directive`.
///
/// An unparsable directive falls back to the default level; a subscriber that
/// is already installed is left in place.
pub fn init(directive: &str) {
    let filter = EnvFilter::try_new(directive)
        .unwrap_or_else(|_| EnvFilter::new(crate::config::DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .try_init();
}
