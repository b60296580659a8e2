//! Tracing setup for hosts embedding the engine

use tracing_subscriber::{EnvFilter, fmt, prelude::*, util::TryInitError};

/// Installs a JSON `tracing` subscriber filtered by `RUST_LOG`
///
/// Falls back to `info` when `RUST_LOG` is unset or invalid. Session
/// records are emitted under the `refgame::records` target, so a filter
/// such as `warn,refgame::records=info` keeps only the data log.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing() -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_ansi(false)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
}
