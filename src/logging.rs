//! Logging initialization.
//!
//! Logs go to stderr; stdout is reserved for command output
//! (query results, stats tables, JSON).

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber.
///
/// `verbose` flips the default level from INFO to DEBUG; `RUST_LOG`
/// overrides both when set.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
