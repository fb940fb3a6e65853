//! Logging and tracing configuration
//!
//! Structured logging via the `tracing` crate. Initialize once at startup:
//! ```rust
//! ewfstream::logging::init();
//! ```
//!
//! `RUST_LOG` overrides the defaults at runtime:
//! ```bash
//! RUST_LOG=debug ./ewfhash              # All debug logs
//! RUST_LOG=ewfstream=trace ./ewfhash    # Trace for the library only
//! ```
//!
//! Everything goes to stderr; stdout is reserved for hash/report output.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging/tracing system.
///
/// Call this once at application startup.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Default: info in release, debug in debug builds
        if cfg!(debug_assertions) {
            EnvFilter::new("ewfstream=debug,ewfhash=debug")
        } else {
            EnvFilter::new("ewfstream=info,ewfhash=info")
        }
    });

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    );

    // Set as global default (ignore error if already set)
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Initialize logging with verbose output (file:line, thread IDs).
pub fn init_verbose() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace"));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .pretty(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, info};

    #[test]
    fn test_init() {
        init();
        info!("Test log message");
        debug!(key = "value", "Structured log");
    }
}
