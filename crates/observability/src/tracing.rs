//! Tracing/logging initialization.
//!
//! JSON logs with timestamps, filtered via `RUST_LOG` (default `info`). The
//! catalog crates only emit through the `tracing` macros; a host that wants a
//! different subscriber simply skips this and installs its own.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
