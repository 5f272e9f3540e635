//! Tracing initialisation for the binary.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber, writing to stderr so that reports on stdout
/// stay machine-readable. The level comes from `RUST_LOG` (default `warn`).
///
/// Subsequent calls are no-ops.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
