//! Structured logging with `tracing`.
//!
//! Every tabdeck crate logs through `tracing` macros. Binaries call
//! [`init_subscriber`] once at startup; libraries never install a subscriber.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber with stderr output.
///
/// `RUST_LOG` takes precedence over `level` when set. With `json` enabled,
/// each event is written as one JSON object per line. Subsequent calls are
/// no-ops.
pub fn init_subscriber(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // try_init fails (harmlessly) when a subscriber is already installed
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.compact().try_init();
    }
}
