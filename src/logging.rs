//! Diagnostic logging setup.
//!
//! Diagnostics go to stderr through `tracing`. User-facing notices are
//! rendered separately by [`crate::output`].

use tracing_subscriber::EnvFilter;

/// Filter directive for a `-v` count when `RUST_LOG` is unset.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "voxturn=warn",
        1 => "voxturn=debug",
        _ => "voxturn=trace",
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `verbosity`.
///
/// Calling this twice is harmless; the second call keeps the first subscriber.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity > 1)
        .try_init()
    {
        eprintln!("voxturn: logging already initialized: {e}");
    }
}
