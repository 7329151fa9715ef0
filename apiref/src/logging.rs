//! Logging initialization: human-readable events on stderr.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` applies unless `verbose` forces debug.
pub fn init(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
