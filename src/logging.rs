//! Logging setup using tracing.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Resolve the filter directive. `--verbose` forces debug; otherwise an
/// explicit level wins over `RUST_LOG`, and `warn` is the fallback.
fn filter(verbose: bool, level: Option<&str>) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| {
            eprintln!("warning: unknown log level '{}', defaulting to 'warn'", level);
            EnvFilter::new("warn")
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    }
}

/// Install the stderr subscriber. Calling this twice is harmless.
pub fn init(verbose: bool, level: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(filter(verbose, level))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
