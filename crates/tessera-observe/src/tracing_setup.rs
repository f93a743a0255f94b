//! Tracing subscriber initialization with human or JSON structured logging.
//!
//! # Usage
//!
//! ```no_run
//! // Human-readable logs at warn level (RUST_LOG overrides)
//! tessera_observe::tracing_setup::init_tracing("warn", false).unwrap();
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Pick a filter directive from the CLI verbosity flags.
pub fn verbosity_filter(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "warn",
        1 => "info,tessera=debug",
        _ => "trace",
    }
}

/// Initialize the global tracing subscriber.
///
/// - `RUST_LOG`, when set, takes precedence over `default_filter`.
/// - With `json`, events are written as one JSON object per line (to stderr,
///   so command output on stdout stays parseable).
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set or the
/// filter directive is invalid.
pub fn init_tracing(default_filter: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.is_empty() => EnvFilter::try_new(directives)?,
        _ => EnvFilter::try_new(default_filter)?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    Ok(())
}
