//! Tracing subscriber setup shared by the three binaries.

use crate::config::LogLevel;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` directives are honoured; the configured `level` is added on
/// top, and `verbose` raises it to DEBUG. `json` switches to structured JSON
/// lines. Calling this twice keeps the first subscriber.
pub fn init_tracing(level: LogLevel, verbose: bool, json: bool) {
    let level = if verbose && level != LogLevel::Trace {
        LogLevel::Debug
    } else {
        level
    };

    let filter = match level.as_directive().parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };

    let result = if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
