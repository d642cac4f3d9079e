//! Logging setup.
//!
//! Logs go to **stderr**. Stdout carries the handshake line the engine reads
//! to find the provider's address, so nothing else may be printed there.
//!
//! Filtering follows `RUST_LOG`, for example
//! `RUST_LOG=hemmer_provider_arangodb=debug` to see every remote call.

use tracing_subscriber::{fmt, prelude::*, registry::Registry, EnvFilter, Layer};

/// Default filter used when `RUST_LOG` is unset.
pub const DEFAULT_LEVEL: &str = "info";

fn stderr_layer<S>() -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn subscriber(default_level: &str) -> impl tracing::Subscriber + Send + Sync + 'static {
    Registry::default()
        .with(env_filter(default_level))
        .with(stderr_layer())
}

/// Install the global subscriber at `info` unless `RUST_LOG` says otherwise.
///
/// Returns `false` when a subscriber was already installed, which happens
/// when the provider is embedded in a test harness.
pub fn init_logging() -> bool {
    init_logging_with_default(DEFAULT_LEVEL)
}

/// Like [`init_logging`] with a different fallback level.
pub fn init_logging_with_default(default_level: &str) -> bool {
    tracing::subscriber::set_global_default(subscriber(default_level)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new(DEFAULT_LEVEL).is_ok());
        assert!(EnvFilter::try_new("hemmer_provider_arangodb=debug").is_ok());
        assert!(EnvFilter::try_new("warn,hemmer_provider_arangodb::arango=trace").is_ok());
    }

    #[test]
    fn test_scoped_subscriber_captures_events() {
        let _guard = tracing::subscriber::set_default(subscriber("debug"));
        tracing::debug!(database = "mydb", "scoped subscriber active");
    }
}
