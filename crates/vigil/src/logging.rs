//! Subscriber setup for the runner's `tracing` events.
//!
//! The filter is read from `VIGIL_LOG`, then `RUST_LOG`, then the default
//! passed by the caller.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::result::{VigilError, VigilResult};

/// Environment variable checked first for the log filter
pub const LOG_ENV: &str = "VIGIL_LOG";

/// Build the filter from the environment, falling back to `default_filter`
pub fn env_filter(default_filter: &str) -> VigilResult<EnvFilter> {
    for var in [LOG_ENV, EnvFilter::DEFAULT_ENV] {
        if let Ok(directives) = std::env::var(var) {
            if !directives.trim().is_empty() {
                return parse_filter(&directives);
            }
        }
    }
    parse_filter(default_filter)
}

fn parse_filter(directives: &str) -> VigilResult<EnvFilter> {
    EnvFilter::try_new(directives).map_err(|e| VigilError::Logging {
        message: format!("invalid filter {directives:?}: {e}"),
    })
}

/// Install a compact human-readable subscriber on stderr
pub fn init_logging(default_filter: &str) -> VigilResult<()> {
    let layer = fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter(default_filter)?)
        .with(layer)
        .try_init()
        .map_err(|e| VigilError::Logging {
            message: e.to_string(),
        })
}

/// Install a JSON subscriber on stderr
pub fn init_json_logging(default_filter: &str) -> VigilResult<()> {
    let layer = fmt::layer()
        .json()
        .with_current_span(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter(default_filter)?)
        .with(layer)
        .try_init()
        .map_err(|e| VigilError::Logging {
            message: e.to_string(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_default_filter() {
        if std::env::var(LOG_ENV).is_ok() || std::env::var(EnvFilter::DEFAULT_ENV).is_ok() {
            return;
        }
        let err = env_filter("vigil=notalevel").unwrap_err();
        assert!(matches!(err, VigilError::Logging { .. }));
    }

    #[test]
    fn test_second_init_fails() {
        let first = init_logging("warn");
        let second = init_json_logging("warn");
        // Another test may have installed a subscriber first
        assert!(first.is_err() || second.is_err());
        assert!(matches!(second, Err(VigilError::Logging { .. })));
    }
}
