//! Result and error types for Vigil.

use serde::Serialize;
use thiserror::Error;

/// Result type for Vigil operations
pub type VigilResult<T> = Result<T, VigilError>;

/// How an error affects the phase (hook or test case) that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Recorded in the results; the phase keeps running
    Soft,
    /// Aborts the current phase and counts as a failure, but is absorbed
    /// at the test case boundary (retries may apply)
    Hard,
    /// Aborts the current phase and propagates after teardown has run
    Fatal,
}

/// Errors that can occur in Vigil
#[derive(Debug, Error)]
pub enum VigilError {
    /// Element declaration or selector value without a selector
    #[error("No selector property for element \"{name}\". Instead found properties: {found}")]
    MissingSelector {
        /// Element name
        name: String,
        /// Comma separated list of the properties that were present
        found: String,
    },

    /// Selector value that cannot be turned into a locator
    #[error("Invalid selector: {message}")]
    InvalidSelector {
        /// Error message
        message: String,
    },

    /// `@name` reference to an element or section that is not declared
    #[error("{name} was not found in \"{parent}\". Available {kind}s: {list}", list = .available.join(","))]
    ElementNotFound {
        /// "element" or "section"
        kind: &'static str,
        /// Referenced name, without the marker
        name: String,
        /// Page or section searched
        parent: String,
        /// Names declared in the parent
        available: Vec<String>,
    },

    /// Command registered twice on the same target
    #[error("The command \"{name}\" is already defined!")]
    DuplicateCommand {
        /// Command name
        name: String,
    },

    /// Command invoked on a page or section that does not expose it
    #[error("Unknown command \"{name}\" on \"{target}\"")]
    UnknownCommand {
        /// Command name
        name: String,
        /// Page or section name
        target: String,
    },

    /// Page definition not present in the registry
    #[error("Page object \"{name}\" is not registered")]
    UnknownPage {
        /// Page name
        name: String,
    },

    /// Invalid run or page configuration
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Hard assertion failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Hook or test did not complete in time
    #[error("done() callback timeout of {ms} ms was reached while executing \"{phase}\". Make sure to call the done() callback when the operation finishes.")]
    Timeout {
        /// Phase description (e.g. "global beforeEach")
        phase: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Error raised by user code, passed to `done()`, or a panic
    #[error("{message}")]
    Uncaught {
        /// Error message
        message: String,
    },

    /// The session reported an error while draining its command queue
    #[error("Command queue error: {message}")]
    Queue {
        /// Error message
        message: String,
    },

    /// Logging subscriber could not be installed
    #[error("Failed to initialise logging: {message}")]
    Logging {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl VigilError {
    /// Create an uncaught error from any message
    #[must_use]
    pub fn uncaught(message: impl Into<String>) -> Self {
        Self::Uncaught {
            message: message.into(),
        }
    }

    /// How this error affects the phase that raised it
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::AssertionFailed { .. } => Severity::Hard,
            _ => Severity::Fatal,
        }
    }

    /// Reclassify as fatal.
    ///
    /// Errors handed to a `done` callback are fatal whatever their kind.
    #[must_use]
    pub fn into_fatal(self) -> Self {
        match self {
            Self::AssertionFailed { message } => Self::Uncaught {
                message: format!("Assertion failed: {message}"),
            },
            other => other,
        }
    }

    /// Whether a test retry may absorb this error.
    ///
    /// Configuration errors repeat on every attempt. A queue error latches
    /// the queue for the rest of the suite, so a retry could not run any
    /// command.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !self.is_configuration() && !matches!(self, Self::Queue { .. })
    }

    /// Whether this error comes from page or run configuration.
    ///
    /// Configuration errors are raised at setup or call time and never retried.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingSelector { .. }
                | Self::InvalidSelector { .. }
                | Self::ElementNotFound { .. }
                | Self::DuplicateCommand { .. }
                | Self::UnknownCommand { .. }
                | Self::UnknownPage { .. }
                | Self::Configuration { .. }
        )
    }
}
