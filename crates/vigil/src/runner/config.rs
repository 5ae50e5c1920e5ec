//! Runner Configuration
//!
//! Timeouts, retry limits and skip behaviour shared by every suite of a run.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::result::{VigilError, VigilResult};

/// Default timeout for asynchronous hooks and tests (ms)
pub const DEFAULT_ASYNC_HOOK_TIMEOUT_MS: u64 = 10_000;

/// Configuration for suite runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Timeout for the asynchronous part of a hook, `0` disables it
    #[serde(alias = "asyncHookTimeout")]
    pub async_hook_timeout_ms: u64,
    /// Timeout for test bodies; falls back to the hook timeout
    #[serde(alias = "testTimeout")]
    pub test_timeout_ms: Option<u64>,
    /// Attempts per failing test case
    pub retries: u32,
    /// Reruns of a failing suite
    #[serde(alias = "suiteRetries")]
    pub suite_retries: u32,
    /// Skip the remaining test cases after a hard failure
    #[serde(alias = "skipTestcasesOnFail")]
    pub skip_testcases_on_fail: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            async_hook_timeout_ms: DEFAULT_ASYNC_HOOK_TIMEOUT_MS,
            test_timeout_ms: None,
            retries: 0,
            suite_retries: 0,
            skip_testcases_on_fail: true,
        }
    }
}

impl RunConfig {
    /// Create a new builder
    #[must_use]
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    /// Parse a configuration from YAML
    pub fn from_yaml_str(yaml: &str) -> VigilResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Parse a configuration from JSON
    pub fn from_json_str(json: &str) -> VigilResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration file; the format follows the extension
    pub fn load(path: impl AsRef<Path>) -> VigilResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&content),
            Some("json") => Self::from_json_str(&content),
            _ => Err(VigilError::Configuration {
                message: format!("unsupported config file: {}", path.display()),
            }),
        }
    }

    /// Hook timeout, `None` when disabled
    #[must_use]
    pub const fn hook_timeout(&self) -> Option<Duration> {
        timeout_from_ms(self.async_hook_timeout_ms)
    }

    /// Test body timeout, `None` when disabled
    #[must_use]
    pub fn test_timeout(&self) -> Option<Duration> {
        timeout_from_ms(self.test_timeout_ms.unwrap_or(self.async_hook_timeout_ms))
    }
}

const fn timeout_from_ms(ms: u64) -> Option<Duration> {
    if ms == 0 {
        None
    } else {
        Some(Duration::from_millis(ms))
    }
}

/// Builder for `RunConfig`
#[derive(Debug, Clone, Default)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    /// Set the async hook timeout (ms)
    #[must_use]
    pub const fn async_hook_timeout_ms(mut self, ms: u64) -> Self {
        self.config.async_hook_timeout_ms = ms;
        self
    }

    /// Set the test body timeout (ms)
    #[must_use]
    pub const fn test_timeout_ms(mut self, ms: u64) -> Self {
        self.config.test_timeout_ms = Some(ms);
        self
    }

    /// Set the test case retry limit
    #[must_use]
    pub const fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    /// Set the suite retry limit
    #[must_use]
    pub const fn suite_retries(mut self, retries: u32) -> Self {
        self.config.suite_retries = retries;
        self
    }

    /// Enable/disable skipping after a hard failure
    #[must_use]
    pub const fn skip_testcases_on_fail(mut self, enabled: bool) -> Self {
        self.config.skip_testcases_on_fail = enabled;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> RunConfig {
        self.config
    }
}
