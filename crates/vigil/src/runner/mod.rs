//! Suite Runner
//!
//! Lifecycle execution for test modules: hooks, test cases, retries and
//! result aggregation against a command-queue [`Session`](crate::session::Session).
//!
//! ```text
//! TestRun ─▶ SuiteRunner ─▶ TestCaseRunner ─▶ TestCase ─▶ HookRunner
//!                │                                            │
//!                └──────────── TestResults ◀── CaseResults ◀──┘
//! ```

mod config;
mod hook;
mod module;
mod results;
mod run;
mod step;
mod suite;
mod testcase;

pub use config::{RunConfig, RunConfigBuilder, DEFAULT_ASYNC_HOOK_TIMEOUT_MS};
pub use hook::{HookDescriptor, HookKind, HookRunner, HookScope, Phase, RunContext};
pub use module::{is_hook_key, Hooks, TestModule};
pub use results::{TestResults, TestcaseReport};
pub use run::{RunSummary, TestRun};
pub use step::{Done, StepFn};
pub use suite::{SuiteOutcome, SuiteRunner};
pub use testcase::{CaseFlow, CaseOutcome, TestCase, TestCaseRunner};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::session::MockSession;
    use std::sync::Arc;

    // =========================================================================
    // Public surface
    // =========================================================================

    #[test]
    fn test_default_timeout() {
        assert_eq!(DEFAULT_ASYNC_HOOK_TIMEOUT_MS, 10_000);
        assert_eq!(
            RunConfig::default().async_hook_timeout_ms,
            DEFAULT_ASYNC_HOOK_TIMEOUT_MS
        );
    }

    #[tokio::test]
    async fn test_empty_module_runs() {
        let client = Client::new(Arc::new(MockSession::new()));
        let results = SuiteRunner::new(TestModule::new("empty"), client, RunConfig::default())
            .run()
            .await
            .unwrap();
        assert_eq!(results.name, "empty");
        assert_eq!(results.tests, 0);
        assert!(!results.has_failures());
    }
}
