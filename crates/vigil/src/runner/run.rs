//! Multi-suite runs: global `before`, every suite in order, global `after`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::config::RunConfig;
use super::hook::{HookKind, HookRunner, Phase, RunContext};
use super::module::{Hooks, TestModule};
use super::results::TestResults;
use super::suite::SuiteRunner;
use crate::assertion::CaseResults;
use crate::client::Client;
use crate::reporter::{RunListener, TracingReporter};
use crate::result::VigilResult;

/// Outcome of a whole run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Unique run id
    pub id: Uuid,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Elapsed seconds
    pub time: f64,
    /// Suite aggregates in run order
    pub suites: Vec<TestResults>,
    /// Results recorded by the global `before`/`after` hooks
    pub globals: CaseResults,
    /// Fatal errors that ended suites or global hooks
    pub fatal_errors: Vec<String>,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            time: 0.0,
            suites: Vec::new(),
            globals: CaseResults::default(),
            fatal_errors: Vec::new(),
        }
    }
}

impl RunSummary {
    /// Failed assertions across every suite and global hook
    #[must_use]
    pub fn failed(&self) -> u32 {
        self.globals.failed + self.suites.iter().map(|s| s.failed).sum::<u32>()
    }

    /// Errors across every suite and global hook
    #[must_use]
    pub fn errors(&self) -> u32 {
        self.globals.errors + self.suites.iter().map(|s| s.errors).sum::<u32>()
    }

    /// Passed assertions across every suite and global hook
    #[must_use]
    pub fn passed(&self) -> u32 {
        self.globals.passed + self.suites.iter().map(|s| s.passed).sum::<u32>()
    }

    /// Whether nothing failed
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.errors() == 0 && self.fatal_errors.is_empty()
    }

    /// Aggregate of a suite by name
    #[must_use]
    pub fn suite(&self, name: &str) -> Option<&TestResults> {
        self.suites.iter().find(|s| s.name == name)
    }
}

/// Runs several test modules against one session
#[derive(Debug)]
pub struct TestRun {
    client: Client,
    config: RunConfig,
    globals: Hooks,
    suites: Vec<TestModule>,
    listener: Arc<dyn RunListener>,
}

impl TestRun {
    /// Create an empty run
    #[must_use]
    pub fn new(client: Client, config: RunConfig) -> Self {
        Self {
            client,
            config,
            globals: Hooks::new(),
            suites: Vec::new(),
            listener: Arc::new(TracingReporter::new()),
        }
    }

    /// Set the global hooks
    #[must_use]
    pub fn globals(mut self, globals: Hooks) -> Self {
        self.globals = globals;
        self
    }

    /// Add a suite
    #[must_use]
    pub fn suite(mut self, module: TestModule) -> Self {
        self.suites.push(module);
        self
    }

    /// Set the lifecycle listener
    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn RunListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Run every suite.
    ///
    /// A fatal error in the global `before` skips the suites and is returned
    /// once the global `after` has run. Fatal suite errors do not stop the
    /// run; they are listed in [`RunSummary::fatal_errors`].
    pub async fn run(self) -> VigilResult<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        tracing::info!(run = %summary.id, suites = self.suites.len(), "run started");
        let mut ctx = RunContext::new(self.client.clone());

        let before = match self.globals.get(HookKind::Before) {
            Some(step) => {
                HookRunner::new(Phase::global(HookKind::Before), step, self.config.hook_timeout())
                    .run(&mut ctx)
                    .await
            }
            None => Ok(()),
        };
        summary.globals = self.client.take_results();

        if before.is_ok() {
            for module in self.suites {
                let outcome = SuiteRunner::new(module, self.client.clone(), self.config.clone())
                    .with_globals(self.globals.clone())
                    .with_listener(self.listener.clone())
                    .execute()
                    .await;
                if let Some(err) = outcome.error {
                    summary
                        .fatal_errors
                        .push(format!("{}: {err}", outcome.results.name));
                }
                summary.suites.push(outcome.results);
                self.client.session().reset_terminated();
            }
        } else {
            tracing::warn!("global before failed, skipping every suite");
        }

        let mut ctx = RunContext::new(self.client.clone());
        if let Some(step) = self.globals.get(HookKind::After) {
            if let Err(err) =
                HookRunner::new(Phase::global(HookKind::After), step, self.config.hook_timeout())
                    .run(&mut ctx)
                    .await
            {
                summary.fatal_errors.push(format!("global after: {err}"));
            }
        }

        summary.globals.append(self.client.take_results());
        summary.time = started.elapsed().as_secs_f64();
        self.listener.run_finished(&summary);
        before.map(|()| summary)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::result::VigilError;
    use crate::runner::StepFn;
    use crate::session::MockSession;
    use std::sync::Mutex;

    type CallLog = Arc<Mutex<Vec<String>>>;

    fn logging(log: &CallLog, label: &'static str) -> StepFn {
        let log = log.clone();
        StepFn::sync(move || {
            log.lock().unwrap().push(label.to_string());
            Ok(())
        })
    }

    fn client() -> Client {
        Client::new(Arc::new(MockSession::new()))
    }

    #[tokio::test]
    async fn test_global_hooks_wrap_suites() {
        let log = CallLog::default();
        let globals = Hooks::new()
            .with(HookKind::Before, logging(&log, "global before"))
            .with(HookKind::BeforeEach, logging(&log, "global beforeEach"))
            .with(HookKind::After, logging(&log, "global after"));

        let summary = TestRun::new(client(), RunConfig::default())
            .globals(globals)
            .suite(TestModule::new("a").step("t1", logging(&log, "a.t1")))
            .suite(TestModule::new("b").step("t1", logging(&log, "b.t1")))
            .run()
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "global before",
                "global beforeEach",
                "a.t1",
                "global beforeEach",
                "b.t1",
                "global after",
            ]
        );
        assert_eq!(summary.suites.len(), 2);
        assert!(summary.suite("b").is_some());
        assert!(summary.is_success());
    }

    #[tokio::test]
    async fn test_fatal_suite_does_not_stop_run() {
        let log = CallLog::default();
        let summary = TestRun::new(client(), RunConfig::default())
            .suite(
                TestModule::new("broken")
                    .step("t1", StepFn::sync(|| Err(VigilError::uncaught("crash")))),
            )
            .suite(TestModule::new("fine").step("t1", logging(&log, "fine.t1")))
            .run()
            .await
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["fine.t1"]);
        assert_eq!(summary.fatal_errors, vec!["broken: crash"]);
        assert_eq!(summary.errors(), 1);
        assert!(!summary.is_success());
    }

    #[tokio::test]
    async fn test_global_before_failure() {
        let log = CallLog::default();
        let globals = Hooks::new()
            .with(HookKind::Before, StepFn::sync(|| Err(VigilError::uncaught("no grid"))))
            .with(HookKind::After, logging(&log, "global after"));

        let err = TestRun::new(client(), RunConfig::default())
            .globals(globals)
            .suite(TestModule::new("a").step("t1", logging(&log, "a.t1")))
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "no grid");
        assert_eq!(*log.lock().unwrap(), vec!["global after"]);
    }

    #[tokio::test]
    async fn test_global_results_survive_suites() {
        let globals = Hooks::new()
            .with(
                HookKind::Before,
                StepFn::session(|client| {
                    let _ = client.verify_that(crate::assertion::AssertionResult::fail("grid slow"));
                    Ok(())
                }),
            )
            .with(HookKind::After, StepFn::session(|client| client.assert_true(true, "closed")));

        let summary = TestRun::new(client(), RunConfig::default())
            .globals(globals)
            .suite(TestModule::new("a").step("t1", StepFn::noop()))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.globals.failed, 1);
        assert_eq!(summary.globals.passed, 1);
        assert_eq!(summary.failed(), 1);
    }
}
