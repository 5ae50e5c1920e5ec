//! Test case execution: one attempt, and the retry loop around it.

use std::time::{Duration, Instant};

use super::config::RunConfig;
use super::hook::{HookKind, HookRunner, Phase, RunContext};
use super::module::Hooks;
use super::results::{TestResults, TestcaseReport};
use super::step::StepFn;
use crate::reporter::RunListener;
use crate::result::{VigilError, VigilResult};

/// Outcome of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseOutcome {
    /// `beforeEach`, body and `afterEach` ran
    Completed {
        /// Wall time of the attempt
        elapsed: Duration,
    },
    /// The session was terminated in `beforeEach`; nothing else ran
    Skipped,
}

/// What the suite does after a test case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseFlow {
    /// Run the next test case
    Next,
    /// Skip every remaining test case
    SkipRemaining,
    /// Stop the test cases; the suite is going to be retried
    StopForSuiteRetry,
}

/// One attempt of a test case
#[derive(Debug)]
pub struct TestCase<'a> {
    name: &'a str,
    body: &'a StepFn,
    hooks: &'a Hooks,
    config: &'a RunConfig,
    skip_on_fail: bool,
}

impl<'a> TestCase<'a> {
    /// Create an attempt
    #[must_use]
    pub const fn new(
        name: &'a str,
        body: &'a StepFn,
        hooks: &'a Hooks,
        config: &'a RunConfig,
        skip_on_fail: bool,
    ) -> Self {
        Self {
            name,
            body,
            hooks,
            config,
            skip_on_fail,
        }
    }

    /// Run `beforeEach`, the body and `afterEach`.
    ///
    /// `afterEach` runs whatever happened before it. The first fatal error is
    /// returned once it has finished.
    pub async fn run(&self, ctx: &mut RunContext) -> VigilResult<CaseOutcome> {
        let start = Instant::now();
        let mut first_error: Option<VigilError> = None;

        if let Some(step) = self.hooks.get(HookKind::BeforeEach) {
            let runner = HookRunner::new(
                Phase::suite(HookKind::BeforeEach),
                step,
                self.config.hook_timeout(),
            );
            if let Err(err) = runner.run(ctx).await {
                first_error = Some(err);
            }
        }

        if self.skip_on_fail && ctx.client.session().terminated() {
            tracing::debug!(test = self.name, "session terminated in beforeEach, skipping");
            return match first_error {
                Some(err) => Err(err),
                None => Ok(CaseOutcome::Skipped),
            };
        }

        if first_error.is_none() {
            let runner = HookRunner::new(
                Phase::Test(self.name.to_string()),
                self.body,
                self.config.test_timeout(),
            );
            if let Err(err) = runner.run(ctx).await {
                first_error = Some(err);
            }
        } else {
            tracing::debug!(test = self.name, "beforeEach failed, skipping the test body");
        }

        if let Some(step) = self.hooks.get(HookKind::AfterEach) {
            let runner = HookRunner::new(
                Phase::suite(HookKind::AfterEach),
                step,
                self.config.hook_timeout(),
            );
            if let Err(err) = runner.run(ctx).await {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(CaseOutcome::Completed {
                elapsed: start.elapsed(),
            }),
        }
    }
}

/// Runs a test case until it passes or its retries are used up
#[derive(Debug)]
pub struct TestCaseRunner<'a> {
    suite: &'a str,
    name: &'a str,
    body: &'a StepFn,
    hooks: &'a Hooks,
    config: &'a RunConfig,
    skip_on_fail: bool,
    suite_retries_left: bool,
    listener: &'a dyn RunListener,
}

impl<'a> TestCaseRunner<'a> {
    /// Create a runner for the test case `name` of `suite`
    #[must_use]
    pub fn new(
        suite: &'a str,
        name: &'a str,
        body: &'a StepFn,
        hooks: &'a Hooks,
        config: &'a RunConfig,
        listener: &'a dyn RunListener,
    ) -> Self {
        Self {
            suite,
            name,
            body,
            hooks,
            config,
            skip_on_fail: config.skip_testcases_on_fail,
            suite_retries_left: false,
            listener,
        }
    }

    /// Override the skip-after-hard-failure setting
    #[must_use]
    pub const fn skip_on_fail(mut self, enabled: bool) -> Self {
        self.skip_on_fail = enabled;
        self
    }

    /// Whether the suite can still be retried
    #[must_use]
    pub const fn suite_retries_left(mut self, left: bool) -> Self {
        self.suite_retries_left = left;
        self
    }

    /// Run attempts and publish the final report into `results`.
    ///
    /// A fatal error of the final attempt is returned after its report has
    /// been published.
    pub async fn run(
        &self,
        ctx: &mut RunContext,
        results: &mut TestResults,
    ) -> VigilResult<CaseFlow> {
        let client = ctx.client.clone();
        let mut retries = 0;
        self.listener.testcase_started(self.suite, self.name);

        loop {
            client.clear_results();
            client.set_current_test(Some(self.name));

            let start = Instant::now();
            let outcome = TestCase::new(
                self.name,
                self.body,
                self.hooks,
                self.config,
                self.skip_on_fail,
            )
            .run(ctx)
            .await;
            let attempt = client.take_results();

            let elapsed = match &outcome {
                Ok(CaseOutcome::Skipped) => {
                    results.merge(attempt);
                    results.add_skipped(std::iter::once(self.name.to_string()));
                    self.listener
                        .testcases_skipped(self.suite, &[self.name.to_string()]);
                    return Ok(CaseFlow::SkipRemaining);
                }
                Ok(CaseOutcome::Completed { elapsed }) => *elapsed,
                Err(_) => start.elapsed(),
            };

            let failed = attempt.has_failures() || outcome.is_err();
            let retryable = outcome.as_ref().map_or_else(VigilError::is_retryable, |_| true);

            if failed && retryable && retries < self.config.retries {
                retries += 1;
                results.retries += 1;
                if let Err(err) = &outcome {
                    tracing::debug!(test = self.name, error = %err, "error absorbed by retry");
                }
                client.session().reset_terminated();
                self.listener
                    .testcase_retrying(self.suite, self.name, retries, self.config.retries);
                continue;
            }

            let report = TestcaseReport::from_results(attempt, elapsed, retries);
            self.listener.testcase_finished(self.suite, self.name, &report);
            results.add_testcase(self.name, report);

            return match outcome {
                Err(err) => Err(err),
                Ok(_) if failed && self.suite_retries_left => Ok(CaseFlow::StopForSuiteRetry),
                Ok(_) if self.skip_on_fail && client.session().terminated() => {
                    Ok(CaseFlow::SkipRemaining)
                }
                Ok(_) => Ok(CaseFlow::Next),
            };
        }
    }
}
