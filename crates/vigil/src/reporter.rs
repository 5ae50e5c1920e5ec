//! Reporter - run progress as structured log events
//!
//! The runner notifies a [`RunListener`] at every lifecycle step. The
//! default listener, [`TracingReporter`], turns them into `tracing` events.

use std::fmt::Debug;

use crate::runner::{RunSummary, TestResults, TestcaseReport};

/// Receives lifecycle notifications from the runner.
///
/// Every method has a no-op default.
pub trait RunListener: Send + Sync + Debug {
    /// A suite is about to run
    fn suite_started(&self, _suite: &str) {}

    /// A test case is about to run its first attempt
    fn testcase_started(&self, _suite: &str, _test: &str) {}

    /// A failing test case is about to run again
    fn testcase_retrying(&self, _suite: &str, _test: &str, _attempt: u32, _max: u32) {}

    /// A test case published its final report
    fn testcase_finished(&self, _suite: &str, _test: &str, _report: &TestcaseReport) {}

    /// Test cases that will not run
    fn testcases_skipped(&self, _suite: &str, _tests: &[String]) {}

    /// A failing suite is about to run again
    fn suite_retrying(&self, _suite: &str, _attempt: u32, _max: u32) {}

    /// A suite finished with its final aggregate
    fn suite_finished(&self, _results: &TestResults) {}

    /// Every suite of a run finished
    fn run_finished(&self, _summary: &RunSummary) {}
}

/// Logs run progress through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl TracingReporter {
    /// Create a new reporter
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl RunListener for TracingReporter {
    fn suite_started(&self, suite: &str) {
        tracing::info!(suite, "Running suite");
    }

    fn testcase_started(&self, suite: &str, test: &str) {
        tracing::info!(suite, test, "Running: {test}");
    }

    fn testcase_retrying(&self, suite: &str, test: &str, attempt: u32, max: u32) {
        tracing::info!(suite, test, attempt, "Retrying ({attempt}/{max}): {test}");
    }

    fn testcase_finished(&self, suite: &str, test: &str, report: &TestcaseReport) {
        if report.is_success() {
            tracing::info!(
                suite,
                test,
                passed = report.passed,
                time = report.time,
                "OK. {} assertions passed",
                report.passed
            );
        } else {
            tracing::warn!(
                suite,
                test,
                failed = report.failed,
                errors = report.errors,
                "FAILED: {} failed, {} errors, {} passed",
                report.failed,
                report.errors,
                report.passed
            );
        }
    }

    fn testcases_skipped(&self, suite: &str, tests: &[String]) {
        if !tests.is_empty() {
            tracing::info!(suite, skipped = ?tests, "Skipping {} test cases", tests.len());
        }
    }

    fn suite_retrying(&self, suite: &str, attempt: u32, max: u32) {
        tracing::info!(suite, attempt, "Retrying suite ({attempt}/{max})");
    }

    fn suite_finished(&self, results: &TestResults) {
        tracing::info!(
            suite = %results.name,
            passed = results.passed,
            failed = results.failed,
            errors = results.errors,
            skipped = results.skipped,
            time = results.time,
            "Suite finished"
        );
    }

    fn run_finished(&self, summary: &RunSummary) {
        if summary.is_success() {
            tracing::info!(run = %summary.id, suites = summary.suites.len(), "All suites passed");
        } else {
            tracing::warn!(
                run = %summary.id,
                failed = summary.failed(),
                errors = summary.errors(),
                "Run finished with failures"
            );
        }
    }
}
