//! Suite result aggregate.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::assertion::{AssertionRecord, CaseResults};

/// Final report of one test case
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestcaseReport {
    /// Passed assertions
    pub passed: u32,
    /// Failed assertions
    pub failed: u32,
    /// Errors
    pub errors: u32,
    /// Skipped (always 0 for a test case that ran)
    pub skipped: u32,
    /// Total assertions
    pub tests: u32,
    /// Assertion records of the final attempt
    pub assertions: Vec<AssertionRecord>,
    /// Error messages of the final attempt
    pub errmessages: Vec<String>,
    /// Elapsed seconds of the final attempt
    pub time: f64,
    /// Retries consumed
    pub retries: u32,
}

impl TestcaseReport {
    /// Build a report from the results of one attempt
    #[must_use]
    pub fn from_results(results: CaseResults, elapsed: Duration, retries: u32) -> Self {
        Self {
            passed: results.passed,
            failed: results.failed,
            errors: results.errors,
            skipped: 0,
            tests: results.passed + results.failed,
            assertions: results.assertions,
            errmessages: results.errmessages,
            time: elapsed.as_secs_f64(),
            retries,
        }
    }

    /// Whether the test case passed
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

/// Results of one suite
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResults {
    /// Suite name
    pub name: String,
    /// Passed assertions
    pub passed: u32,
    /// Failed assertions
    pub failed: u32,
    /// Errors
    pub errors: u32,
    /// Skipped test cases
    pub skipped: u32,
    /// Total assertions
    pub tests: u32,
    /// Error messages in order
    pub errmessages: Vec<String>,
    /// Reports by test case name
    pub testcases: BTreeMap<String, TestcaseReport>,
    /// Elapsed seconds
    pub time: f64,
    /// When the suite (or its last retry) started
    pub timestamp: DateTime<Utc>,
    /// Test case retries consumed
    pub retries: u32,
    /// Suite retries consumed
    pub suite_retries: u32,
    /// Names of the skipped test cases
    pub skipped_tests: Vec<String>,
}

impl TestResults {
    /// Empty aggregate
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: 0,
            failed: 0,
            errors: 0,
            skipped: 0,
            tests: 0,
            errmessages: Vec::new(),
            testcases: BTreeMap::new(),
            time: 0.0,
            timestamp: Utc::now(),
            retries: 0,
            suite_retries: 0,
            skipped_tests: Vec::new(),
        }
    }

    /// Add results collected outside a test case (hooks)
    pub fn merge(&mut self, results: CaseResults) {
        self.passed += results.passed;
        self.failed += results.failed;
        self.errors += results.errors;
        self.tests += results.passed + results.failed;
        self.errmessages.extend(results.errmessages);
    }

    /// Publish the final report of a test case
    pub fn add_testcase(&mut self, name: impl Into<String>, report: TestcaseReport) {
        self.passed += report.passed;
        self.failed += report.failed;
        self.errors += report.errors;
        self.tests += report.tests;
        self.errmessages.extend(report.errmessages.iter().cloned());
        let _ = self.testcases.insert(name.into(), report);
    }

    /// Record test cases that were not run
    pub fn add_skipped(&mut self, names: impl IntoIterator<Item = String>) {
        for name in names {
            self.skipped += 1;
            self.skipped_tests.push(name);
        }
    }

    /// Clear everything except the name and the suite retry counter
    pub fn reset(&mut self) {
        let suite_retries = self.suite_retries;
        *self = Self::new(std::mem::take(&mut self.name));
        self.suite_retries = suite_retries;
    }

    /// Whether anything failed or errored
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.failed > 0 || self.errors > 0
    }
}
