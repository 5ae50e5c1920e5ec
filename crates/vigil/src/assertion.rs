//! Assertions for test validation.
//!
//! [`Assertion`] builds [`AssertionResult`]s; the [`Client`](crate::Client)
//! records them as hard assertions (`assert_*`, abort the phase on failure) or
//! soft verifications (`verify_*`, recorded only).

use serde::Serialize;
use std::fmt::Debug;

use crate::result::Severity;

/// Result of an assertion
#[derive(Debug, Clone)]
pub struct AssertionResult {
    /// Whether the assertion passed
    pub passed: bool,
    /// Human-readable message
    pub message: String,
}

impl AssertionResult {
    /// Create a passing assertion result
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            passed: true,
            message: String::new(),
        }
    }

    /// Create a failing assertion result
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }

    /// Prefix the message with a description of what was checked
    #[must_use]
    pub fn described(mut self, description: &str) -> Self {
        self.message = if self.message.is_empty() {
            description.to_string()
        } else {
            format!("{description}: {}", self.message)
        };
        self
    }
}

/// Assertion helpers for testing
#[derive(Debug)]
pub struct Assertion;

impl Assertion {
    /// Assert two values are equal
    #[must_use]
    pub fn equals<T: PartialEq + Debug>(expected: &T, actual: &T) -> AssertionResult {
        if expected == actual {
            AssertionResult::pass()
        } else {
            AssertionResult::fail(format!("expected {expected:?}, got {actual:?}"))
        }
    }

    /// Assert a string contains a substring
    #[must_use]
    pub fn contains(haystack: &str, needle: &str) -> AssertionResult {
        if haystack.contains(needle) {
            AssertionResult::pass()
        } else {
            AssertionResult::fail(format!("expected '{haystack}' to contain '{needle}'"))
        }
    }

    /// Assert a condition is true
    #[must_use]
    pub fn is_true(condition: bool, message: &str) -> AssertionResult {
        if condition {
            AssertionResult::pass()
        } else {
            AssertionResult::fail(message)
        }
    }
}

/// One recorded assertion, as it appears in a test case report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionRecord {
    /// Message describing the check
    pub message: String,
    /// Whether it passed
    pub passed: bool,
    /// `hard` for assertions, `soft` for verifications
    pub severity: Severity,
}

/// Counters and records collected by a client while a phase runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaseResults {
    /// Passed assertions
    pub passed: u32,
    /// Failed assertions (hard and soft)
    pub failed: u32,
    /// Errors
    pub errors: u32,
    /// Assertion records in order
    pub assertions: Vec<AssertionRecord>,
    /// Error messages in order
    pub errmessages: Vec<String>,
}

impl CaseResults {
    /// Record an assertion outcome
    pub fn record(&mut self, result: &AssertionResult, severity: Severity) {
        if result.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.assertions.push(AssertionRecord {
            message: result.message.clone(),
            passed: result.passed,
            severity,
        });
    }

    /// Record an error message
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors += 1;
        self.errmessages.push(message.into());
    }

    /// Move everything recorded in `other` into `self`
    pub fn append(&mut self, mut other: Self) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.errors += other.errors;
        self.assertions.append(&mut other.assertions);
        self.errmessages.append(&mut other.errmessages);
    }

    /// Whether anything failed or errored
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.failed > 0 || self.errors > 0
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passed == 0 && self.failed == 0 && self.errors == 0 && self.assertions.is_empty()
    }
}
