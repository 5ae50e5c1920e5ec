//! Session-bound client handed to steps and page object commands.
//!
//! The client pairs the shared [`Session`] with the results of the phase that
//! is currently running. Hard assertions terminate the session and return
//! [`VigilError::AssertionFailed`], so a step can stop with `?`; soft
//! verifications are only recorded.

use serde_json::Value;
use std::fmt;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::assertion::{Assertion, AssertionResult, CaseResults};
use crate::result::{Severity, VigilError, VigilResult};
use crate::session::{QueuedCommand, Session};

#[derive(Debug, Default)]
struct ClientState {
    results: CaseResults,
    current_test: Option<String>,
    hard_failures: usize,
}

/// Handle on the session plus the results of the running phase
#[derive(Clone)]
pub struct Client {
    session: Arc<dyn Session>,
    state: Arc<Mutex<ClientState>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Client")
            .field("session", &self.session)
            .field("current_test", &state.current_test)
            .field("results", &state.results)
            .finish()
    }
}

impl Client {
    /// Create a client over a session
    #[must_use]
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self {
            session,
            state: Arc::new(Mutex::new(ClientState::default())),
        }
    }

    /// The underlying session
    #[must_use]
    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    /// Add a command to the session queue
    pub fn enqueue(&self, name: impl Into<String>, args: Vec<Value>) {
        self.session.enqueue(QueuedCommand::new(name, args));
    }

    /// Record a hard assertion.
    ///
    /// On failure the session is terminated and the error is returned so the
    /// step can abort with `?`.
    pub fn assert_that(&self, result: AssertionResult) -> VigilResult<()> {
        {
            let mut state = self.state();
            state.results.record(&result, Severity::Hard);
            if result.passed {
                return Ok(());
            }
            state.hard_failures += 1;
        }
        tracing::debug!(message = %result.message, "hard assertion failed");
        self.session.terminate(&result.message);
        Err(VigilError::AssertionFailed {
            message: result.message,
        })
    }

    /// Hard assertion that two values are equal
    pub fn assert_eq<T: PartialEq + Debug>(
        &self,
        expected: &T,
        actual: &T,
        message: &str,
    ) -> VigilResult<()> {
        self.assert_that(Assertion::equals(expected, actual).described(message))
    }

    /// Hard assertion that a condition holds
    pub fn assert_true(&self, condition: bool, message: &str) -> VigilResult<()> {
        self.assert_that(Assertion::is_true(condition, message))
    }

    /// Record a soft verification; returns whether it passed
    pub fn verify_that(&self, result: AssertionResult) -> bool {
        if !result.passed {
            tracing::debug!(message = %result.message, "verification failed");
        }
        self.state().results.record(&result, Severity::Soft);
        result.passed
    }

    /// Soft verification that two values are equal
    pub fn verify_eq<T: PartialEq + Debug>(&self, expected: &T, actual: &T, message: &str) -> bool {
        self.verify_that(Assertion::equals(expected, actual).described(message))
    }

    /// Record an error message
    pub fn record_error(&self, message: impl Into<String>) {
        self.state().results.record_error(message);
    }

    /// Snapshot of the recorded results
    #[must_use]
    pub fn results(&self) -> CaseResults {
        self.state().results.clone()
    }

    /// Take the recorded results, leaving them empty
    pub fn take_results(&self) -> CaseResults {
        std::mem::take(&mut self.state().results)
    }

    /// Discard the recorded results
    pub fn clear_results(&self) {
        self.state().results = CaseResults::default();
    }

    /// Number of hard assertion failures since the client was created
    #[must_use]
    pub fn hard_failure_count(&self) -> usize {
        self.state().hard_failures
    }

    /// Name of the test case currently running
    #[must_use]
    pub fn current_test(&self) -> Option<String> {
        self.state().current_test.clone()
    }

    /// Set or clear the test case currently running
    pub fn set_current_test(&self, name: Option<&str>) {
        self.state().current_test = name.map(str::to_string);
    }

    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::session::MockSession;

    fn client() -> (Arc<MockSession>, Client) {
        let session = Arc::new(MockSession::new());
        let client = Client::new(session.clone());
        (session, client)
    }

    mod hard_assertion_tests {
        use super::*;

        #[test]
        fn test_pass_records() {
            let (session, client) = client();
            client.assert_eq(&"Sign in", &"Sign in", "title").unwrap();
            assert_eq!(client.results().passed, 1);
            assert!(!session.terminated());
            assert_eq!(client.hard_failure_count(), 0);
        }

        #[test]
        fn test_failure_terminates_session() {
            let (session, client) = client();
            let err = client.assert_true(false, "login button visible").unwrap_err();
            assert!(matches!(err, VigilError::AssertionFailed { .. }));
            assert!(session.terminated());
            assert_eq!(client.results().failed, 1);
            assert_eq!(client.hard_failure_count(), 1);
        }
    }

    mod soft_assertion_tests {
        use super::*;

        #[test]
        fn test_verify_does_not_terminate() {
            let (session, client) = client();
            assert!(!client.verify_eq(&1, &2, "count"));
            assert!(client.verify_eq(&2, &2, "count"));
            assert!(!session.terminated());
            let results = client.results();
            assert_eq!(results.failed, 1);
            assert_eq!(results.passed, 1);
            assert_eq!(results.assertions[0].message, "count: expected 1, got 2");
        }
    }

    mod state_tests {
        use super::*;

        #[test]
        fn test_take_results_clears() {
            let (_, client) = client();
            client.record_error("boom");
            let taken = client.take_results();
            assert_eq!(taken.errors, 1);
            assert!(client.results().is_empty());
        }

        #[test]
        fn test_clones_share_state() {
            let (session, client) = client();
            let other = client.clone();
            other.set_current_test(Some("t1"));
            other.enqueue("click", vec![]);
            assert_eq!(client.current_test().as_deref(), Some("t1"));
            assert_eq!(session.pending(), 1);
        }
    }
}
