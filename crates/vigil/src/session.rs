//! Remote session abstraction.
//!
//! The runner never talks to a browser directly. Page object commands enqueue
//! [`QueuedCommand`]s on a [`Session`], and the hook runner drains the queue
//! with [`Session::run_queue`] while racing it against the user's `done`
//! callback. Any wire protocol client can sit behind the trait; [`MockSession`]
//! is the in-memory implementation used by the tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::result::{VigilError, VigilResult};

/// A command waiting in the session queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedCommand {
    /// Command name, namespaced for assertions (e.g. `assert.visible`)
    pub name: String,
    /// Serialized arguments
    pub args: Vec<serde_json::Value>,
}

impl QueuedCommand {
    /// Create a queued command
    #[must_use]
    pub fn new(name: impl Into<String>, args: Vec<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Remote WebDriver-like session with a command queue.
///
/// `run_queue` drains the queue; commands enqueued while it runs are executed
/// in the same run. An `Err` is the queue's error event.
#[async_trait]
pub trait Session: Send + Sync + fmt::Debug {
    /// Add a command to the queue
    fn enqueue(&self, command: QueuedCommand);

    /// Start draining the queue and wait until it is empty
    async fn run_queue(&self) -> VigilResult<()>;

    /// Mark the session as terminated (after a hard assertion failure)
    fn terminate(&self, reason: &str);

    /// Whether the session was terminated
    fn terminated(&self) -> bool;

    /// Clear the terminated flag (before a retry)
    fn reset_terminated(&self);

    /// Reset the queue's run state
    fn reset_queue(&self);

    /// Drop every pending command
    fn empty_queue(&self);

    /// Whether the queue holds commands that were never run
    fn should_restart_queue(&self) -> bool;
}

#[derive(Debug, Default)]
struct MockState {
    queue: VecDeque<QueuedCommand>,
    executed: Vec<QueuedCommand>,
    terminated: bool,
    termination_reasons: Vec<String>,
    fail_on: Option<String>,
    delay: Option<Duration>,
    runs: usize,
}

/// In-memory session for unit testing
#[derive(Default)]
pub struct MockSession {
    state: Mutex<MockState>,
}

impl fmt::Debug for MockSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("MockSession")
            .field("pending", &state.queue.len())
            .field("executed", &state.executed.len())
            .field("terminated", &state.terminated)
            .finish()
    }
}

impl MockSession {
    /// Create new mock session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the queue when a command with this name runs
    #[must_use]
    pub fn failing_on(self, command: impl Into<String>) -> Self {
        self.state().fail_on = Some(command.into());
        self
    }

    /// Sleep this long before executing each command
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state().delay = Some(delay);
        self
    }

    /// Names of the commands executed so far
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.iter().map(|c| c.name.clone()).collect()
    }

    /// Commands executed so far, with their arguments
    #[must_use]
    pub fn executed_commands(&self) -> Vec<QueuedCommand> {
        self.state().executed.clone()
    }

    /// Number of commands still queued
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state().queue.len()
    }

    /// How many times the queue was started
    #[must_use]
    pub fn runs(&self) -> usize {
        self.state().runs
    }

    /// Reasons passed to `terminate`
    #[must_use]
    pub fn termination_reasons(&self) -> Vec<String> {
        self.state().termination_reasons.clone()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Session for MockSession {
    fn enqueue(&self, command: QueuedCommand) {
        self.state().queue.push_back(command);
    }

    async fn run_queue(&self) -> VigilResult<()> {
        tracing::debug!(pending = self.pending(), "draining mock session queue");
        let delay = {
            let mut state = self.state();
            state.runs += 1;
            state.delay
        };
        loop {
            let next = { self.state().queue.pop_front() };
            let Some(command) = next else {
                return Ok(());
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let failed = {
                let mut state = self.state();
                let failed = state.fail_on.as_deref() == Some(command.name.as_str());
                state.executed.push(command.clone());
                failed
            };
            if failed {
                return Err(VigilError::Queue {
                    message: format!("command \"{}\" failed", command.name),
                });
            }
        }
    }

    fn terminate(&self, reason: &str) {
        let mut state = self.state();
        state.terminated = true;
        state.termination_reasons.push(reason.to_string());
    }

    fn terminated(&self) -> bool {
        self.state().terminated
    }

    fn reset_terminated(&self) {
        self.state().terminated = false;
    }

    fn reset_queue(&self) {
        // Nothing is in flight between runs; the pending list is left to
        // `empty_queue`.
    }

    fn empty_queue(&self) {
        self.state().queue.clear();
    }

    fn should_restart_queue(&self) -> bool {
        !self.state().queue.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn command(name: &str) -> QueuedCommand {
        QueuedCommand::new(name, vec![])
    }

    mod mock_session_tests {
        use super::*;

        #[test]
        fn test_creation() {
            let session = MockSession::new();
            assert_eq!(session.pending(), 0);
            assert!(session.executed().is_empty());
            assert!(!session.terminated());
            assert!(!session.should_restart_queue());
        }

        #[test]
        fn test_enqueue_marks_restart() {
            let session = MockSession::new();
            session.enqueue(command("click"));
            assert!(session.should_restart_queue());
            session.empty_queue();
            assert!(!session.should_restart_queue());
        }

        #[test]
        fn test_terminate_and_reset() {
            let session = MockSession::new();
            session.terminate("assertion failed");
            assert!(session.terminated());
            assert_eq!(session.termination_reasons(), vec!["assertion failed"]);
            session.reset_terminated();
            assert!(!session.terminated());
        }
    }

    mod run_queue_tests {
        use super::*;

        #[tokio::test]
        async fn test_drains_in_order() {
            let session = MockSession::new();
            session.enqueue(command("url"));
            session.enqueue(command("click"));
            session.run_queue().await.unwrap();
            assert_eq!(session.executed(), vec!["url", "click"]);
            assert_eq!(session.pending(), 0);
            assert_eq!(session.runs(), 1);
        }

        #[tokio::test]
        async fn test_failure_injection() {
            let session = MockSession::new().failing_on("click");
            session.enqueue(command("click"));
            session.enqueue(command("setValue"));
            let err = session.run_queue().await.unwrap_err();
            assert!(matches!(err, VigilError::Queue { .. }));
            assert_eq!(session.pending(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_delay_per_command() {
            let session = MockSession::new().with_delay(Duration::from_millis(50));
            session.enqueue(command("a"));
            session.enqueue(command("b"));
            let start = tokio::time::Instant::now();
            session.run_queue().await.unwrap();
            assert_eq!(start.elapsed(), Duration::from_millis(100));
        }
    }
}
