//! Execution of a single hook or test body.
//!
//! A phase completes when the step has returned, its [`Done`] callback (if it
//! takes one) has been called, and the session's command queue has drained.
//! The callback and the queue race; the first error from either wins.

use futures::future::BoxFuture;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tokio::sync::oneshot;

use super::step::{Done, StepFn};
use crate::assertion::AssertionResult;
use crate::client::Client;
use crate::result::{Severity, VigilError, VigilResult};

/// Lifecycle hook kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Once before the test cases
    Before,
    /// Before every test case
    BeforeEach,
    /// After every test case
    AfterEach,
    /// Once after the test cases
    After,
}

impl HookKind {
    /// Every hook kind, in declaration order
    pub const ALL: [Self; 4] = [Self::Before, Self::BeforeEach, Self::AfterEach, Self::After];

    /// Key under which the hook is declared in a test module
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::BeforeEach => "beforeEach",
            Self::AfterEach => "afterEach",
            Self::After => "after",
        }
    }

    /// Alternative declaration key (`setUp`, `tearDown`)
    #[must_use]
    pub const fn alias(self) -> Option<&'static str> {
        match self {
            Self::BeforeEach => Some("setUp"),
            Self::AfterEach => Some("tearDown"),
            Self::Before | Self::After => None,
        }
    }
}

/// Where a hook is declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookScope {
    /// Run-wide globals
    Global,
    /// The suite's own module
    Suite,
}

/// The hook or test currently running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// A lifecycle hook
    Hook {
        /// Hook kind
        kind: HookKind,
        /// Hook scope
        scope: HookScope,
    },
    /// A test body
    Test(String),
}

impl Phase {
    /// Suite-scoped hook phase
    #[must_use]
    pub const fn suite(kind: HookKind) -> Self {
        Self::Hook {
            kind,
            scope: HookScope::Suite,
        }
    }

    /// Global hook phase
    #[must_use]
    pub const fn global(kind: HookKind) -> Self {
        Self::Hook {
            kind,
            scope: HookScope::Global,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hook {
                kind,
                scope: HookScope::Global,
            } => write!(f, "global {}", kind.key()),
            Self::Hook {
                kind,
                scope: HookScope::Suite,
            } => f.write_str(kind.key()),
            Self::Test(name) => f.write_str(name),
        }
    }
}

/// A hook bound to its step
#[derive(Debug, Clone)]
pub struct HookDescriptor {
    /// Hook kind
    pub kind: HookKind,
    /// Hook scope
    pub scope: HookScope,
    /// What to run
    pub step: StepFn,
}

impl HookDescriptor {
    /// Phase this hook runs as
    #[must_use]
    pub const fn phase(&self) -> Phase {
        Phase::Hook {
            kind: self.kind,
            scope: self.scope,
        }
    }
}

/// State shared by every phase of a suite run
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Session-bound client
    pub client: Client,
    /// Message of the first queue error the session reported; once set the
    /// queue is not started again for the rest of the suite
    pub queue_error: Option<String>,
}

impl RunContext {
    /// Create a context for a client
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self {
            client,
            queue_error: None,
        }
    }

    /// Whether the queue-error latch is set
    #[must_use]
    pub const fn queue_failed(&self) -> bool {
        self.queue_error.is_some()
    }

    /// The latched queue error, if any
    #[must_use]
    pub fn latched_queue_error(&self) -> Option<VigilError> {
        self.queue_error.clone().map(|message| VigilError::Queue { message })
    }

    fn latch_queue_error(&mut self, err: &VigilError) {
        if self.queue_error.is_none() {
            let message = match err {
                VigilError::Queue { message } => message.clone(),
                other => other.to_string(),
            };
            self.queue_error = Some(message);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum QueueState {
    #[default]
    Idle,
    Pending,
    Drained,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhaseState {
    Idle,
    Called,
    WaitingOnQueue,
    WaitingOnDone,
    Completed,
}

#[derive(Debug, Default)]
struct RunState {
    method_done: bool,
    queue: QueueState,
    user_done: bool,
    completed: bool,
}

impl RunState {
    fn phase_state(&self) -> PhaseState {
        if self.completed {
            PhaseState::Completed
        } else if self.queue == QueueState::Pending {
            PhaseState::WaitingOnQueue
        } else if self.method_done && !self.user_done {
            PhaseState::WaitingOnDone
        } else if self.method_done {
            PhaseState::Called
        } else {
            PhaseState::Idle
        }
    }
}

/// Runs one hook or test body to completion
#[derive(Debug)]
pub struct HookRunner<'a> {
    phase: Phase,
    step: &'a StepFn,
    timeout: Option<Duration>,
}

impl<'a> HookRunner<'a> {
    /// Create a runner; `timeout` guards the asynchronous wait only
    #[must_use]
    pub const fn new(phase: Phase, step: &'a StepFn, timeout: Option<Duration>) -> Self {
        Self {
            phase,
            step,
            timeout,
        }
    }

    /// Run the step.
    ///
    /// Returns `Err` for fatal errors (synchronous errors, panics, errors
    /// passed to `done`, queue errors, timeouts), which are also recorded on
    /// the client. A hard assertion failure ends the phase early and is
    /// recorded as a failure, but returns `Ok`.
    pub async fn run(&self, ctx: &mut RunContext) -> VigilResult<()> {
        let client = ctx.client.clone();
        let mut state = RunState::default();
        tracing::debug!(phase = %self.phase, "phase started");

        let hard_before = client.hard_failure_count();
        let terminated_before = client.session().terminated();
        let (done, done_rx) = Done::channel(self.phase.to_string());

        let called = panic::catch_unwind(AssertUnwindSafe(|| self.step.invoke(&client, done)))
            .unwrap_or_else(|payload| Err(VigilError::uncaught(panic_message(&*payload))));
        state.method_done = true;
        tracing::trace!(phase = %self.phase, state = ?state.phase_state(), "step returned");

        let outcome = match called {
            Err(err) => Err(err),
            Ok(()) if self.failed_during_call(&client, hard_before, terminated_before) => Ok(()),
            Ok(()) => self.wait(&mut state, ctx, done_rx).await,
        };

        self.complete(&mut state, &client, hard_before, outcome)
    }

    fn failed_during_call(&self, client: &Client, hard_before: usize, terminated_before: bool) -> bool {
        let failed = client.hard_failure_count() > hard_before
            || (!terminated_before && client.session().terminated());
        if failed {
            tracing::debug!(phase = %self.phase, "session terminated during the step");
        }
        failed
    }

    async fn wait(
        &self,
        state: &mut RunState,
        ctx: &mut RunContext,
        done_rx: oneshot::Receiver<Option<VigilError>>,
    ) -> VigilResult<()> {
        let waiting = self.race(state, ctx, done_rx);
        match self.timeout {
            None => waiting.await,
            Some(limit) => {
                if let Ok(outcome) = tokio::time::timeout(limit, waiting).await {
                    outcome
                } else {
                    tracing::warn!(phase = %self.phase, ms = limit.as_millis() as u64, "phase timed out");
                    Err(VigilError::Timeout {
                        phase: self.phase.to_string(),
                        ms: limit.as_millis() as u64,
                    })
                }
            }
        }
    }

    async fn race(
        &self,
        state: &mut RunState,
        ctx: &mut RunContext,
        mut done_rx: oneshot::Receiver<Option<VigilError>>,
    ) -> VigilResult<()> {
        let session = ctx.client.session().clone();
        let mut done_open = self.step.takes_callback();
        state.user_done = !done_open;

        let mut queue: Option<BoxFuture<'_, VigilResult<()>>> = None;
        if !ctx.queue_failed() && session.should_restart_queue() {
            queue = Some(session.run_queue());
            state.queue = QueueState::Pending;
            tracing::debug!(phase = %self.phase, "command queue started");
        }

        loop {
            if state.user_done && state.queue != QueueState::Pending {
                return Ok(());
            }
            tracing::trace!(phase = %self.phase, state = ?state.phase_state(), "waiting");

            tokio::select! {
                drained = async {
                    match queue.as_mut() {
                        Some(running) => running.await,
                        None => std::future::pending().await,
                    }
                }, if queue.is_some() => {
                    queue = None;
                    state.queue = QueueState::Drained;
                    if let Err(err) = drained {
                        ctx.latch_queue_error(&err);
                        return Err(err);
                    }
                    tracing::debug!(phase = %self.phase, "command queue drained");
                }
                signal = &mut done_rx, if done_open => {
                    done_open = false;
                    match signal {
                        Ok(Some(err)) => return Err(err.into_fatal()),
                        Ok(None) => {
                            state.user_done = true;
                            tracing::debug!(phase = %self.phase, "done() called");
                            if state.queue != QueueState::Pending
                                && !ctx.queue_failed()
                                && session.should_restart_queue()
                            {
                                queue = Some(session.run_queue());
                                state.queue = QueueState::Pending;
                                tracing::debug!(phase = %self.phase, "command queue restarted");
                            }
                        }
                        Err(_) => {
                            tracing::debug!(phase = %self.phase, "done() dropped without being called");
                        }
                    }
                }
                else => std::future::pending::<()>().await,
            }
        }
    }

    fn complete(
        &self,
        state: &mut RunState,
        client: &Client,
        hard_before: usize,
        outcome: VigilResult<()>,
    ) -> VigilResult<()> {
        if state.completed {
            return Ok(());
        }
        state.completed = true;
        let session = client.session();
        session.reset_queue();
        session.empty_queue();

        match outcome {
            Ok(()) => {
                tracing::debug!(phase = %self.phase, state = ?state.phase_state(), "phase completed");
                Ok(())
            }
            Err(err) if err.severity() == Severity::Hard => {
                if client.hard_failure_count() == hard_before {
                    let _ = client.assert_that(AssertionResult::fail(err.to_string()));
                }
                tracing::debug!(phase = %self.phase, error = %err, "phase aborted by a failed assertion");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(phase = %self.phase, error = %err, "phase failed");
                client.record_error(err.to_string());
                Err(err)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "step panicked".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::session::{MockSession, Session};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn context() -> (Arc<MockSession>, RunContext) {
        let session = Arc::new(MockSession::new());
        let ctx = RunContext::new(Client::new(session.clone()));
        (session, ctx)
    }

    fn context_with(session: MockSession) -> (Arc<MockSession>, RunContext) {
        let session = Arc::new(session);
        let ctx = RunContext::new(Client::new(session.clone()));
        (session, ctx)
    }

    const TIMEOUT: Option<Duration> = Some(Duration::from_millis(100));

    mod phase_tests {
        use super::*;

        #[test]
        fn test_phase_display() {
            assert_eq!(Phase::global(HookKind::BeforeEach).to_string(), "global beforeEach");
            assert_eq!(Phase::suite(HookKind::After).to_string(), "after");
            assert_eq!(Phase::Test("t1".into()).to_string(), "t1");
        }

        #[test]
        fn test_aliases() {
            assert_eq!(HookKind::BeforeEach.alias(), Some("setUp"));
            assert_eq!(HookKind::AfterEach.alias(), Some("tearDown"));
            assert_eq!(HookKind::Before.alias(), None);
        }
    }

    mod sync_tests {
        use super::*;

        #[tokio::test]
        async fn test_sync_step_completes() {
            let (session, mut ctx) = context();
            let step = StepFn::noop();
            HookRunner::new(Phase::suite(HookKind::Before), &step, TIMEOUT)
                .run(&mut ctx)
                .await
                .unwrap();
            assert_eq!(session.runs(), 0);
            assert!(ctx.client.results().is_empty());
        }

        #[tokio::test]
        async fn test_sync_error_is_fatal() {
            let (_, mut ctx) = context();
            let step = StepFn::sync(|| Err(VigilError::uncaught("boom")));
            let err = HookRunner::new(Phase::suite(HookKind::Before), &step, TIMEOUT)
                .run(&mut ctx)
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "boom");
            assert_eq!(ctx.client.results().errmessages, vec!["boom"]);
        }

        #[tokio::test]
        async fn test_panic_is_caught() {
            let (_, mut ctx) = context();
            let step = StepFn::sync(|| panic!("kaboom"));
            let err = HookRunner::new(Phase::Test("t1".into()), &step, TIMEOUT)
                .run(&mut ctx)
                .await
                .unwrap_err();
            assert!(matches!(err, VigilError::Uncaught { ref message } if message == "kaboom"));
        }

        #[tokio::test]
        async fn test_sync_error_skips_queue() {
            let (session, mut ctx) = context();
            let step = StepFn::session(|client| {
                client.enqueue("click", vec![]);
                Err(VigilError::uncaught("boom"))
            });
            let _ = HookRunner::new(Phase::Test("t1".into()), &step, TIMEOUT)
                .run(&mut ctx)
                .await;
            assert_eq!(session.runs(), 0);
            assert_eq!(session.pending(), 0);
        }
    }

    mod queue_tests {
        use super::*;

        #[tokio::test]
        async fn test_session_step_waits_for_queue() {
            let (session, mut ctx) = context();
            let step = StepFn::session(|client| {
                client.enqueue("url", vec![]);
                client.enqueue("click", vec![]);
                Ok(())
            });
            HookRunner::new(Phase::Test("t1".into()), &step, TIMEOUT)
                .run(&mut ctx)
                .await
                .unwrap();
            assert_eq!(session.executed(), vec!["url", "click"]);
            assert_eq!(session.runs(), 1);
        }

        #[tokio::test]
        async fn test_queue_error_is_fatal_and_latched() {
            let (session, mut ctx) = context_with(MockSession::new().failing_on("click"));
            let step = StepFn::session(|client| {
                client.enqueue("click", vec![]);
                Ok(())
            });
            let err = HookRunner::new(Phase::Test("t1".into()), &step, TIMEOUT)
                .run(&mut ctx)
                .await
                .unwrap_err();
            assert!(matches!(err, VigilError::Queue { .. }));
            assert!(ctx.queue_failed());
            assert_eq!(
                ctx.latched_queue_error().unwrap().to_string(),
                "Command queue error: command \"click\" failed"
            );

            let next = StepFn::session(|client| {
                client.enqueue("url", vec![]);
                Ok(())
            });
            HookRunner::new(Phase::suite(HookKind::After), &next, TIMEOUT)
                .run(&mut ctx)
                .await
                .unwrap();
            assert_eq!(session.runs(), 1);
            assert_eq!(session.pending(), 0);
        }

        #[tokio::test]
        async fn test_hard_failure_skips_queue() {
            let (session, mut ctx) = context();
            let step = StepFn::session(|client| {
                client.enqueue("click", vec![]);
                let _ = client.assert_true(false, "visible");
                Ok(())
            });
            HookRunner::new(Phase::Test("t1".into()), &step, TIMEOUT)
                .run(&mut ctx)
                .await
                .unwrap();
            assert_eq!(session.runs(), 0);
            assert_eq!(ctx.client.results().failed, 1);
        }

        #[tokio::test]
        async fn test_returned_assertion_error_is_recorded_once() {
            let (session, mut ctx) = context();
            let step = StepFn::session(|client| client.assert_true(false, "visible"));
            HookRunner::new(Phase::Test("t1".into()), &step, TIMEOUT)
                .run(&mut ctx)
                .await
                .unwrap();
            assert_eq!(ctx.client.results().failed, 1);
            assert_eq!(ctx.client.results().errors, 0);
            assert!(session.terminated());
        }

        #[tokio::test]
        async fn test_foreign_assertion_error_recorded() {
            let (session, mut ctx) = context();
            let step = StepFn::sync(|| {
                Err(VigilError::AssertionFailed {
                    message: "custom".into(),
                })
            });
            HookRunner::new(Phase::Test("t1".into()), &step, TIMEOUT)
                .run(&mut ctx)
                .await
                .unwrap();
            assert_eq!(ctx.client.results().failed, 1);
            assert!(session.terminated());
        }
    }

    mod callback_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_waits_for_done_and_queue() {
            let (session, mut ctx) = context_with(
                MockSession::new().with_delay(Duration::from_millis(30)),
            );
            let step = StepFn::session_and_callback(|client, done| {
                client.enqueue("click", vec![]);
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    done.complete();
                });
                Ok(())
            });
            let start = tokio::time::Instant::now();
            HookRunner::new(Phase::Test("t1".into()), &step, TIMEOUT)
                .run(&mut ctx)
                .await
                .unwrap();
            assert_eq!(start.elapsed(), Duration::from_millis(50));
            assert_eq!(session.executed(), vec!["click"]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_queue_restarted_after_done() {
            let (session, mut ctx) = context();
            let step = StepFn::session_and_callback(|client, done| {
                let client = client.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    client.enqueue("getText", vec![]);
                    done.complete();
                });
                Ok(())
            });
            HookRunner::new(Phase::Test("t1".into()), &step, TIMEOUT)
                .run(&mut ctx)
                .await
                .unwrap();
            assert_eq!(session.executed(), vec!["getText"]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_done_error_is_fatal() {
            let (_, mut ctx) = context();
            let step = StepFn::callback(|done| {
                done.fail(VigilError::uncaught("async failure"));
                Ok(())
            });
            let err = HookRunner::new(Phase::suite(HookKind::Before), &step, TIMEOUT)
                .run(&mut ctx)
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "async failure");
            assert_eq!(ctx.client.results().errors, 1);
        }

        #[tokio::test]
        async fn test_assertion_passed_to_done_is_fatal() {
            let (session, mut ctx) = context();
            let step = StepFn::callback(|done| {
                done.fail(VigilError::AssertionFailed {
                    message: "login form visible".into(),
                });
                Ok(())
            });
            let err = HookRunner::new(Phase::suite(HookKind::Before), &step, TIMEOUT)
                .run(&mut ctx)
                .await
                .unwrap_err();
            assert_eq!(err.severity(), Severity::Fatal);
            assert_eq!(err.to_string(), "Assertion failed: login form visible");
            assert_eq!(ctx.client.results().errors, 1);
            assert_eq!(ctx.client.results().failed, 0);
            assert!(!session.terminated());
        }

        #[tokio::test(start_paused = true)]
        async fn test_timeout_when_done_never_called() {
            let (_, mut ctx) = context();
            let step = StepFn::callback(|done| {
                std::mem::forget(done);
                Ok(())
            });
            let start = tokio::time::Instant::now();
            let err = HookRunner::new(Phase::global(HookKind::BeforeEach), &step, TIMEOUT)
                .run(&mut ctx)
                .await
                .unwrap_err();
            assert_eq!(start.elapsed(), Duration::from_millis(100));
            assert!(err
                .to_string()
                .starts_with("done() callback timeout of 100 ms was reached while executing \"global beforeEach\""));
        }

        #[tokio::test(start_paused = true)]
        async fn test_dropped_done_waits_for_timeout() {
            let (_, mut ctx) = context();
            let step = StepFn::callback(|_done| Ok(()));
            let err = HookRunner::new(Phase::suite(HookKind::After), &step, TIMEOUT)
                .run(&mut ctx)
                .await
                .unwrap_err();
            assert!(matches!(err, VigilError::Timeout { ms: 100, .. }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_late_done_is_ignored() {
            let (_, mut ctx) = context();
            let calls = Arc::new(AtomicUsize::new(0));
            let counter = calls.clone();
            let step = StepFn::callback(move |done| {
                let counter = counter.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    done.complete();
                });
                Ok(())
            });
            let err = HookRunner::new(Phase::Test("slow".into()), &step, TIMEOUT)
                .run(&mut ctx)
                .await
                .unwrap_err();
            assert!(matches!(err, VigilError::Timeout { .. }));
            tokio::time::sleep(Duration::from_millis(600)).await;
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_zero_timeout_disables_timer() {
            let (_, mut ctx) = context();
            let step = StepFn::callback(|done| {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    done.complete();
                });
                Ok(())
            });
            HookRunner::new(Phase::Test("slow".into()), &step, None)
                .run(&mut ctx)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_completion_empties_queue() {
        let (session, mut ctx) = context();
        let step = StepFn::callback(|done| {
            done.fail(VigilError::uncaught("early"));
            Ok(())
        });
        session.enqueue(crate::session::QueuedCommand::new("stale", vec![]));
        let _ = HookRunner::new(Phase::Test("t1".into()), &step, TIMEOUT)
            .run(&mut ctx)
            .await;
        assert!(!session.should_restart_queue());
    }
}
