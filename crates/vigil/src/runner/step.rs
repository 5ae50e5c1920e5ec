//! User steps (hooks and test bodies) and their completion callback.

use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::client::Client;
use crate::result::{VigilError, VigilResult};

/// Completion callback handed to asynchronous steps.
///
/// Consumed on use, so it can be called at most once. Dropping it without a
/// call leaves the phase waiting until its timeout fires.
pub struct Done {
    tx: oneshot::Sender<Option<VigilError>>,
    phase: String,
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done").field("phase", &self.phase).finish()
    }
}

impl Done {
    pub(crate) fn channel(phase: impl Into<String>) -> (Self, oneshot::Receiver<Option<VigilError>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx,
                phase: phase.into(),
            },
            rx,
        )
    }

    /// Signal successful completion
    pub fn complete(self) {
        self.send(None);
    }

    /// Signal completion with an error
    pub fn fail(self, err: impl Into<VigilError>) {
        self.send(Some(err.into()));
    }

    /// Signal completion with the outcome of an operation
    pub fn call(self, result: VigilResult<()>) {
        self.send(result.err());
    }

    fn send(self, outcome: Option<VigilError>) {
        if self.tx.send(outcome).is_err() {
            tracing::warn!(
                phase = %self.phase,
                "done() was called after the phase had already completed"
            );
        }
    }
}

type SyncStep = Arc<dyn Fn() -> VigilResult<()> + Send + Sync>;
type SessionStep = Arc<dyn Fn(&Client) -> VigilResult<()> + Send + Sync>;
type CallbackStep = Arc<dyn Fn(Done) -> VigilResult<()> + Send + Sync>;
type SessionCallbackStep = Arc<dyn Fn(&Client, Done) -> VigilResult<()> + Send + Sync>;

/// A hook or test body with its calling convention.
///
/// Steps that receive a [`Done`] are asynchronous and complete when it is
/// called (and the command queue has drained). The others complete when
/// they return and the queue has drained.
#[derive(Clone)]
pub enum StepFn {
    /// Called with no arguments
    Sync(SyncStep),
    /// Called with the client
    SessionOnly(SessionStep),
    /// Called with the completion callback
    CallbackOnly(CallbackStep),
    /// Called with the client and the completion callback
    SessionAndCallback(SessionCallbackStep),
}

impl fmt::Debug for StepFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let convention = match self {
            Self::Sync(_) => "Sync",
            Self::SessionOnly(_) => "SessionOnly",
            Self::CallbackOnly(_) => "CallbackOnly",
            Self::SessionAndCallback(_) => "SessionAndCallback",
        };
        write!(f, "StepFn::{convention}")
    }
}

impl StepFn {
    /// Step called with no arguments
    pub fn sync(f: impl Fn() -> VigilResult<()> + Send + Sync + 'static) -> Self {
        Self::Sync(Arc::new(f))
    }

    /// Step called with the client
    pub fn session(f: impl Fn(&Client) -> VigilResult<()> + Send + Sync + 'static) -> Self {
        Self::SessionOnly(Arc::new(f))
    }

    /// Step called with the completion callback
    pub fn callback(f: impl Fn(Done) -> VigilResult<()> + Send + Sync + 'static) -> Self {
        Self::CallbackOnly(Arc::new(f))
    }

    /// Step called with the client and the completion callback
    pub fn session_and_callback(
        f: impl Fn(&Client, Done) -> VigilResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self::SessionAndCallback(Arc::new(f))
    }

    /// Step that does nothing
    pub fn noop() -> Self {
        Self::sync(|| Ok(()))
    }

    /// Whether the step completes through a [`Done`] callback
    #[must_use]
    pub const fn takes_callback(&self) -> bool {
        matches!(self, Self::CallbackOnly(_) | Self::SessionAndCallback(_))
    }

    /// Number of arguments the step receives
    #[must_use]
    pub const fn arity(&self) -> usize {
        match self {
            Self::Sync(_) => 0,
            Self::SessionOnly(_) | Self::CallbackOnly(_) => 1,
            Self::SessionAndCallback(_) => 2,
        }
    }

    /// Call the step; `done` is dropped for steps that do not take it
    pub(crate) fn invoke(&self, client: &Client, done: Done) -> VigilResult<()> {
        match self {
            Self::Sync(f) => f(),
            Self::SessionOnly(f) => f(client),
            Self::CallbackOnly(f) => f(done),
            Self::SessionAndCallback(f) => f(client, done),
        }
    }
}
