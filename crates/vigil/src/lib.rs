//! Vigil: Browser-Automation Test Runner Core
//!
//! Runs test modules against a command-queue session: lifecycle hooks,
//! three calling conventions for steps, timeouts, test and suite retries,
//! and page objects whose `@name` element references resolve to selector
//! chains.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      VIGIL Architecture                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ TestModule │    │ Suite      │    │ Session    │            │
//! │   │ (steps)    │───►│ Runner     │───►│ (command   │            │
//! │   │            │    │ + hooks    │    │  queue)    │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! │          ▲                 │                 ▲                  │
//! │   ┌────────────┐    ┌────────────┐           │                  │
//! │   │ Page       │───►│ Client     │───────────┘                  │
//! │   │ Objects    │    │ (asserts)  │                              │
//! │   └────────────┘    └────────────┘                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vigil::{Client, MockSession, RunConfig, StepFn, SuiteRunner, TestModule};
//!
//! # async fn run() -> vigil::VigilResult<()> {
//! let client = Client::new(Arc::new(MockSession::new()));
//! let module = TestModule::new("login")
//!     .step("beforeEach", StepFn::session(|client| {
//!         client.enqueue("url", vec!["http://localhost/login".into()]);
//!         Ok(())
//!     }))
//!     .step("submits the form", StepFn::session(|client| {
//!         client.enqueue("click", vec!["#submit".into()]);
//!         client.assert_true(true, "form submitted")
//!     }));
//!
//! let results = SuiteRunner::new(module, client, RunConfig::default()).run().await?;
//! assert_eq!(results.failed, 0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod assertion;
mod client;
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::unnecessary_wraps,
    clippy::doc_markdown
)]
mod locator;
mod reporter;
mod result;
mod session;

/// Subscriber setup for structured logging
pub mod logging;

/// Page Object Model Support
///
/// Named elements and sections whose `@name` references resolve to
/// selector chains, with commands bound to each scope.
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod page_object;

/// Suite Runner: hooks, test cases, retries and results
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod runner;

pub use assertion::{Assertion, AssertionRecord, AssertionResult, CaseResults};
pub use client::Client;
pub use locator::{
    LocateStrategy, Locator, Selector, SelectorInput, ANONYMOUS, REFERENCE_MARKER,
};
pub use page_object::{
    CommandArg, CommandSet, Page, PageBuilder, PageDefinition, PageObject, PageRegistry,
    Section, SectionBuilder,
};
pub use reporter::{RunListener, TracingReporter};
pub use result::{Severity, VigilError, VigilResult};
pub use runner::{
    CaseFlow, Done, HookKind, Hooks, RunConfig, RunSummary, StepFn, SuiteOutcome, SuiteRunner,
    TestModule, TestResults, TestRun, TestcaseReport,
};
pub use session::{MockSession, QueuedCommand, Session};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::assertion::*;
    pub use super::client::*;
    pub use super::locator::*;
    pub use super::page_object::*;
    pub use super::reporter::*;
    pub use super::result::*;
    pub use super::runner::*;
    pub use super::session::*;
}
