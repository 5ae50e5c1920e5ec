//! Suite execution.
//!
//! ```text
//! global beforeEach ─▶ before ─▶ test cases ─▶ after ─▶ global afterEach
//!        │                 │                                  ▲
//!        └─ fatal / skip ──┴──────────── teardown ────────────┘
//! ```

use std::sync::Arc;
use std::time::Instant;

use super::config::RunConfig;
use super::hook::{HookKind, HookRunner, HookScope, Phase, RunContext};
use super::module::{Hooks, TestModule};
use super::results::TestResults;
use super::step::StepFn;
use super::testcase::{CaseFlow, TestCaseRunner};
use crate::client::Client;
use crate::reporter::{RunListener, TracingReporter};
use crate::result::{VigilError, VigilResult};

/// Final aggregate of a suite, with the fatal error that ended it (if any)
#[derive(Debug)]
pub struct SuiteOutcome {
    /// Aggregate
    pub results: TestResults,
    /// First fatal error
    pub error: Option<VigilError>,
}

/// Runs one test module against a session
#[derive(Debug)]
pub struct SuiteRunner {
    module: TestModule,
    hooks: Hooks,
    globals: Hooks,
    config: RunConfig,
    skip_on_fail: bool,
    ctx: RunContext,
    results: TestResults,
    listener: Arc<dyn RunListener>,
}

impl SuiteRunner {
    /// Create a runner; the module's hooks are split from its test cases
    #[must_use]
    pub fn new(mut module: TestModule, client: Client, config: RunConfig) -> Self {
        let hooks = module.hooks();
        module.reset_test_cases();
        let declared: Vec<String> = hooks
            .descriptors(HookScope::Suite)
            .iter()
            .map(|hook| hook.phase().to_string())
            .collect();
        tracing::debug!(
            suite = %module.name(),
            hooks = ?declared,
            tests = module.remaining_keys().len(),
            "suite initialised"
        );
        let skip_on_fail = module
            .skip_override()
            .unwrap_or(config.skip_testcases_on_fail);
        let results = TestResults::new(module.name());
        Self {
            module,
            hooks,
            globals: Hooks::new(),
            config,
            skip_on_fail,
            ctx: RunContext::new(client),
            results,
            listener: Arc::new(TracingReporter::new()),
        }
    }

    /// Set the run-wide `beforeEach`/`afterEach` hooks
    #[must_use]
    pub fn with_globals(mut self, globals: Hooks) -> Self {
        self.globals = globals;
        self
    }

    /// Set the lifecycle listener
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn RunListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Run the suite; the first fatal error is returned after teardown
    pub async fn run(self) -> VigilResult<TestResults> {
        let outcome = self.execute().await;
        match outcome.error {
            Some(err) => Err(err),
            None => Ok(outcome.results),
        }
    }

    /// Run the suite and keep the aggregate even when it failed fatally
    pub async fn execute(mut self) -> SuiteOutcome {
        let started = Instant::now();
        let name = self.module.name().to_string();
        self.listener.suite_started(&name);
        self.ctx.client.clear_results();

        if self.module.is_disabled() {
            tracing::info!(suite = %name, "module is disabled, skipping");
            self.listener.suite_finished(&self.results);
            return SuiteOutcome {
                results: self.results,
                error: None,
            };
        }

        let error = loop {
            let error = self.run_once().await;
            let retry = error.is_none()
                && self.results.has_failures()
                && self.results.suite_retries < self.config.suite_retries;
            if !retry {
                break error;
            }
            self.reset_for_retry();
        };
        let error = error.or_else(|| self.ctx.latched_queue_error());

        let session = self.ctx.client.session();
        session.reset_queue();
        session.empty_queue();
        self.ctx.client.set_current_test(None);
        self.results.time = started.elapsed().as_secs_f64();

        if let Some(err) = &error {
            tracing::warn!(suite = %name, error = %err, "suite failed");
        }
        self.listener.suite_finished(&self.results);
        SuiteOutcome {
            results: self.results,
            error,
        }
    }

    async fn run_once(&mut self) -> Option<VigilError> {
        let mut first_error = None;

        let global_before_each = self.globals.get(HookKind::BeforeEach).cloned();
        let proceed = self
            .run_hook(
                Phase::global(HookKind::BeforeEach),
                global_before_each.as_ref(),
                &mut first_error,
            )
            .await;

        if !proceed {
            self.skip_remaining();
        } else if self.skip_on_fail && self.ctx.client.session().terminated() {
            tracing::debug!(suite = %self.results.name, "session terminated in global beforeEach");
            self.skip_remaining();
        } else {
            let before = self.hooks.get(HookKind::Before).cloned();
            if self
                .run_hook(Phase::suite(HookKind::Before), before.as_ref(), &mut first_error)
                .await
            {
                if let Err(err) = self.run_test_cases().await {
                    first_error.get_or_insert(err);
                }
            } else {
                self.skip_remaining();
            }

            let after = self.hooks.get(HookKind::After).cloned();
            let _ = self
                .run_hook(Phase::suite(HookKind::After), after.as_ref(), &mut first_error)
                .await;
        }

        let global_after_each = self.globals.get(HookKind::AfterEach).cloned();
        let _ = self
            .run_hook(
                Phase::global(HookKind::AfterEach),
                global_after_each.as_ref(),
                &mut first_error,
            )
            .await;

        first_error
    }

    async fn run_hook(
        &mut self,
        phase: Phase,
        step: Option<&StepFn>,
        first_error: &mut Option<VigilError>,
    ) -> bool {
        let Some(step) = step else {
            return true;
        };
        let outcome = HookRunner::new(phase, step, self.config.hook_timeout())
            .run(&mut self.ctx)
            .await;
        self.results.merge(self.ctx.client.take_results());
        match outcome {
            Ok(()) => true,
            Err(err) => {
                first_error.get_or_insert(err);
                false
            }
        }
    }

    async fn run_test_cases(&mut self) -> VigilResult<()> {
        let suite_retries_left = self.results.suite_retries < self.config.suite_retries;

        while let Some(name) = self.module.next_key().map(str::to_string) {
            if self.skip_on_fail && self.ctx.client.session().terminated() {
                self.skip_remaining();
                break;
            }
            let _ = self.module.remove_key(&name);
            let Some(body) = self.module.get(&name).cloned() else {
                continue;
            };

            let flow = TestCaseRunner::new(
                self.module.name(),
                &name,
                &body,
                &self.hooks,
                &self.config,
                self.listener.as_ref(),
            )
            .skip_on_fail(self.skip_on_fail)
            .suite_retries_left(suite_retries_left)
            .run(&mut self.ctx, &mut self.results)
            .await?;

            match flow {
                CaseFlow::Next => {}
                CaseFlow::SkipRemaining => {
                    self.skip_remaining();
                    break;
                }
                CaseFlow::StopForSuiteRetry => break,
            }
        }
        Ok(())
    }

    fn skip_remaining(&mut self) {
        let skipped = self.module.remaining_keys();
        for name in &skipped {
            let _ = self.module.remove_key(name);
        }
        if !skipped.is_empty() {
            self.listener.testcases_skipped(&self.results.name, &skipped);
            self.results.add_skipped(skipped);
        }
    }

    fn reset_for_retry(&mut self) {
        self.results.suite_retries += 1;
        self.listener.suite_retrying(
            &self.results.name,
            self.results.suite_retries,
            self.config.suite_retries,
        );
        self.results.reset();
        self.ctx.client.session().reset_terminated();
        self.ctx.client.clear_results();
        self.ctx.queue_error = None;
        self.module.reset_test_cases();
    }
}
