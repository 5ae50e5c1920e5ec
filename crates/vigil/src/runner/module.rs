//! Test modules: named steps in declaration order.
//!
//! Hooks are declared as ordinary steps under their hook key (`before`,
//! `beforeEach`/`setUp`, `afterEach`/`tearDown`, `after`); every other key is
//! a test case.

use std::collections::{HashMap, VecDeque};

use super::hook::{HookDescriptor, HookKind, HookScope};
use super::step::StepFn;

/// Hook steps by kind, for one scope
#[derive(Debug, Clone, Default)]
pub struct Hooks {
    steps: HashMap<HookKind, StepFn>,
}

impl Hooks {
    /// Create an empty hook set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the step for a hook kind
    #[must_use]
    pub fn with(mut self, kind: HookKind, step: StepFn) -> Self {
        let _ = self.steps.insert(kind, step);
        self
    }

    /// Step declared for a hook kind
    #[must_use]
    pub fn get(&self, kind: HookKind) -> Option<&StepFn> {
        self.steps.get(&kind)
    }

    /// Whether no hook is declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Bind every declared hook to a scope, in lifecycle order
    #[must_use]
    pub fn descriptors(&self, scope: HookScope) -> Vec<HookDescriptor> {
        HookKind::ALL
            .iter()
            .filter_map(|kind| {
                self.get(*kind).map(|step| HookDescriptor {
                    kind: *kind,
                    scope,
                    step: step.clone(),
                })
            })
            .collect()
    }
}

/// A test module (one suite)
#[derive(Debug, Clone)]
pub struct TestModule {
    name: String,
    keys: Vec<String>,
    steps: HashMap<String, StepFn>,
    remaining: VecDeque<String>,
    disabled: bool,
    skip_testcases_on_fail: Option<bool>,
}

impl TestModule {
    /// Create an empty module
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
            steps: HashMap::new(),
            remaining: VecDeque::new(),
            disabled: false,
            skip_testcases_on_fail: None,
        }
    }

    /// Declare a step; redeclaring a key replaces the step but keeps its position
    #[must_use]
    pub fn step(mut self, key: impl Into<String>, step: StepFn) -> Self {
        let key = key.into();
        if self.steps.insert(key.clone(), step).is_none() {
            self.keys.push(key.clone());
            self.remaining.push_back(key);
        }
        self
    }

    /// Skip the whole module
    #[must_use]
    pub const fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Override the run-wide skip-after-hard-failure setting
    #[must_use]
    pub const fn skip_testcases_on_fail(mut self, enabled: bool) -> Self {
        self.skip_testcases_on_fail = Some(enabled);
        self
    }

    /// Module name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the module is disabled
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Module-level skip setting, if any
    #[must_use]
    pub const fn skip_override(&self) -> Option<bool> {
        self.skip_testcases_on_fail
    }

    /// All declared keys, hooks included, in declaration order
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Step declared under a key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StepFn> {
        self.steps.get(key)
    }

    /// Next key still to run
    #[must_use]
    pub fn next_key(&self) -> Option<&str> {
        self.remaining.front().map(String::as_str)
    }

    /// Remove a key from the keys still to run
    pub fn remove_key(&mut self, key: &str) -> bool {
        let before = self.remaining.len();
        self.remaining.retain(|k| k != key);
        self.remaining.len() != before
    }

    /// Keys still to run
    #[must_use]
    pub fn remaining_keys(&self) -> Vec<String> {
        self.remaining.iter().cloned().collect()
    }

    /// Restore every declared key
    pub fn reset_keys(&mut self) {
        self.remaining = self.keys.iter().cloned().collect();
    }

    /// Hooks declared in this module, either under their key or their alias
    #[must_use]
    pub fn hooks(&self) -> Hooks {
        HookKind::ALL
            .iter()
            .fold(Hooks::new(), |hooks, kind| {
                match self.hook_key(*kind).and_then(|key| self.steps.get(key)) {
                    Some(step) => hooks.with(*kind, step.clone()),
                    None => hooks,
                }
            })
    }

    /// Restore every key, then drop the hook keys so only test cases remain
    pub fn reset_test_cases(&mut self) {
        self.reset_keys();
        for kind in HookKind::ALL {
            for key in std::iter::once(kind.key()).chain(kind.alias()) {
                let _ = self.remove_key(key);
            }
        }
    }

    /// Names of the test cases, in declaration order
    #[must_use]
    pub fn test_cases(&self) -> Vec<&str> {
        self.keys
            .iter()
            .map(String::as_str)
            .filter(|key| !is_hook_key(key))
            .collect()
    }

    fn hook_key(&self, kind: HookKind) -> Option<&str> {
        std::iter::once(kind.key())
            .chain(kind.alias())
            .find(|key| self.steps.contains_key(*key))
    }
}

/// Whether a module key declares a hook
#[must_use]
pub fn is_hook_key(key: &str) -> bool {
    HookKind::ALL
        .iter()
        .any(|kind| kind.key() == key || kind.alias() == Some(key))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn module() -> TestModule {
        TestModule::new("login")
            .step("before", StepFn::noop())
            .step("setUp", StepFn::noop())
            .step("t1", StepFn::noop())
            .step("t2", StepFn::noop())
            .step("after", StepFn::noop())
    }

    #[test]
    fn test_declaration_order() {
        let module = module();
        assert_eq!(module.keys(), &["before", "setUp", "t1", "t2", "after"]);
        assert_eq!(module.test_cases(), vec!["t1", "t2"]);
        assert_eq!(module.next_key(), Some("before"));
    }

    #[test]
    fn test_redeclare_keeps_position() {
        let module = module().step("before", StepFn::session(|_| Ok(())));
        assert_eq!(module.keys().len(), 5);
        assert_eq!(module.get("before").unwrap().arity(), 1);
    }

    #[test]
    fn test_hooks_by_key_and_alias() {
        let hooks = module().hooks();
        assert!(hooks.get(HookKind::Before).is_some());
        assert!(hooks.get(HookKind::BeforeEach).is_some());
        assert!(hooks.get(HookKind::AfterEach).is_none());
        let kinds: Vec<_> = hooks
            .descriptors(HookScope::Suite)
            .iter()
            .map(|d| d.kind)
            .collect();
        assert_eq!(kinds, vec![HookKind::Before, HookKind::BeforeEach, HookKind::After]);
    }

    #[test]
    fn test_reset_test_cases() {
        let mut module = module();
        module.reset_test_cases();
        assert_eq!(module.remaining_keys(), vec!["t1", "t2"]);
        assert!(module.remove_key("t1"));
        assert!(!module.remove_key("t1"));
        assert_eq!(module.next_key(), Some("t2"));
        module.reset_keys();
        assert_eq!(module.remaining_keys().len(), 5);
    }

    #[test]
    fn test_flags() {
        let module = TestModule::new("m").disabled(true).skip_testcases_on_fail(false);
        assert!(module.is_disabled());
        assert_eq!(module.skip_override(), Some(false));
        assert_eq!(TestModule::new("m").skip_override(), None);
        assert!(is_hook_key("tearDown"));
        assert!(!is_hook_key("t1"));
    }
}
