//! Commands exposed on pages and sections.
//!
//! Every command registered on a page object is wrapped so that a reference
//! in its first argument (`"@username"`, `{"selector": "@submit", "index": 1}`)
//! is resolved against the page object's declarations before the operation
//! runs. Assertion commands live in three reserved namespaces: `assert`,
//! `verify` and `expect`.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::resolver::{LookupKind, SelectorResolver};
use super::Scope;
use crate::client::Client;
use crate::locator::{Locator, SelectorInput};
use crate::result::{VigilError, VigilResult};

/// Operation behind a command: receives the session-bound client and the
/// arguments with any reference already resolved.
pub type CommandFn = Arc<dyn Fn(&Client, Vec<CommandArg>) -> VigilResult<Value> + Send + Sync>;

/// Reserved assertion namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssertionNamespace {
    /// Hard assertions
    Assert,
    /// Soft verifications
    Verify,
    /// Expectations; the only namespace whose commands return a value
    Expect,
}

impl AssertionNamespace {
    /// Namespace name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assert => "assert",
            Self::Verify => "verify",
            Self::Expect => "expect",
        }
    }
}

impl fmt::Display for AssertionNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssertionNamespace {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assert" => Ok(Self::Assert),
            "verify" => Ok(Self::Verify),
            "expect" => Ok(Self::Expect),
            other => Err(VigilError::Configuration {
                message: format!("unknown assertion namespace \"{other}\""),
            }),
        }
    }
}

/// Argument passed to a command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandArg {
    /// A resolved or parsed locator
    Locator(Locator),
    /// Any other value
    Value(Value),
}

impl CommandArg {
    /// The locator, if this argument is one
    #[must_use]
    pub const fn as_locator(&self) -> Option<&Locator> {
        match self {
            Self::Locator(locator) => Some(locator),
            Self::Value(_) => None,
        }
    }

    /// The string value, if this argument is one
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Value(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// JSON form sent to the session
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Locator(locator) => serde_json::to_value(locator).unwrap_or(Value::Null),
            Self::Value(value) => value.clone(),
        }
    }

    fn to_selector_input(&self) -> SelectorInput {
        match self {
            Self::Locator(locator) => SelectorInput::Locator(locator.clone()),
            Self::Value(value) => SelectorInput::Value(value.clone()),
        }
    }
}

impl From<&str> for CommandArg {
    fn from(s: &str) -> Self {
        Self::Value(Value::String(s.to_string()))
    }
}

impl From<String> for CommandArg {
    fn from(s: String) -> Self {
        Self::Value(Value::String(s))
    }
}

impl From<Value> for CommandArg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Locator> for CommandArg {
    fn from(locator: Locator) -> Self {
        Self::Locator(locator)
    }
}

/// What a wrapped command hands back to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReturn {
    /// Continue chaining on the page object
    Chain,
    /// Value returned by an `expect` command
    Value(Value),
}

/// A command bound to its name and namespace
#[derive(Clone)]
pub struct WrappedCommand {
    name: String,
    namespace: Option<AssertionNamespace>,
    op: CommandFn,
}

impl fmt::Debug for WrappedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappedCommand")
            .field("name", &self.qualified_name())
            .finish()
    }
}

impl WrappedCommand {
    /// Name including the namespace (e.g. `expect.section`)
    #[must_use]
    pub fn qualified_name(&self) -> String {
        qualified(self.namespace, &self.name)
    }

    /// Run the command for a page object.
    ///
    /// A reference in the first argument is replaced by its resolved locator.
    /// A first argument that is not a selector value is passed through.
    pub fn call(
        &self,
        scope: &Scope,
        client: &Client,
        mut args: Vec<CommandArg>,
    ) -> VigilResult<CommandReturn> {
        if let Some(first) = args.first_mut() {
            if let Ok(locator) = Locator::parse(first.to_selector_input(), None) {
                if locator.is_reference() {
                    let resolved = SelectorResolver::resolve(scope, locator, self.lookup_kind())?;
                    *first = CommandArg::Locator(resolved);
                }
            }
        }

        tracing::trace!(command = %self.qualified_name(), target = %scope.name, "command");
        let value = (self.op)(client, args)?;
        Ok(match self.namespace {
            Some(AssertionNamespace::Expect) => CommandReturn::Value(value),
            _ => CommandReturn::Chain,
        })
    }

    fn lookup_kind(&self) -> LookupKind {
        if self.namespace == Some(AssertionNamespace::Expect) && self.name == "section" {
            LookupKind::Section
        } else {
            LookupKind::Element
        }
    }
}

/// The commands available on one page or section
#[derive(Debug, Clone, Default)]
pub struct CommandSurface {
    commands: BTreeMap<String, WrappedCommand>,
    namespaces: BTreeMap<AssertionNamespace, BTreeMap<String, WrappedCommand>>,
}

impl CommandSurface {
    /// Create an empty surface
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command on the surface or in an assertion namespace
    pub fn attach(
        &mut self,
        namespace: Option<AssertionNamespace>,
        name: &str,
        op: CommandFn,
    ) -> VigilResult<()> {
        let target = match namespace {
            None => &mut self.commands,
            Some(ns) => self.namespaces.entry(ns).or_default(),
        };
        if target.contains_key(name) {
            return Err(VigilError::DuplicateCommand {
                name: qualified(namespace, name),
            });
        }
        let _ = target.insert(
            name.to_string(),
            WrappedCommand {
                name: name.to_string(),
                namespace,
                op,
            },
        );
        Ok(())
    }

    /// Look up a command
    #[must_use]
    pub fn get(&self, namespace: Option<AssertionNamespace>, name: &str) -> Option<&WrappedCommand> {
        match namespace {
            None => self.commands.get(name),
            Some(ns) => self.namespaces.get(&ns).and_then(|cmds| cmds.get(name)),
        }
    }

    /// Command names registered in a namespace (or on the surface itself)
    #[must_use]
    pub fn names(&self, namespace: Option<AssertionNamespace>) -> Vec<&str> {
        let commands = match namespace {
            None => Some(&self.commands),
            Some(ns) => self.namespaces.get(&ns),
        };
        commands
            .map(|cmds| cmds.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

fn qualified(namespace: Option<AssertionNamespace>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{ns}.{name}"),
        None => name.to_string(),
    }
}

/// A reusable list of command definitions applied to pages and sections
#[derive(Clone, Default)]
pub struct CommandSet {
    entries: Vec<(Option<AssertionNamespace>, String, CommandFn)>,
}

impl fmt::Debug for CommandSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(ns, name, _)| qualified(*ns, name)))
            .finish()
    }
}

const ELEMENT_COMMANDS: &[&str] = &[
    "click",
    "clearValue",
    "getAttribute",
    "getText",
    "getValue",
    "isVisible",
    "moveToElement",
    "setValue",
    "submitForm",
    "waitForElementPresent",
    "waitForElementVisible",
];

const ASSERTIONS: &[&str] = &[
    "attributeEquals",
    "containsText",
    "cssClassPresent",
    "elementPresent",
    "visible",
    "value",
];

impl CommandSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The element commands and assertions every page object gets
    #[must_use]
    pub fn standard() -> Self {
        let mut set = Self::new();
        for name in ELEMENT_COMMANDS {
            set = set.command(*name, queueing(name));
        }
        for ns in [AssertionNamespace::Assert, AssertionNamespace::Verify] {
            for name in ASSERTIONS {
                set = set.assertion(ns, *name, queueing(&qualified(Some(ns), name)));
            }
        }
        for name in ["element", "section"] {
            let queued = qualified(Some(AssertionNamespace::Expect), name);
            set = set.assertion(
                AssertionNamespace::Expect,
                name,
                move |client: &Client, args: Vec<CommandArg>| {
                    let args: Vec<Value> = args.iter().map(CommandArg::to_value).collect();
                    let target = args.first().cloned().unwrap_or(Value::Null);
                    client.enqueue(queued.clone(), args);
                    Ok(json!({ "expect": queued, "target": target }))
                },
            );
        }
        set
    }

    /// Add a plain command
    #[must_use]
    pub fn command(
        mut self,
        name: impl Into<String>,
        op: impl Fn(&Client, Vec<CommandArg>) -> VigilResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.entries.push((None, name.into(), Arc::new(op)));
        self
    }

    /// Add a command in an assertion namespace
    #[must_use]
    pub fn assertion(
        mut self,
        namespace: AssertionNamespace,
        name: impl Into<String>,
        op: impl Fn(&Client, Vec<CommandArg>) -> VigilResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.entries.push((Some(namespace), name.into(), Arc::new(op)));
        self
    }

    /// Append every definition of another set
    #[must_use]
    pub fn extend(mut self, other: &Self) -> Self {
        self.entries.extend(other.entries.iter().cloned());
        self
    }

    /// Number of definitions
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register every definition on a surface
    pub fn apply(&self, surface: &mut CommandSurface) -> VigilResult<()> {
        for (ns, name, op) in &self.entries {
            surface.attach(*ns, name, Arc::clone(op))?;
        }
        Ok(())
    }
}

fn queueing(
    name: &str,
) -> impl Fn(&Client, Vec<CommandArg>) -> VigilResult<Value> + Send + Sync + 'static {
    let name = name.to_string();
    move |client: &Client, args: Vec<CommandArg>| {
        client.enqueue(name.clone(), args.iter().map(CommandArg::to_value).collect());
        Ok(Value::Null)
    }
}
