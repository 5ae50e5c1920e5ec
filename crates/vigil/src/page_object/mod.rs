//! Page Object Model support.
//!
//! Pages and sections declare named elements; commands called on them accept
//! `@name` references that resolve to the declared locators, including the
//! ancestor chain of nested sections.
//!
//! ```ignore
//! let page = PageBuilder::new("login")
//!     .url("http://localhost/login")
//!     .element("username", "#username")
//!     .section(SectionBuilder::new("signin", "#signin").element("submit", "button"))
//!     .build(&client)?;
//!
//! page.command("setValue", vec!["@username".into(), "admin".into()])?
//!     .assert("visible", vec!["@username".into()])?;
//! page.section("signin")?.command("click", vec!["@submit".into()])?;
//! ```

mod command;
mod definition;
mod resolver;

pub use command::{
    AssertionNamespace, CommandArg, CommandFn, CommandReturn, CommandSet, CommandSurface,
    WrappedCommand,
};
pub use definition::{PageDefinition, PageRegistry, SectionDefinition};
pub use resolver::{LookupKind, SelectorResolver};

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::client::Client;
use crate::locator::{Locator, SelectorInput};
use crate::result::{VigilError, VigilResult};

/// Declarations visible to commands of one page or section
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// Page or section name
    pub name: String,
    /// Section locator (`None` for pages)
    pub locator: Option<Arc<Locator>>,
    /// Named elements
    pub elements: BTreeMap<String, Arc<Locator>>,
    /// Named sections
    pub sections: BTreeMap<String, Section>,
}

impl Scope {
    /// Create an empty scope
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Trait for page objects (pages and sections).
///
/// Implementors expose their declarations, commands and client; every other
/// method is provided.
pub trait PageObject {
    /// Declarations
    fn scope(&self) -> &Scope;

    /// Registered commands
    fn surface(&self) -> &CommandSurface;

    /// Session-bound client
    fn client(&self) -> &Client;

    /// Page or section name
    fn name(&self) -> &str {
        &self.scope().name
    }

    /// Page URL, if any
    fn url(&self) -> Option<&str> {
        None
    }

    /// Run a command by namespace and name
    fn invoke(
        &self,
        namespace: Option<AssertionNamespace>,
        name: &str,
        args: Vec<CommandArg>,
    ) -> VigilResult<CommandReturn> {
        let command =
            self.surface()
                .get(namespace, name)
                .ok_or_else(|| VigilError::UnknownCommand {
                    name: namespace.map_or_else(|| name.to_string(), |ns| format!("{ns}.{name}")),
                    target: self.name().to_string(),
                })?;
        command.call(self.scope(), self.client(), args)
    }

    /// Run a command and continue chaining
    fn command(&self, name: &str, args: Vec<CommandArg>) -> VigilResult<&Self>
    where
        Self: Sized,
    {
        let _ = self.invoke(None, name, args)?;
        Ok(self)
    }

    /// Run a hard assertion and continue chaining
    fn assert(&self, name: &str, args: Vec<CommandArg>) -> VigilResult<&Self>
    where
        Self: Sized,
    {
        let _ = self.invoke(Some(AssertionNamespace::Assert), name, args)?;
        Ok(self)
    }

    /// Run a soft verification and continue chaining
    fn verify(&self, name: &str, args: Vec<CommandArg>) -> VigilResult<&Self>
    where
        Self: Sized,
    {
        let _ = self.invoke(Some(AssertionNamespace::Verify), name, args)?;
        Ok(self)
    }

    /// Run an expectation and return its value
    fn expect(&self, name: &str, args: Vec<CommandArg>) -> VigilResult<Value> {
        match self.invoke(Some(AssertionNamespace::Expect), name, args)? {
            CommandReturn::Value(value) => Ok(value),
            CommandReturn::Chain => Ok(Value::Null),
        }
    }

    /// Resolved locator of a declared element
    fn element(&self, name: &str) -> VigilResult<Locator> {
        SelectorResolver::resolve(
            self.scope(),
            Locator::new(format!("@{name}")),
            LookupKind::Element,
        )
    }

    /// A declared section
    fn section(&self, name: &str) -> VigilResult<&Section> {
        let scope = self.scope();
        scope
            .sections
            .get(name)
            .ok_or_else(|| VigilError::ElementNotFound {
                kind: "section",
                name: name.to_string(),
                parent: scope.name.clone(),
                available: scope.sections.keys().cloned().collect(),
            })
    }
}

/// A page: top level declarations plus an optional URL
#[derive(Debug, Clone)]
pub struct Page {
    url: Option<String>,
    scope: Scope,
    surface: Arc<CommandSurface>,
    client: Client,
}

impl Page {
    /// Enqueue navigation to the page URL
    pub fn navigate(&self) -> VigilResult<&Self> {
        let url = self.url.as_deref().ok_or_else(|| VigilError::Configuration {
            message: format!("page \"{}\" has no url", self.scope.name),
        })?;
        self.client.enqueue("url", vec![Value::String(url.to_string())]);
        Ok(self)
    }
}

impl PageObject for Page {
    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn surface(&self) -> &CommandSurface {
        &self.surface
    }

    fn client(&self) -> &Client {
        &self.client
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

/// A section: a located region of a page with its own declarations
#[derive(Debug, Clone)]
pub struct Section {
    locator: Arc<Locator>,
    scope: Scope,
    surface: Arc<CommandSurface>,
    client: Client,
}

impl Section {
    /// The section's own locator
    #[must_use]
    pub fn locator(&self) -> &Locator {
        &self.locator
    }
}

impl PageObject for Section {
    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn surface(&self) -> &CommandSurface {
        &self.surface
    }

    fn client(&self) -> &Client {
        &self.client
    }
}

/// Builder for [`Section`]s
#[derive(Debug, Clone)]
pub struct SectionBuilder {
    name: String,
    selector: SelectorInput,
    elements: Vec<(String, SelectorInput)>,
    sections: Vec<SectionBuilder>,
    commands: CommandSet,
}

impl SectionBuilder {
    /// Create a section builder
    #[must_use]
    pub fn new(name: impl Into<String>, selector: impl Into<SelectorInput>) -> Self {
        Self {
            name: name.into(),
            selector: selector.into(),
            elements: Vec::new(),
            sections: Vec::new(),
            commands: CommandSet::new(),
        }
    }

    /// Declare an element
    #[must_use]
    pub fn element(mut self, name: impl Into<String>, selector: impl Into<SelectorInput>) -> Self {
        self.elements.push((name.into(), selector.into()));
        self
    }

    /// Declare a nested section
    #[must_use]
    pub fn section(mut self, section: Self) -> Self {
        self.sections.push(section);
        self
    }

    /// Add commands available on this section only
    #[must_use]
    pub fn commands(mut self, commands: &CommandSet) -> Self {
        self.commands = self.commands.extend(commands);
        self
    }

    fn build(
        self,
        parent: Option<Arc<Locator>>,
        shared: &CommandSet,
        client: &Client,
    ) -> VigilResult<Section> {
        let locator = declare(&self.name, self.selector, parent)?;
        let mut scope = Scope::new(self.name);
        scope.locator = Some(Arc::clone(&locator));
        declare_all(
            &mut scope,
            self.elements,
            self.sections,
            Some(&locator),
            shared,
            client,
        )?;

        let mut surface = CommandSurface::new();
        shared.apply(&mut surface)?;
        self.commands.apply(&mut surface)?;

        Ok(Section {
            locator,
            scope,
            surface: Arc::new(surface),
            client: client.clone(),
        })
    }
}

/// Builder for [`Page`]s.
///
/// Pages start with [`CommandSet::standard`]; commands added here are also
/// available on every section of the page.
#[derive(Debug, Clone)]
pub struct PageBuilder {
    name: String,
    url: Option<String>,
    elements: Vec<(String, SelectorInput)>,
    sections: Vec<SectionBuilder>,
    commands: CommandSet,
}

impl PageBuilder {
    /// Create a page builder with the standard commands
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            commands: CommandSet::standard(),
            ..Self::bare(name)
        }
    }

    /// Create a page builder without any command
    #[must_use]
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            elements: Vec::new(),
            sections: Vec::new(),
            commands: CommandSet::new(),
        }
    }

    /// Set the page URL
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Declare an element
    #[must_use]
    pub fn element(mut self, name: impl Into<String>, selector: impl Into<SelectorInput>) -> Self {
        self.elements.push((name.into(), selector.into()));
        self
    }

    /// Declare a section
    #[must_use]
    pub fn section(mut self, section: SectionBuilder) -> Self {
        self.sections.push(section);
        self
    }

    /// Add a command to the page and its sections
    #[must_use]
    pub fn command(
        mut self,
        name: impl Into<String>,
        op: impl Fn(&Client, Vec<CommandArg>) -> VigilResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.commands = self.commands.command(name, op);
        self
    }

    /// Add an assertion command to the page and its sections
    #[must_use]
    pub fn assertion(
        mut self,
        namespace: AssertionNamespace,
        name: impl Into<String>,
        op: impl Fn(&Client, Vec<CommandArg>) -> VigilResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.commands = self.commands.assertion(namespace, name, op);
        self
    }

    /// Add a set of commands to the page and its sections
    #[must_use]
    pub fn commands(mut self, commands: &CommandSet) -> Self {
        self.commands = self.commands.extend(commands);
        self
    }

    /// Build the page for a client.
    ///
    /// Fails on declarations without a selector, duplicate names and
    /// duplicate commands.
    pub fn build(self, client: &Client) -> VigilResult<Page> {
        let mut scope = Scope::new(self.name);
        declare_all(
            &mut scope,
            self.elements,
            self.sections,
            None,
            &self.commands,
            client,
        )?;

        let mut surface = CommandSurface::new();
        self.commands.apply(&mut surface)?;
        tracing::debug!(
            page = %scope.name,
            elements = scope.elements.len(),
            sections = scope.sections.len(),
            "page object built"
        );

        Ok(Page {
            url: self.url,
            scope,
            surface: Arc::new(surface),
            client: client.clone(),
        })
    }
}

fn declare(
    name: &str,
    input: SelectorInput,
    parent: Option<Arc<Locator>>,
) -> VigilResult<Arc<Locator>> {
    let mut locator = Locator::parse(input, None).map_err(|err| match err {
        VigilError::MissingSelector { found, .. } => VigilError::MissingSelector {
            name: name.to_string(),
            found,
        },
        other => other,
    })?;
    if locator.name.is_none() {
        locator.name = Some(name.to_string());
    }
    if locator.parent.is_none() {
        locator.parent = parent;
    }
    Ok(Arc::new(locator))
}

fn declare_all(
    scope: &mut Scope,
    elements: Vec<(String, SelectorInput)>,
    sections: Vec<SectionBuilder>,
    parent: Option<&Arc<Locator>>,
    shared: &CommandSet,
    client: &Client,
) -> VigilResult<()> {
    for (name, input) in elements {
        let locator = declare(&name, input, parent.cloned())?;
        if scope.elements.insert(name.clone(), locator).is_some() {
            return Err(duplicate_declaration("element", &name, &scope.name));
        }
    }
    for builder in sections {
        let section = builder.build(parent.cloned(), shared, client)?;
        let name = section.scope.name.clone();
        if scope.sections.insert(name.clone(), section).is_some() {
            return Err(duplicate_declaration("section", &name, &scope.name));
        }
    }
    Ok(())
}

fn duplicate_declaration(kind: &str, name: &str, parent: &str) -> VigilError {
    VigilError::Configuration {
        message: format!("{kind} \"{name}\" is declared twice in \"{parent}\""),
    }
}
