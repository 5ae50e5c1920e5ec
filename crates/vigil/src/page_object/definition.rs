//! Page object definitions loaded from YAML or JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::{CommandSet, Page, PageBuilder, SectionBuilder};
use crate::client::Client;
use crate::result::{VigilError, VigilResult};

/// Declarative form of a page
///
/// ```yaml
/// url: http://localhost/login
/// elements:
///   username: "#username"
///   submit: { selector: "//button", locateStrategy: xpath }
/// sections:
///   menu:
///     selector: "#menu"
///     elements:
///       home: "li.home"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageDefinition {
    /// Page URL
    pub url: Option<String>,
    /// Element selectors in any accepted shape
    pub elements: BTreeMap<String, Value>,
    /// Sections
    pub sections: BTreeMap<String, SectionDefinition>,
}

/// Declarative form of a section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionDefinition {
    /// Section selector
    pub selector: Option<Value>,
    /// Index into the matches
    pub index: Option<Value>,
    /// Locate strategy name
    #[serde(rename = "locateStrategy")]
    pub locate_strategy: Option<String>,
    /// Element selectors
    pub elements: BTreeMap<String, Value>,
    /// Nested sections
    pub sections: BTreeMap<String, SectionDefinition>,
}

impl SectionDefinition {
    fn builder(&self, name: &str) -> SectionBuilder {
        let mut selector = Map::new();
        if let Some(value) = &self.selector {
            let _ = selector.insert("selector".to_string(), value.clone());
        }
        if let Some(index) = &self.index {
            let _ = selector.insert("index".to_string(), index.clone());
        }
        if let Some(strategy) = &self.locate_strategy {
            let _ = selector.insert(
                "locateStrategy".to_string(),
                Value::String(strategy.clone()),
            );
        }

        let mut builder = SectionBuilder::new(name, Value::Object(selector));
        for (element, value) in &self.elements {
            builder = builder.element(element.clone(), value.clone());
        }
        for (nested, definition) in &self.sections {
            builder = builder.section(definition.builder(nested));
        }
        builder
    }
}

impl PageDefinition {
    /// Parse a definition from YAML
    pub fn from_yaml_str(yaml: &str) -> VigilResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Parse a definition from JSON
    pub fn from_json_str(json: &str) -> VigilResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Page builder with this definition's declarations and the standard commands
    #[must_use]
    pub fn builder(&self, name: &str) -> PageBuilder {
        let mut builder = PageBuilder::new(name);
        if let Some(url) = &self.url {
            builder = builder.url(url.clone());
        }
        for (element, value) in &self.elements {
            builder = builder.element(element.clone(), value.clone());
        }
        for (section, definition) in &self.sections {
            builder = builder.section(definition.builder(section));
        }
        builder
    }
}

/// Page definitions by name, plus the custom commands every page gets
#[derive(Debug, Default)]
pub struct PageRegistry {
    definitions: BTreeMap<String, PageDefinition>,
    commands: CommandSet,
}

impl PageRegistry {
    /// Create a new page registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add custom commands to every page created by this registry
    #[must_use]
    pub fn with_commands(mut self, commands: &CommandSet) -> Self {
        self.commands = self.commands.extend(commands);
        self
    }

    /// Register a page definition
    pub fn register(&mut self, name: impl Into<String>, definition: PageDefinition) {
        let _ = self.definitions.insert(name.into(), definition);
    }

    /// Get a definition by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PageDefinition> {
        self.definitions.get(name)
    }

    /// List all registered pages
    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        self.definitions.keys().map(String::as_str).collect()
    }

    /// Get the number of registered pages
    #[must_use]
    pub fn count(&self) -> usize {
        self.definitions.len()
    }

    /// Build a registered page for a client
    pub fn create(&self, name: &str, client: &Client) -> VigilResult<Page> {
        let definition = self
            .definitions
            .get(name)
            .ok_or_else(|| VigilError::UnknownPage {
                name: name.to_string(),
            })?;
        definition
            .builder(name)
            .commands(&self.commands)
            .build(client)
    }
}
