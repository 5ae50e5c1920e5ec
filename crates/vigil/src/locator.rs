//! Locator abstraction for element selection.
//!
//! A [`Locator`] describes how the remote session finds an element: a
//! selector, a locate strategy and an index into the matches. Selector values
//! arrive in several shapes (plain strings, `[selector, index, strategy]`
//! lists, `{selector, index, locateStrategy}` objects or already parsed
//! locators); [`Locator::parse`] normalizes all of them.
//!
//! Selectors starting with [`REFERENCE_MARKER`] are references to named page
//! object declarations and are resolved by
//! [`SelectorResolver`](crate::page_object::SelectorResolver).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::result::{VigilError, VigilResult};

/// Prefix that marks a selector as a reference to a declared element
pub const REFERENCE_MARKER: char = '@';

/// Name used in diagnostics for locators created without one
pub const ANONYMOUS: &str = "(anonymous)";

/// Strategy the remote session uses to interpret a selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LocateStrategy {
    /// CSS selector
    #[default]
    #[serde(rename = "css selector", alias = "css")]
    Css,
    /// XPath expression
    #[serde(rename = "xpath")]
    XPath,
    /// Element id
    #[serde(rename = "id")]
    Id,
    /// `name` attribute
    #[serde(rename = "name")]
    Name,
    /// Tag name
    #[serde(rename = "tag name", alias = "tag")]
    TagName,
    /// Class name
    #[serde(rename = "class name")]
    ClassName,
    /// Exact link text
    #[serde(rename = "link text")]
    LinkText,
    /// Partial link text
    #[serde(rename = "partial link text")]
    PartialLinkText,
    /// Sequential scoped queries through an ancestor chain
    #[serde(rename = "recursion")]
    Recursion,
}

impl LocateStrategy {
    /// WebDriver wire name of the strategy
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Css => "css selector",
            Self::XPath => "xpath",
            Self::Id => "id",
            Self::Name => "name",
            Self::TagName => "tag name",
            Self::ClassName => "class name",
            Self::LinkText => "link text",
            Self::PartialLinkText => "partial link text",
            Self::Recursion => "recursion",
        }
    }
}

impl fmt::Display for LocateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocateStrategy {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "css selector" | "css" => Ok(Self::Css),
            "xpath" => Ok(Self::XPath),
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "tag name" | "tag" => Ok(Self::TagName),
            "class name" => Ok(Self::ClassName),
            "link text" => Ok(Self::LinkText),
            "partial link text" => Ok(Self::PartialLinkText),
            "recursion" => Ok(Self::Recursion),
            other => Err(VigilError::InvalidSelector {
                message: format!("unknown locate strategy \"{other}\""),
            }),
        }
    }
}

/// The query part of a locator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selector {
    /// A single query string (e.g. `#login`, `//div`, `@username`)
    Query(String),
    /// Ancestors followed by the element itself, used with
    /// [`LocateStrategy::Recursion`]
    Chain(Vec<Locator>),
}

impl Selector {
    /// The query string, if this is not a chain
    #[must_use]
    pub fn as_query(&self) -> Option<&str> {
        match self {
            Self::Query(q) => Some(q),
            Self::Chain(_) => None,
        }
    }

    /// Whether the selector has nothing to query with
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Query(q) => q.is_empty(),
            Self::Chain(levels) => levels.is_empty(),
        }
    }
}

/// A raw selector value handed to a command or declared on a page object.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorInput {
    /// Already parsed locator
    Locator(Locator),
    /// String, list, object or scalar value
    Value(Value),
}

impl From<Locator> for SelectorInput {
    fn from(locator: Locator) -> Self {
        Self::Locator(locator)
    }
}

impl From<Value> for SelectorInput {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for SelectorInput {
    fn from(s: &str) -> Self {
        Self::Value(Value::String(s.to_string()))
    }
}

impl From<String> for SelectorInput {
    fn from(s: String) -> Self {
        Self::Value(Value::String(s))
    }
}

/// Normalized descriptor of how to find an element.
///
/// Unset fields are kept as `None` so that a reference can inherit them from
/// its declaration (see [`Locator::merge_defaults`]). Readers should use
/// [`Locator::strategy`] and [`Locator::index`], which apply the defaults
/// (`css selector`, index `0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    /// Query or ancestor chain
    pub selector: Selector,
    /// Locate strategy, `None` until set or inherited
    #[serde(
        rename = "locateStrategy",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub strategy: Option<LocateStrategy>,
    /// Index into the matched elements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Declared name, for diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Enclosing section's locator
    #[serde(skip)]
    pub parent: Option<Arc<Locator>>,
}

impl Locator {
    /// Create a CSS locator from a query string
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: Selector::Query(selector.into()),
            strategy: None,
            index: None,
            name: None,
            parent: None,
        }
    }

    /// Create a recursion locator from an ancestor chain
    #[must_use]
    pub fn chain(levels: Vec<Locator>) -> Self {
        Self {
            selector: Selector::Chain(levels),
            strategy: Some(LocateStrategy::Recursion),
            index: None,
            name: None,
            parent: None,
        }
    }

    /// Set the locate strategy
    #[must_use]
    pub const fn with_strategy(mut self, strategy: LocateStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Set the index
    #[must_use]
    pub const fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the diagnostic name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the enclosing section's locator
    #[must_use]
    pub fn with_parent(mut self, parent: Arc<Locator>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Effective strategy (`css selector` when unset)
    #[must_use]
    pub fn strategy(&self) -> LocateStrategy {
        self.strategy.unwrap_or_default()
    }

    /// Effective index (`0` when unset)
    #[must_use]
    pub fn index(&self) -> usize {
        self.index.unwrap_or(0)
    }

    /// Declared name or `(anonymous)`
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(ANONYMOUS)
    }

    /// Whether the selector is a reference to a declared element
    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.selector
            .as_query()
            .is_some_and(|q| q.starts_with(REFERENCE_MARKER))
    }

    /// Whether this locator has a usable selector
    #[must_use]
    pub fn has_selector(&self) -> bool {
        !self.selector.is_empty()
    }

    /// Fill every unset field from `fallback`; fields already set win.
    ///
    /// The field list is fixed: name, parent, strategy, index. The selector
    /// is always present and never merged.
    #[must_use]
    pub fn merge_defaults(mut self, fallback: &Locator) -> Self {
        if self.name.is_none() {
            self.name.clone_from(&fallback.name);
        }
        if self.parent.is_none() {
            self.parent.clone_from(&fallback.parent);
        }
        if self.strategy.is_none() {
            self.strategy = fallback.strategy;
        }
        if self.index.is_none() {
            self.index = fallback.index;
        }
        self
    }

    /// Parse a selector value into a locator.
    ///
    /// `default_strategy` applies when the value does not carry its own.
    /// With [`LocateStrategy::Recursion`] the value must be a list whose
    /// entries are parsed independently into a chain.
    pub fn parse(
        input: impl Into<SelectorInput>,
        default_strategy: Option<LocateStrategy>,
    ) -> VigilResult<Self> {
        let value = match input.into() {
            SelectorInput::Locator(mut locator) => {
                if locator.strategy.is_none() {
                    locator.strategy = default_strategy;
                }
                return Ok(locator);
            }
            SelectorInput::Value(value) => value,
        };

        if default_strategy == Some(LocateStrategy::Recursion) {
            return Self::parse_chain(value);
        }

        let mut locator = match value {
            Value::Array(items) => Self::parse_list(items)?,
            Value::Object(map) => {
                let selector = match map.get("selector") {
                    Some(selector) => query_from_value(selector)?,
                    None => {
                        let found: Vec<&str> = map.keys().map(String::as_str).collect();
                        return Err(VigilError::MissingSelector {
                            name: map
                                .get("name")
                                .and_then(Value::as_str)
                                .unwrap_or(ANONYMOUS)
                                .to_string(),
                            found: found.join(","),
                        });
                    }
                };
                let mut locator = Self::new(selector);
                if let Some(strategy) = map.get("locateStrategy") {
                    locator.strategy = strategy_from_value(strategy)?;
                }
                if let Some(index) = map.get("index") {
                    locator.index = index_from_value(index)?;
                }
                if let Some(name) = map.get("name").and_then(Value::as_str) {
                    locator.name = Some(name.to_string());
                }
                locator
            }
            other => Self::new(query_from_value(&other)?),
        };

        if locator.strategy.is_none() {
            locator.strategy = default_strategy;
        }
        Ok(locator)
    }

    fn parse_list(items: Vec<Value>) -> VigilResult<Self> {
        let mut items = items.into_iter();
        let selector = match items.next() {
            Some(first) => query_from_value(&first)?,
            None => {
                return Err(VigilError::MissingSelector {
                    name: ANONYMOUS.to_string(),
                    found: String::new(),
                })
            }
        };
        let mut locator = Self::new(selector);
        if let Some(index) = items.next() {
            locator.index = index_from_value(&index)?;
        }
        if let Some(strategy) = items.next() {
            locator.strategy = strategy_from_value(&strategy)?;
        }
        Ok(locator)
    }

    fn parse_chain(value: Value) -> VigilResult<Self> {
        let Value::Array(levels) = value else {
            return Err(VigilError::InvalidSelector {
                message: "the recursion strategy needs a list of selectors".to_string(),
            });
        };
        let levels = levels
            .into_iter()
            .map(|level| Self::parse(level, None))
            .collect::<VigilResult<Vec<_>>>()?;
        Ok(Self::chain(levels))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Element[name=@{}]", self.name())
    }
}

fn query_from_value(value: &Value) -> VigilResult<String> {
    let query = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    if query.is_empty() {
        return Err(VigilError::MissingSelector {
            name: ANONYMOUS.to_string(),
            found: "selector".to_string(),
        });
    }
    Ok(query)
}

fn index_from_value(value: &Value) -> VigilResult<Option<usize>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| invalid_index(value)),
        Value::String(s) => s
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| invalid_index(value)),
        _ => Err(invalid_index(value)),
    }
}

fn invalid_index(value: &Value) -> VigilError {
    VigilError::InvalidSelector {
        message: format!("index must be a non-negative integer, got {value}"),
    }
}

fn strategy_from_value(value: &Value) -> VigilResult<Option<LocateStrategy>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => s.parse().map(Some),
        other => Err(VigilError::InvalidSelector {
            message: format!("locate strategy must be a string, got {other}"),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_string_defaults() {
            let locator = Locator::parse("#weblogin", None).unwrap();
            assert_eq!(locator.selector, Selector::Query("#weblogin".into()));
            assert_eq!(locator.strategy(), LocateStrategy::Css);
            assert_eq!(locator.index(), 0);
            assert!(locator.strategy.is_none());
        }

        #[test]
        fn test_default_strategy_applies() {
            let locator = Locator::parse("//weblogin", Some(LocateStrategy::XPath)).unwrap();
            assert_eq!(locator.strategy(), LocateStrategy::XPath);
        }

        #[test]
        fn test_list_shape() {
            let locator = Locator::parse(json!(["#weblogin", "2", "xpath"]), None).unwrap();
            assert_eq!(locator.selector.as_query(), Some("#weblogin"));
            assert_eq!(locator.index, Some(2));
            assert_eq!(locator.strategy, Some(LocateStrategy::XPath));
        }

        #[test]
        fn test_list_selector_only() {
            let locator = Locator::parse(json!(["div"]), Some(LocateStrategy::TagName)).unwrap();
            assert_eq!(locator.index, None);
            assert_eq!(locator.strategy(), LocateStrategy::TagName);
        }

        #[test]
        fn test_object_shape() {
            let locator = Locator::parse(
                json!({"selector": "@loginCss", "index": 1, "locateStrategy": "xpath"}),
                None,
            )
            .unwrap();
            assert!(locator.is_reference());
            assert_eq!(locator.index, Some(1));
            assert_eq!(locator.strategy, Some(LocateStrategy::XPath));
        }

        #[test]
        fn test_object_strategy_overrides_default() {
            let locator = Locator::parse(
                json!({"selector": "#a", "locateStrategy": "id"}),
                Some(LocateStrategy::XPath),
            )
            .unwrap();
            assert_eq!(locator.strategy(), LocateStrategy::Id);
        }

        #[test]
        fn test_object_without_selector() {
            let err = Locator::parse(json!({"index": 1, "locateStrategy": "css"}), None)
                .unwrap_err();
            match err {
                VigilError::MissingSelector { found, .. } => {
                    assert!(found.contains("index"));
                    assert!(found.contains("locateStrategy"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn test_scalar_is_stringified() {
            let locator = Locator::parse(json!(42), None).unwrap();
            assert_eq!(locator.selector.as_query(), Some("42"));
        }

        #[test]
        fn test_empty_and_null_rejected() {
            assert!(Locator::parse("", None).is_err());
            assert!(Locator::parse(Value::Null, None).is_err());
        }

        #[test]
        fn test_invalid_index() {
            assert!(Locator::parse(json!(["#a", "first"]), None).is_err());
            assert!(Locator::parse(json!({"selector": "#a", "index": -1}), None).is_err());
        }

        #[test]
        fn test_unknown_strategy() {
            assert!(Locator::parse(json!(["#a", 0, "shadow"]), None).is_err());
        }

        #[test]
        fn test_recursion_levels_parsed_independently() {
            let locator = Locator::parse(
                json!(["#section", {"selector": "button", "index": 1}]),
                Some(LocateStrategy::Recursion),
            )
            .unwrap();
            assert_eq!(locator.strategy(), LocateStrategy::Recursion);
            let Selector::Chain(levels) = &locator.selector else {
                panic!("expected a chain");
            };
            assert_eq!(levels.len(), 2);
            assert_eq!(levels[0].strategy, None);
            assert_eq!(levels[1].index, Some(1));
        }

        #[test]
        fn test_recursion_requires_list() {
            assert!(Locator::parse("#a", Some(LocateStrategy::Recursion)).is_err());
        }

        #[test]
        fn test_parse_is_idempotent() {
            let once = Locator::parse(json!({"selector": "#a", "index": 3}), None).unwrap();
            let twice = Locator::parse(once.clone(), None).unwrap();
            assert_eq!(once, twice);

            let with_default = Locator::parse(twice, Some(LocateStrategy::XPath)).unwrap();
            assert_eq!(with_default.strategy(), LocateStrategy::XPath);
            let again = Locator::parse(with_default.clone(), Some(LocateStrategy::Css)).unwrap();
            assert_eq!(with_default, again);
        }
    }

    mod reference_tests {
        use super::*;

        #[test]
        fn test_reference_detection() {
            assert!(Locator::new("@login").is_reference());
            assert!(!Locator::new("#login").is_reference());
            assert!(!Locator::chain(vec![Locator::new("@a")]).is_reference());
        }

        #[test]
        fn test_display() {
            let locator = Locator::new("#a").with_name("submit");
            assert_eq!(locator.to_string(), "Element[name=@submit]");
            assert_eq!(Locator::new("#a").to_string(), "Element[name=@(anonymous)]");
        }
    }

    mod merge_tests {
        use super::*;

        #[test]
        fn test_explicit_fields_win() {
            let declared = Locator::new("#weblogin")
                .with_index(1)
                .with_strategy(LocateStrategy::Css)
                .with_name("loginIndexed");
            let merged = Locator::new("#weblogin").with_index(0).merge_defaults(&declared);
            assert_eq!(merged.index, Some(0));
            assert_eq!(merged.name.as_deref(), Some("loginIndexed"));
            assert_eq!(merged.strategy, Some(LocateStrategy::Css));
        }

        #[test]
        fn test_parent_inherited() {
            let parent = Arc::new(Locator::new("#section"));
            let declared = Locator::new("#child").with_parent(parent.clone());
            let merged = Locator::new("#child").merge_defaults(&declared);
            assert!(Arc::ptr_eq(merged.parent.as_ref().unwrap(), &parent));
        }
    }

    mod serde_tests {
        use super::*;

        #[test]
        fn test_wire_names() {
            let locator = Locator::new("//a").with_strategy(LocateStrategy::XPath);
            let json = serde_json::to_value(&locator).unwrap();
            assert_eq!(json["selector"], "//a");
            assert_eq!(json["locateStrategy"], "xpath");
            assert!(json.get("parent").is_none());
        }

        #[test]
        fn test_strategy_from_str_aliases() {
            assert_eq!("css".parse::<LocateStrategy>().unwrap(), LocateStrategy::Css);
            assert_eq!("tag".parse::<LocateStrategy>().unwrap(), LocateStrategy::TagName);
            assert_eq!(LocateStrategy::LinkText.to_string(), "link text");
        }
    }
}
