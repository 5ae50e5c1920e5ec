//! Resolution of `@name` references into locator queries.

use std::sync::Arc;

use super::Scope;
use crate::locator::{Locator, REFERENCE_MARKER};
use crate::result::{VigilError, VigilResult};

/// Which declarations a reference is looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// Named elements
    Element,
    /// Named sections
    Section,
}

impl LookupKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Element => "element",
            Self::Section => "section",
        }
    }
}

/// Turns references into concrete locators
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorResolver;

impl SelectorResolver {
    /// Resolve a reference against the declarations of a page or section.
    ///
    /// Fields set on `input` win over the declaration's. When the resolved
    /// element sits inside sections, the result is an unnamed recursion
    /// locator whose chain lists the ancestors, outermost first, followed by
    /// the element itself. The walk stops at the first ancestor without a
    /// selector. Non-reference input is returned unchanged.
    pub fn resolve(scope: &Scope, input: Locator, kind: LookupKind) -> VigilResult<Locator> {
        let Some(name) = input
            .selector
            .as_query()
            .and_then(|q| q.strip_prefix(REFERENCE_MARKER))
            .map(str::to_string)
        else {
            return Ok(input);
        };

        let declared = Self::lookup(scope, &name, kind)?;
        let resolved = Locator {
            selector: declared.selector.clone(),
            ..input
        }
        .merge_defaults(declared);

        let mut ancestors = Vec::new();
        let mut cursor: Option<&Arc<Locator>> = resolved.parent.as_ref();
        while let Some(parent) = cursor {
            if !parent.has_selector() {
                break;
            }
            ancestors.push(parent.as_ref().clone());
            cursor = parent.parent.as_ref();
        }

        if ancestors.is_empty() {
            return Ok(resolved);
        }

        ancestors.reverse();
        ancestors.push(resolved);
        Ok(Locator::chain(ancestors))
    }

    fn lookup<'a>(scope: &'a Scope, name: &str, kind: LookupKind) -> VigilResult<&'a Locator> {
        let found = match kind {
            LookupKind::Element => scope.elements.get(name).map(Arc::as_ref),
            LookupKind::Section => scope.sections.get(name).map(|s| s.locator()),
        };
        found.ok_or_else(|| VigilError::ElementNotFound {
            kind: kind.label(),
            name: name.to_string(),
            parent: scope.name.clone(),
            available: match kind {
                LookupKind::Element => scope.elements.keys().cloned().collect(),
                LookupKind::Section => scope.sections.keys().cloned().collect(),
            },
        })
    }
}
