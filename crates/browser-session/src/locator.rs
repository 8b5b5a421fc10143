//! Element locators and handles

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural query against the page DOM
///
/// Locators are opaque to the protocol layer: they are built once from the
/// page layout and handed to the session unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locator {
    /// XPath expression, evaluated relative to the document or a parent element
    XPath(String),

    /// CSS selector
    Css(String),

    /// Tag name (e.g. `textarea`)
    TagName(String),
}

impl Locator {
    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Locator::TagName(name.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::XPath(expr) => write!(f, "xpath:{}", expr),
            Locator::Css(selector) => write!(f, "css:{}", selector),
            Locator::TagName(name) => write!(f, "tag:{}", name),
        }
    }
}

/// Opaque reference to an element minted by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(pub u64);

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locators_render_with_strategy_prefix() {
        assert_eq!(
            Locator::xpath("//h2[@id='recordCount-results']").to_string(),
            "xpath://h2[@id='recordCount-results']"
        );
        assert_eq!(Locator::css("#submit").to_string(), "css:#submit");
        assert_eq!(Locator::tag("textarea").to_string(), "tag:textarea");
    }
}
