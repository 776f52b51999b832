//! Browser abstraction
//!
//! The [`Browser`] trait is the surface a functional test drives: navigate,
//! find elements, read text and attributes, type into inputs. Element
//! handles belong to the page they were found on; once the browser navigates
//! they go stale, exactly like WebDriver element references.

pub mod dom;
pub mod http;

use async_trait::async_trait;
use std::fmt;

use crate::error::{E2eError, E2eResult};

pub use http::HttpBrowser;

/// Element locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum By {
    Id(String),
    TagName(String),
}

impl By {
    pub fn id(id: impl Into<String>) -> Self {
        By::Id(id.into())
    }

    pub fn tag_name(tag: impl Into<String>) -> Self {
        By::TagName(tag.into())
    }

    /// Parse the CSS subset scenario specs use: `#id` or a bare tag name
    pub fn from_selector(selector: &str) -> E2eResult<Self> {
        let selector = selector.trim();
        let valid = |s: &str| {
            !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        };
        match selector.strip_prefix('#') {
            Some(id) if valid(id) => Ok(By::id(id)),
            None if valid(selector) => Ok(By::tag_name(selector.to_ascii_lowercase())),
            _ => Err(E2eError::SpecParse(format!("unsupported selector: {}", selector))),
        }
    }

    /// CSS form of this locator
    pub fn css(&self) -> String {
        match self {
            By::Id(id) => format!("#{}", id),
            By::TagName(tag) => tag.clone(),
        }
    }
}

impl fmt::Display for By {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            By::Id(id) => write!(f, "id={}", id),
            By::TagName(tag) => write!(f, "tag={}", tag),
        }
    }
}

/// Special keys understood by [`Browser::send_keys`]
pub struct Keys;

impl Keys {
    /// WebDriver code point for the Enter key
    pub const ENTER: &'static str = "\u{e007}";
}

/// Handle to an element on a specific page load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    page: u64,
    node: dom::NodeId,
    locator: String,
}

impl Element {
    pub(crate) fn new(page: u64, node: dom::NodeId, locator: impl Into<String>) -> Self {
        Self {
            page,
            node,
            locator: locator.into(),
        }
    }

    pub(crate) fn page(&self) -> u64 {
        self.page
    }

    pub(crate) fn node(&self) -> dom::NodeId {
        self.node
    }

    /// Description of how the element was located
    pub fn locator(&self) -> &str {
        &self.locator
    }
}

/// A browser session
#[async_trait]
pub trait Browser: Send + Sync {
    /// Navigate to `url`, absolute or relative to the current page
    async fn get(&mut self, url: &str) -> E2eResult<()>;

    async fn current_url(&self) -> E2eResult<String>;

    async fn title(&self) -> E2eResult<String>;

    async fn find_element(&self, by: &By) -> E2eResult<Element>;

    async fn find_elements(&self, by: &By) -> E2eResult<Vec<Element>>;

    /// Elements matching `by` below `parent`
    async fn find_child_elements(&self, parent: &Element, by: &By) -> E2eResult<Vec<Element>>;

    /// Rendered text of the element
    async fn text(&self, element: &Element) -> E2eResult<String>;

    async fn attribute(&self, element: &Element, name: &str) -> E2eResult<Option<String>>;

    /// Type into an input. [`Keys::ENTER`] (or a newline) submits the
    /// enclosing form.
    async fn send_keys(&mut self, element: &Element, keys: &str) -> E2eResult<()>;

    /// Forget all cookies, so the next visit starts a fresh session
    async fn delete_all_cookies(&mut self) -> E2eResult<()>;

    async fn quit(&mut self) -> E2eResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_selector() {
        let cases = [
            ("#id_new_item", By::id("id_new_item")),
            ("h1", By::tag_name("h1")),
            (" BODY ", By::tag_name("body")),
        ];
        for (selector, expected) in cases {
            assert_eq!(By::from_selector(selector).unwrap(), expected, "{selector}");
        }
    }

    #[test]
    fn test_unsupported_selector() {
        for selector in ["#", ".has-error", "table tr"] {
            assert!(
                matches!(By::from_selector(selector), Err(E2eError::SpecParse(_))),
                "{selector}"
            );
        }
    }

    #[test]
    fn test_css_roundtrip() {
        for by in [By::id("id_list_table"), By::tag_name("tr")] {
            assert_eq!(By::from_selector(&by.css()).unwrap(), by);
        }
    }
}
