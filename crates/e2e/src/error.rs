//! Error types for functional testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("No such element: {0}")]
    NoSuchElement(String),

    #[error("Stale element reference: {0}")]
    StaleElement(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("No page loaded")]
    NoPage,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTML parse error: {0}")]
    HtmlParse(String),

    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Store error: {0}")]
    Store(#[from] superlists_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl E2eError {
    /// Errors expected while a page is still loading or re-rendering.
    ///
    /// A missing element, a handle into a page that has since navigated, and
    /// an assertion that is not true *yet* are all retried by the bounded
    /// poll in [`crate::wait`].
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            E2eError::NoSuchElement(_) | E2eError::StaleElement(_) | E2eError::AssertionFailed(_)
        )
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
