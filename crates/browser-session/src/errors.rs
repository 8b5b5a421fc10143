//! Error types for browser session operations

use thiserror::Error;

/// Failures surfaced by a [`BrowserSession`](crate::BrowserSession)
#[derive(Debug, Error, Clone)]
pub enum SessionError {
    /// A bounded wait did not observe its condition before the deadline
    #[error("Wait timeout: {0}")]
    Timeout(String),

    /// No element matched the locator
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// The element is no longer attached to the live document
    #[error("Stale element: {0}")]
    StaleElement(String),

    /// Page-side script failed or returned an unexpected shape
    #[error("Script error: {0}")]
    Script(String),

    /// The browser could not be started or the start page could not be opened
    #[error("Launch failed: {0}")]
    Launch(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Whether this error came from a bounded wait running out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, SessionError::Timeout(_))
    }
}
