//! Browser session port
//!
//! This crate provides the page-driving surface the query protocol is written against:
//! - Element lookup by XPath, CSS selector, or tag name
//! - Click, clear, type, read-text, and select-option primitives
//! - Bounded waits for presence, visibility, and staleness
//! - A Chromium backend and, behind the `fake` feature, an in-memory session for tests

pub mod chromium;
pub mod errors;
#[cfg(feature = "fake")]
pub mod fake;
mod locator;
mod session;

pub use chromium::{ChromiumConfig, ChromiumSession};
pub use errors::SessionError;
pub use locator::*;
pub use session::*;
