//! The browser session trait and its bounded waits

use crate::errors::SessionError;
use crate::locator::{ElementHandle, Locator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Interval between condition probes while waiting
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Condition a session can block on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitCondition {
    /// At least one element matches the locator
    ElementPresent(Locator),

    /// The first element matching the locator is rendered and displayed
    ElementVisible(Locator),

    /// The element has been detached from the live document
    ElementStale(ElementHandle),
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitCondition::ElementPresent(locator) => write!(f, "presence of {}", locator),
            WaitCondition::ElementVisible(locator) => write!(f, "visibility of {}", locator),
            WaitCondition::ElementStale(handle) => write!(f, "staleness of {}", handle),
        }
    }
}

/// What a satisfied wait yields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The element that satisfied a presence or visibility condition
    Element(ElementHandle),

    /// The condition holds but carries no element (staleness)
    Met,
}

impl WaitOutcome {
    pub fn element(self) -> Option<ElementHandle> {
        match self {
            WaitOutcome::Element(handle) => Some(handle),
            WaitOutcome::Met => None,
        }
    }
}

/// A controllable page-rendering agent
///
/// One implementation exists per automation backend. All methods take `&self`;
/// implementations own whatever synchronization the backend needs.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// First element matching the locator
    async fn find_element(&self, locator: &Locator) -> Result<ElementHandle, SessionError>;

    /// All elements matching the locator, in document order
    async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementHandle>, SessionError>;

    /// All elements matching the locator relative to `parent`, in document order
    async fn find_elements_within(
        &self,
        parent: ElementHandle,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, SessionError>;

    async fn click(&self, element: ElementHandle) -> Result<(), SessionError>;

    /// Empty a text input
    async fn clear(&self, element: ElementHandle) -> Result<(), SessionError>;

    async fn type_text(&self, element: ElementHandle, text: &str) -> Result<(), SessionError>;

    /// Rendered text of the element, lines separated by `\n`
    async fn read_text(&self, element: ElementHandle) -> Result<String, SessionError>;

    /// Select the `<option>` whose value attribute equals `value`
    async fn select_option(&self, element: ElementHandle, value: &str)
        -> Result<(), SessionError>;

    /// Whether the first element matching the locator is displayed; `false` when absent
    async fn is_visible(&self, locator: &Locator) -> Result<bool, SessionError>;

    /// Whether the element has been detached from the live document
    async fn is_stale(&self, element: ElementHandle) -> Result<bool, SessionError>;

    /// Evaluate a condition once
    async fn probe(&self, condition: &WaitCondition) -> Result<Option<WaitOutcome>, SessionError> {
        match condition {
            WaitCondition::ElementPresent(locator) => Ok(self
                .find_elements(locator)
                .await?
                .first()
                .copied()
                .map(WaitOutcome::Element)),
            WaitCondition::ElementVisible(locator) => {
                if !self.is_visible(locator).await? {
                    return Ok(None);
                }
                match self.find_element(locator).await {
                    Ok(handle) => Ok(Some(WaitOutcome::Element(handle))),
                    // Detached between the visibility probe and the lookup
                    Err(SessionError::ElementNotFound(_)) => Ok(None),
                    Err(err) => Err(err),
                }
            }
            WaitCondition::ElementStale(handle) => {
                Ok(self.is_stale(*handle).await?.then_some(WaitOutcome::Met))
            }
        }
    }

    /// Block until the condition holds or `timeout` elapses
    async fn wait_until(
        &self,
        condition: &WaitCondition,
        timeout: Duration,
    ) -> Result<WaitOutcome, SessionError> {
        debug!(condition = %condition, timeout_ms = timeout.as_millis() as u64, "waiting until");
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(outcome) = self.probe(condition).await? {
                return Ok(outcome);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!("wait for {} timed out after {}ms", condition, timeout.as_millis());
                return Err(SessionError::Timeout(format!(
                    "Condition not met after {}ms: {}",
                    timeout.as_millis(),
                    condition
                )));
            }
            sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Block until the condition no longer holds or `timeout` elapses
    async fn wait_until_gone(
        &self,
        condition: &WaitCondition,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        debug!(condition = %condition, timeout_ms = timeout.as_millis() as u64, "waiting until gone");
        let deadline = Instant::now() + timeout;

        loop {
            if self.probe(condition).await?.is_none() {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                warn!("wait for absence of {} timed out after {}ms", condition, timeout.as_millis());
                return Err(SessionError::Timeout(format!(
                    "Condition still holds after {}ms: {}",
                    timeout.as_millis(),
                    condition
                )));
            }
            sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}
