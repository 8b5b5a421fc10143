//! Result readiness gate - decides when the result table is safe to read

use browser_session::{BrowserSession, ElementHandle, WaitCondition};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::errors::QueryError;
use crate::layout::SearchPageLayout;
use crate::model::SessionState;
use crate::policy::QueryTimeouts;

/// How the gate waited for the table to settle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStrategy {
    /// Waited for the previously rendered first row to go stale
    Staleness,

    /// Applied the fixed refresh delay
    FixedDelay,
}

/// Readiness checks between submit and extraction
///
/// The first query that returns data re-renders the table when the page size
/// changes, so its readiness signal is the old first row going stale. Later
/// queries keep the page size and only get a short fixed delay.
pub struct ReadinessGate<'a> {
    session: &'a dyn BrowserSession,
    layout: &'a SearchPageLayout,
    timeouts: &'a QueryTimeouts,
}

impl<'a> ReadinessGate<'a> {
    pub fn new(
        session: &'a dyn BrowserSession,
        layout: &'a SearchPageLayout,
        timeouts: &'a QueryTimeouts,
    ) -> Self {
        Self {
            session,
            layout,
            timeouts,
        }
    }

    /// Block until the submit control disappears, then read the record count
    ///
    /// Returns `false` when the heading reads the empty-result text.
    pub async fn has_results(&self) -> Result<bool, QueryError> {
        self.session
            .wait_until_gone(
                &WaitCondition::ElementVisible(self.layout.submit_button.clone()),
                self.timeouts.wait,
            )
            .await?;

        let heading = self.session.find_element(&self.layout.record_count).await?;
        let text = self.session.read_text(heading).await?;
        debug!(record_count = %text, "search returned");
        Ok(text != self.layout.empty_record_count)
    }

    /// Row to watch for staleness, captured before the page size changes
    ///
    /// `None` once a query has already returned data.
    pub async fn capture_marker(
        &self,
        state: &SessionState,
    ) -> Result<Option<ElementHandle>, QueryError> {
        if !state.is_first_successful_query() {
            return Ok(None);
        }

        let outcome = self
            .session
            .wait_until(
                &WaitCondition::ElementPresent(self.layout.first_result_row.clone()),
                self.timeouts.wait,
            )
            .await?;
        Ok(outcome.element())
    }

    /// Wait until the refreshed table can be read; only call when results exist
    ///
    /// On the first successful query this waits for `marker` (or the current
    /// first row when no marker was captured) to go stale and then clears the
    /// first-success flag.
    pub async fn await_refresh(
        &self,
        state: &mut SessionState,
        marker: Option<ElementHandle>,
    ) -> Result<RefreshStrategy, QueryError> {
        if !state.is_first_successful_query() {
            sleep(self.timeouts.refresh_delay).await;
            return Ok(RefreshStrategy::FixedDelay);
        }

        let marker = match marker {
            Some(handle) => handle,
            None => {
                self.session
                    .find_element(&self.layout.first_result_row)
                    .await?
            }
        };

        self.session
            .wait_until(&WaitCondition::ElementStale(marker), self.timeouts.wait)
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    warn!(marker = %marker, "first result table was never replaced");
                }
                err
            })?;
        state.finish_first_success();
        debug!("first result table refreshed");
        Ok(RefreshStrategy::Staleness)
    }
}
