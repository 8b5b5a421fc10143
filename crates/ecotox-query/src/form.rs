//! Form controller - loads one query into the search form and submits it

use browser_session::{BrowserSession, Locator, SessionError, WaitCondition};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::errors::QueryError;
use crate::layout::SearchPageLayout;
use crate::model::SessionState;
use crate::policy::QueryTimeouts;

/// Drives the search form into the state representing one query
///
/// One-time steps take the session flags by reference and are no-ops once
/// their flag has been cleared.
pub struct FormController<'a> {
    session: &'a dyn BrowserSession,
    layout: &'a SearchPageLayout,
    timeouts: &'a QueryTimeouts,
}

impl<'a> FormController<'a> {
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

    /// Open the chemical panel and replace its text with `name`
    pub async fn set_chemical(&self, name: &str) -> Result<(), QueryError> {
        debug!(chemical = name, "setting chemical");
        self.fill_panel(
            &self.layout.chemicals_button,
            self.layout.chemical_input_index,
            name,
        )
        .await
    }

    /// Open the species panel and replace its text with `name`
    pub async fn set_species(&self, name: &str) -> Result<(), QueryError> {
        debug!(species = name, "setting species");
        self.fill_panel(
            &self.layout.species_button,
            self.layout.species_input_index,
            name,
        )
        .await
    }

    /// Tick the LC50 and EC50 result groups; only while no query has completed
    ///
    /// Returns whether the filter was applied by this call.
    pub async fn set_endpoint_filter(&self, state: &SessionState) -> Result<bool, QueryError> {
        if !state.is_first_query() {
            return Ok(false);
        }

        let button = self.session.find_element(&self.layout.endpoints_button).await?;
        self.session.click(button).await?;
        sleep(self.timeouts.panel_animation).await;

        for label in &self.layout.endpoint_labels {
            let checkbox = self.session.find_element(label).await?;
            self.session.click(checkbox).await?;
        }

        info!(
            groups = self.layout.endpoint_labels.len(),
            "endpoint filter applied for this run"
        );
        Ok(true)
    }

    /// Wait for the submit control to be visible, then activate it
    pub async fn submit(&self) -> Result<(), QueryError> {
        let outcome = self
            .session
            .wait_until(
                &WaitCondition::ElementVisible(self.layout.submit_button.clone()),
                self.timeouts.wait,
            )
            .await?;
        let button = outcome.element().ok_or_else(|| {
            SessionError::Internal("visibility wait returned no element".to_string())
        })?;
        self.session.click(button).await?;
        debug!("search submitted");
        Ok(())
    }

    /// Show `page_size` rows per page; only until a query has returned data
    ///
    /// Returns whether the page size was changed by this call.
    pub async fn set_page_size(&self, state: &SessionState) -> Result<bool, QueryError> {
        if !state.is_first_successful_query() {
            return Ok(false);
        }

        let outcome = self
            .session
            .wait_until(
                &WaitCondition::ElementPresent(self.layout.page_size_select.clone()),
                self.timeouts.wait,
            )
            .await?;
        let select = outcome.element().ok_or_else(|| {
            SessionError::Internal("presence wait returned no element".to_string())
        })?;
        self.session
            .select_option(select, &self.layout.page_size.to_string())
            .await?;

        info!(page_size = self.layout.page_size, "result page size set");
        Ok(true)
    }

    async fn fill_panel(
        &self,
        button: &Locator,
        input_index: usize,
        text: &str,
    ) -> Result<(), QueryError> {
        let button = self.session.find_element(button).await?;
        self.session.click(button).await?;

        let inputs = self.session.find_elements(&self.layout.text_inputs).await?;
        let input = inputs.get(input_index).copied().ok_or_else(|| {
            SessionError::ElementNotFound(format!(
                "{} #{} (found {})",
                self.layout.text_inputs,
                input_index,
                inputs.len()
            ))
        })?;

        self.session.clear(input).await?;
        self.session.type_text(input, text).await?;
        sleep(self.timeouts.input_settle).await;
        Ok(())
    }
}
