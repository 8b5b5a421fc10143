//! Query driver - runs one query through form, gate, extractor, and aggregator

use std::sync::Arc;

use browser_session::BrowserSession;
use tracing::{debug, info, instrument};

use crate::aggregate::summarize;
use crate::errors::QueryError;
use crate::extract::RecordExtractor;
use crate::form::FormController;
use crate::gate::ReadinessGate;
use crate::layout::SearchPageLayout;
use crate::model::{QueryCondition, QueryResult, SessionState};
use crate::policy::{EndpointMatch, QueryTimeouts};

/// Where a query currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPhase {
    Idle,
    FormLoading,
    Submitted,
    NoResults,
    AwaitingRefresh,
    Extracting,
    Done,
}

/// Runs queries one at a time against a single browser session
///
/// Session flags persist across [`run`](Self::run) calls; everything else is
/// rebuilt per query.
pub struct QueryDriver {
    session: Arc<dyn BrowserSession>,
    layout: SearchPageLayout,
    timeouts: QueryTimeouts,
    matching: EndpointMatch,
    state: SessionState,
    phase: QueryPhase,
}

impl QueryDriver {
    pub fn new(session: Arc<dyn BrowserSession>) -> Self {
        Self {
            session,
            layout: SearchPageLayout::default(),
            timeouts: QueryTimeouts::default(),
            matching: EndpointMatch::default(),
            state: SessionState::new(),
            phase: QueryPhase::Idle,
        }
    }

    pub fn with_layout(mut self, layout: SearchPageLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_timeouts(mut self, timeouts: QueryTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_endpoint_match(mut self, matching: EndpointMatch) -> Self {
        self.matching = matching;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Phase reached by the most recent query; the failing phase after an error
    pub fn phase(&self) -> QueryPhase {
        self.phase
    }

    /// Execute one query end to end
    #[instrument(
        skip_all,
        fields(
            species = condition.species(),
            chemical = condition.chemical(),
            endpoint = condition.endpoint(),
            duration_days = condition.duration_days()
        )
    )]
    pub async fn run(&mut self, condition: &QueryCondition) -> Result<QueryResult, QueryError> {
        enter(&mut self.phase, QueryPhase::Idle);

        let session = self.session.as_ref();
        let form = FormController::new(session, &self.layout, &self.timeouts);
        let gate = ReadinessGate::new(session, &self.layout, &self.timeouts);

        enter(&mut self.phase, QueryPhase::FormLoading);
        form.set_chemical(condition.chemical()).await?;
        form.set_endpoint_filter(&self.state).await?;
        form.set_species(condition.species()).await?;
        form.submit().await?;
        enter(&mut self.phase, QueryPhase::Submitted);

        let result = if gate.has_results().await? {
            let marker = gate.capture_marker(&self.state).await?;
            form.set_page_size(&self.state).await?;

            enter(&mut self.phase, QueryPhase::AwaitingRefresh);
            let strategy = gate.await_refresh(&mut self.state, marker).await?;
            debug!(strategy = ?strategy, "result table ready");

            enter(&mut self.phase, QueryPhase::Extracting);
            let extractor =
                RecordExtractor::new(session, &self.layout, &self.timeouts, self.matching);
            let accepted = extractor.extract(condition).await?;
            let summary = summarize(&accepted)?;
            QueryResult::new(accepted, summary)
        } else {
            enter(&mut self.phase, QueryPhase::NoResults);
            QueryResult::empty()
        };

        if self.state.finish_first_query() {
            debug!("first query of the session completed");
        }
        enter(&mut self.phase, QueryPhase::Done);

        info!(
            summary = %result.summary,
            accepted = result.accepted_values.len(),
            "query completed"
        );
        Ok(result)
    }
}

fn enter(phase: &mut QueryPhase, next: QueryPhase) {
    debug!(from = ?*phase, to = ?next, "query phase");
    *phase = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EcotoxSite, SiteResponse, SiteRow};
    use browser_session::fake::Interaction;
    use std::time::Duration;

    fn quick_timeouts() -> QueryTimeouts {
        QueryTimeouts {
            wait: Duration::from_millis(300),
            input_settle: Duration::ZERO,
            panel_animation: Duration::ZERO,
            refresh_delay: Duration::ZERO,
        }
    }

    fn driver_for(site: &EcotoxSite) -> QueryDriver {
        QueryDriver::new(site.session()).with_timeouts(quick_timeouts())
    }

    fn lepomis_ddt() -> QueryCondition {
        QueryCondition::new("DDT", "Lepomis", "LC50", 4)
    }

    #[tokio::test]
    async fn censored_rows_are_dropped() {
        let site = EcotoxSite::new(vec![SiteResponse::Rows(vec![
            SiteRow::new("LC50", "4 Day(s)", "1.2 mg/L (Lab)"),
            SiteRow::new("LC50", "4 Day(s)", "> 5 mg/L (Lab)"),
        ])]);
        let mut driver = driver_for(&site);

        let result = driver.run(&lepomis_ddt()).await.unwrap();
        assert_eq!(result.accepted_values, vec![1.2]);
        assert_eq!(result.summary, "1.20000");
        assert_eq!(driver.phase(), QueryPhase::Done);
    }

    #[tokio::test]
    async fn two_exact_values_are_averaged_geometrically() {
        let site = EcotoxSite::new(vec![SiteResponse::Rows(vec![
            SiteRow::new("LC50", "4 Day(s)", "1.2 mg/L (Lab)"),
            SiteRow::new("LC50", "4 Day(s)", "3.0 mg/L (Lab)"),
        ])]);
        let mut driver = driver_for(&site);

        let result = driver.run(&lepomis_ddt()).await.unwrap();
        assert_eq!(result.accepted_values, vec![1.2, 3.0]);
        assert_eq!(result.summary, "1.89737");
    }

    #[tokio::test]
    async fn empty_search_skips_extraction() {
        let site = EcotoxSite::new(vec![SiteResponse::Empty]);
        let mut driver = driver_for(&site);

        let result = driver.run(&lepomis_ddt()).await.unwrap();
        assert_eq!(result, QueryResult::empty());
        assert!(driver.state().is_first_successful_query());
        assert!(!driver.state().is_first_query());
        assert_eq!(driver.phase(), QueryPhase::Done);
        let journal = site.journal();
        assert!(!journal
            .iter()
            .any(|i| matches!(i, Interaction::Select { .. })));
        assert!(journal.contains(&Interaction::Read("record-count".into())));
        assert!(!journal
            .iter()
            .any(|i| matches!(i, Interaction::Read(label) if label == "result-cell")));
    }

    #[tokio::test]
    async fn rows_are_read_only_when_results_exist() {
        let site = EcotoxSite::new(vec![SiteResponse::Rows(vec![SiteRow::new(
            "LC50",
            "4 Day(s)",
            "AI\n3 mg/L",
        )])]);
        let mut driver = driver_for(&site);
        driver.run(&lepomis_ddt()).await.unwrap();

        let cell_reads = site
            .journal()
            .iter()
            .filter(|i| matches!(i, Interaction::Read(label) if label == "result-cell"))
            .count();
        assert_eq!(cell_reads, 3);
    }

    #[tokio::test]
    async fn stalled_table_refresh_times_out() {
        let site = EcotoxSite::new(vec![SiteResponse::Rows(vec![SiteRow::new(
            "LC50",
            "4 Day(s)",
            "AI\n3 mg/L",
        )])]);
        site.freeze_table();
        let mut driver = driver_for(&site);

        let err = driver.run(&lepomis_ddt()).await.unwrap_err();
        assert!(matches!(err, QueryError::Timeout(_)));
        assert_eq!(driver.phase(), QueryPhase::AwaitingRefresh);
        assert!(driver.state().is_first_successful_query());
    }

    #[tokio::test]
    async fn other_units_are_rejected() {
        let site = EcotoxSite::new(vec![SiteResponse::Rows(vec![
            SiteRow::new("LC50", "4 Day(s)", "AI\n1.2 mg/L (Lab)"),
            SiteRow::new("LC50", "4 Day(s)", "AI\n9.9 mg/kg (Lab)"),
        ])]);
        let mut driver = driver_for(&site);

        let result = driver.run(&lepomis_ddt()).await.unwrap();
        assert_eq!(result.accepted_values, vec![1.2]);
    }

    #[tokio::test]
    async fn one_time_setup_runs_only_once() {
        let rows = vec![SiteRow::new("LC50", "4 Day(s)", "AI\n2 mg/L")];
        let site = EcotoxSite::new(vec![
            SiteResponse::Rows(rows.clone()),
            SiteResponse::Rows(rows),
        ]);
        let mut driver = driver_for(&site);

        driver.run(&lepomis_ddt()).await.unwrap();
        assert!(!driver.state().is_first_query());
        assert!(!driver.state().is_first_successful_query());

        let second = QueryCondition::new("heptachlor", "Lepomis", "LC50", 4);
        let result = driver.run(&second).await.unwrap();
        assert_eq!(result.summary, "2.00000");

        let journal = site.journal();
        let endpoint_clicks = journal
            .iter()
            .filter(|i| matches!(i, Interaction::Click(label) if label.starts_with("endpoint-")))
            .count();
        assert_eq!(endpoint_clicks, 2);
        let page_size_changes = journal
            .iter()
            .filter(|i| matches!(i, Interaction::Select { value, .. } if value == "100"))
            .count();
        assert_eq!(page_size_changes, 1);
    }

    #[tokio::test]
    async fn page_size_waits_for_first_query_with_data() {
        let rows = vec![SiteRow::new("LC50", "4 Day(s)", "AI\n4 mg/L")];
        let site = EcotoxSite::new(vec![SiteResponse::Empty, SiteResponse::Rows(rows)]);
        let mut driver = driver_for(&site);

        driver.run(&lepomis_ddt()).await.unwrap();
        assert!(driver.state().is_first_successful_query());

        let result = driver.run(&lepomis_ddt()).await.unwrap();
        assert_eq!(result.accepted_values, vec![4.0]);
        assert!(!driver.state().is_first_successful_query());
        assert!(site
            .journal()
            .contains(&Interaction::Select {
                label: "page-size".into(),
                value: "100".into()
            }));
    }

    #[tokio::test]
    async fn rows_beyond_the_default_page_are_read_after_resize() {
        let rows: Vec<SiteRow> = (1..=40)
            .map(|n| SiteRow::new("LC50", "4 Day(s)", format!("AI\n{} mg/L", n)))
            .collect();
        let site = EcotoxSite::new(vec![SiteResponse::Rows(rows)]);
        let mut driver = driver_for(&site);

        let result = driver.run(&lepomis_ddt()).await.unwrap();
        assert_eq!(result.accepted_values.len(), 40);
        assert_eq!(result.accepted_values[39], 40.0);
    }

    #[tokio::test]
    async fn form_steps_follow_the_fixed_order() {
        let site = EcotoxSite::new(vec![SiteResponse::Empty]);
        let mut driver = driver_for(&site);
        driver.run(&lepomis_ddt()).await.unwrap();

        let clicks: Vec<String> = site
            .journal()
            .into_iter()
            .filter_map(|i| match i {
                Interaction::Click(label) => Some(label),
                _ => None,
            })
            .collect();
        assert_eq!(
            clicks,
            vec![
                "chemicals-panel",
                "endpoints-panel",
                "endpoint-lc50",
                "endpoint-ec50",
                "species-panel",
                "submit",
            ]
        );
        assert_eq!(
            site.typed_inputs(),
            ("DDT".to_string(), "Lepomis".to_string())
        );
        assert!(site.journal().contains(&Interaction::Type {
            label: "chemical-input".into(),
            text: "DDT".into()
        }));
        assert!(site.journal().contains(&Interaction::Type {
            label: "species-input".into(),
            text: "Lepomis".into()
        }));
    }

    #[tokio::test]
    async fn hung_search_times_out() {
        let site = EcotoxSite::new(vec![SiteResponse::Hang]);
        let mut driver = driver_for(&site);

        let err = driver.run(&lepomis_ddt()).await.unwrap_err();
        assert!(matches!(err, QueryError::Timeout(_)));
        assert_eq!(driver.phase(), QueryPhase::Submitted);
        assert!(driver.state().is_first_query());
    }

    #[tokio::test]
    async fn truncated_rows_abort_extraction() {
        let site = EcotoxSite::new(vec![SiteResponse::Truncated(vec![SiteRow::new(
            "LC50",
            "4 Day(s)",
            "AI\n1 mg/L",
        )])]);
        let mut driver = driver_for(&site);

        let err = driver.run(&lepomis_ddt()).await.unwrap_err();
        assert!(matches!(err, QueryError::ExtractionShape(_)));
        assert_eq!(driver.phase(), QueryPhase::Extracting);
    }

    #[tokio::test]
    async fn exact_matching_filters_other_endpoints() {
        let site = EcotoxSite::new(vec![SiteResponse::Rows(vec![
            SiteRow::new("LC50", "4 Day(s)", "AI\n2 mg/L"),
            SiteRow::new("EC50", "4 Day(s)", "AI\n8 mg/L"),
        ])]);
        let mut driver = driver_for(&site).with_endpoint_match(EndpointMatch::Exact);

        let result = driver.run(&lepomis_ddt()).await.unwrap();
        assert_eq!(result.accepted_values, vec![2.0]);

        let literal_site = EcotoxSite::new(vec![SiteResponse::Rows(vec![
            SiteRow::new("LC50", "4 Day(s)", "AI\n2 mg/L"),
            SiteRow::new("EC50", "4 Day(s)", "AI\n8 mg/L"),
        ])]);
        let mut literal = driver_for(&literal_site);
        let result = literal.run(&lepomis_ddt()).await.unwrap();
        assert_eq!(result.accepted_values, vec![2.0, 8.0]);
        assert_eq!(result.summary, "4.00000");
    }
}
