//! Record extractor - turns the rendered result table into accepted values

use browser_session::{BrowserSession, SessionError, WaitCondition};
use tracing::{debug, trace};

use crate::errors::QueryError;
use crate::layout::SearchPageLayout;
use crate::model::{QueryCondition, RawRecord};
use crate::policy::{EndpointMatch, QueryTimeouts};

/// Only values reported in this unit are kept
pub const ACCEPTED_UNIT: &str = "mg/L";

/// Apply the inclusion rule to one record
///
/// A record is accepted when its endpoint matches under `matching`, its
/// duration label equals the query's, its candidate value starts with a
/// decimal digit (censored `>`/`~` values do not), and it is reported in mg/L.
/// The accepted value is the numeric prefix up to the first space.
///
/// Clauses are evaluated in that order; a record that reaches the value checks
/// with an empty value, no space separator, or a non-numeric prefix is a shape
/// error rather than a rejection.
pub fn accept_record(
    record: &RawRecord,
    condition: &QueryCondition,
    matching: EndpointMatch,
) -> Result<Option<f64>, QueryError> {
    if !matching.matches(&record.endpoint, condition.endpoint()) {
        return Ok(None);
    }
    if record.duration != condition.duration_label() {
        return Ok(None);
    }

    let candidate = record.candidate_value();
    let first = candidate.chars().next().ok_or_else(|| {
        QueryError::ExtractionShape(format!(
            "empty value cell for {} / {}",
            record.endpoint, record.duration
        ))
    })?;
    if !first.is_ascii_digit() {
        return Ok(None);
    }
    if !candidate.contains(ACCEPTED_UNIT) {
        return Ok(None);
    }

    let end = candidate.find(' ').ok_or_else(|| {
        QueryError::ExtractionShape(format!("value '{}' has no space separator", candidate))
    })?;
    let number = &candidate[..end];
    number.parse::<f64>().map(Some).map_err(|_| {
        QueryError::ExtractionShape(format!("value prefix '{}' is not a number", number))
    })
}

/// Reads the result table for one query
pub struct RecordExtractor<'a> {
    session: &'a dyn BrowserSession,
    layout: &'a SearchPageLayout,
    timeouts: &'a QueryTimeouts,
    matching: EndpointMatch,
}

impl<'a> RecordExtractor<'a> {
    pub fn new(
        session: &'a dyn BrowserSession,
        layout: &'a SearchPageLayout,
        timeouts: &'a QueryTimeouts,
        matching: EndpointMatch,
    ) -> Self {
        Self {
            session,
            layout,
            timeouts,
            matching,
        }
    }

    /// The relevant cells of every rendered row, in document order
    pub async fn read_records(&self) -> Result<Vec<RawRecord>, QueryError> {
        let body = self
            .session
            .wait_until(
                &WaitCondition::ElementPresent(self.layout.results_body.clone()),
                self.timeouts.wait,
            )
            .await?
            .element()
            .ok_or_else(|| {
                SessionError::Internal("presence wait returned no element".to_string())
            })?;

        let rows = self
            .session
            .find_elements_within(body, &self.layout.result_row)
            .await?;
        let required = self.layout.required_cells();
        let mut records = Vec::with_capacity(rows.len());

        for (index, row) in rows.into_iter().enumerate() {
            let cells = self
                .session
                .find_elements_within(row, &self.layout.result_cell)
                .await?;
            if cells.len() < required {
                return Err(QueryError::ExtractionShape(format!(
                    "row {} has {} cells, expected at least {}",
                    index,
                    cells.len(),
                    required
                )));
            }

            let record = RawRecord::new(
                self.session
                    .read_text(cells[self.layout.endpoint_column])
                    .await?,
                self.session
                    .read_text(cells[self.layout.duration_column])
                    .await?,
                self.session.read_text(cells[self.layout.value_column]).await?,
            );
            trace!(row = index, record = ?record, "read result row");
            records.push(record);
        }

        Ok(records)
    }

    /// Accepted concentrations for `condition`, in row order
    pub async fn extract(&self, condition: &QueryCondition) -> Result<Vec<f64>, QueryError> {
        let records = self.read_records().await?;
        let mut accepted = Vec::new();
        for record in &records {
            if let Some(value) = accept_record(record, condition, self.matching)? {
                accepted.push(value);
            }
        }
        debug!(
            rows = records.len(),
            accepted = accepted.len(),
            "result table extracted"
        );
        Ok(accepted)
    }
}
