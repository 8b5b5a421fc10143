//! Batch runner - every (species, chemical) pair through one driver

use anyhow::{Context, Result};
use ecotox_query::{BatchInput, QueryDriver, QueryError};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::output::ResultLogs;

/// Counts reported when a batch completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub queries: usize,
    /// Queries that accepted no values and logged `0.00000`
    pub empty_queries: usize,
}

/// A validated batch, ready to run
#[derive(Debug)]
pub struct BatchRunner<'a> {
    input: &'a BatchInput,
    run_id: Uuid,
}

impl<'a> BatchRunner<'a> {
    /// Fails with [`QueryError::Precondition`] on mismatched list lengths
    pub fn new(input: &'a BatchInput) -> Result<Self, QueryError> {
        input.check()?;
        Ok(Self {
            input,
            run_id: Uuid::new_v4(),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Run every query in order, logging each before the next starts
    ///
    /// The first failure aborts the batch; lines already written stay.
    pub async fn run(&self, driver: &mut QueryDriver, logs: &mut ResultLogs) -> Result<BatchSummary> {
        let span = info_span!("batch", run_id = %self.run_id);
        self.run_queries(driver, logs).instrument(span).await
    }

    async fn run_queries(
        &self,
        driver: &mut QueryDriver,
        logs: &mut ResultLogs,
    ) -> Result<BatchSummary> {
        let total = self.input.query_count();
        info!(queries = total, "batch started");

        let mut summary = BatchSummary {
            run_id: self.run_id,
            queries: 0,
            empty_queries: 0,
        };

        for (index, planned) in self.input.conditions().enumerate() {
            let condition = &planned.condition;
            let result = match driver.run(condition).await {
                Ok(result) => result,
                Err(err) => {
                    error!(
                        kind = err.kind(),
                        phase = ?driver.phase(),
                        completed = summary.queries,
                        "batch aborted: {}",
                        err
                    );
                    return Err(err).with_context(|| {
                        format!(
                            "query {}/{} failed ({})",
                            index + 1,
                            total,
                            condition.log_prefix().replace('\t', " ")
                        )
                    });
                }
            };

            logs.record(&planned, &result).await?;
            summary.queries += 1;
            if result.is_empty() {
                summary.empty_queries += 1;
            }
        }

        info!(
            queries = summary.queries,
            empty_queries = summary.empty_queries,
            "batch completed"
        );
        Ok(summary)
    }
}
