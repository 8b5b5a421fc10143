//! Error types for the query protocol

use browser_session::SessionError;
use thiserror::Error;

/// Fatal failures of a query or batch; none are retried internally
#[derive(Debug, Error, Clone)]
pub enum QueryError {
    /// Batch input lists disagree in length; raised before any browser interaction
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// A bounded wait ran past its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A result row is missing a cell or its value lacks the expected separator
    #[error("Unexpected result row shape: {0}")]
    ExtractionShape(String),

    /// A non-positive or non-finite value reached the geometric mean
    #[error("Data integrity violation: {0}")]
    AggregationDomain(String),

    /// Any other browser session fault
    #[error("Browser session error: {0}")]
    Session(SessionError),
}

impl From<SessionError> for QueryError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Timeout(detail) => QueryError::Timeout(detail),
            other => QueryError::Session(other),
        }
    }
}

impl QueryError {
    /// Short label used in logs and batch summaries
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Precondition(_) => "precondition",
            QueryError::Timeout(_) => "timeout",
            QueryError::ExtractionShape(_) => "extraction_shape",
            QueryError::AggregationDomain(_) => "aggregation_domain",
            QueryError::Session(_) => "session",
        }
    }
}
