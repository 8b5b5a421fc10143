//! Wait budgets and row-matching policy

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds and settle delays applied while driving the search page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTimeouts {
    /// Upper bound for every wait (submit visibility, table presence, staleness)
    pub wait: Duration,

    /// Pause after typing so client-side validation and autocomplete can finish
    pub input_settle: Duration,

    /// Pause after opening the endpoint panel while it animates in
    pub panel_animation: Duration,

    /// Fixed wait before reading a refreshed table after the first successful query
    pub refresh_delay: Duration,
}

impl Default for QueryTimeouts {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(10),
            input_settle: Duration::from_secs(1),
            panel_animation: Duration::from_secs(1),
            refresh_delay: Duration::from_secs(1),
        }
    }
}

/// How the endpoint column of a result row is compared to the query endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointMatch {
    /// Every row passes; endpoint filtering relies on the LC50/EC50 checkboxes.
    /// This reproduces the historical row filter, whose wildcard clause is always true.
    // TODO: switch the default to `Exact` once the data owner confirms row-level filtering is wanted.
    #[default]
    Literal,

    /// Label equals the endpoint, or the endpoint followed by `*`
    Exact,
}

impl EndpointMatch {
    pub fn matches(self, label: &str, endpoint: &str) -> bool {
        match self {
            EndpointMatch::Literal => true,
            EndpointMatch::Exact => {
                label == endpoint
                    || label
                        .strip_prefix(endpoint)
                        .map(|rest| rest == "*")
                        .unwrap_or(false)
            }
        }
    }
}
