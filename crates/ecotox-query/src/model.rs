//! Core data types for the query protocol

use crate::errors::QueryError;
use crate::aggregate::EMPTY_SUMMARY;
use serde::{Deserialize, Serialize};

/// One (chemical, species, endpoint, duration) search tuple
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCondition {
    chemical: String,
    species: String,
    endpoint: String,
    duration_days: u32,
}

impl QueryCondition {
    pub fn new(
        chemical: impl Into<String>,
        species: impl Into<String>,
        endpoint: impl Into<String>,
        duration_days: u32,
    ) -> Self {
        Self {
            chemical: chemical.into(),
            species: species.into(),
            endpoint: endpoint.into(),
            duration_days,
        }
    }

    pub fn chemical(&self) -> &str {
        &self.chemical
    }

    pub fn species(&self) -> &str {
        &self.species
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn duration_days(&self) -> u32 {
        self.duration_days
    }

    /// Duration as the result table renders it, e.g. `4 Day(s)`
    pub fn duration_label(&self) -> String {
        format!("{} Day(s)", self.duration_days)
    }

    /// Leading columns of a detail log line
    pub fn log_prefix(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}_Day(s)",
            self.species, self.chemical, self.endpoint, self.duration_days
        )
    }
}

/// The three cells of a rendered result row the inclusion rule looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Reported endpoint label, e.g. `LC50`
    pub endpoint: String,

    /// Reported duration label, e.g. `4 Day(s)`
    pub duration: String,

    /// Compound cell: a metadata line, then "value unit source..."
    pub value_cell: String,
}

impl RawRecord {
    pub fn new(
        endpoint: impl Into<String>,
        duration: impl Into<String>,
        value_cell: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            duration: duration.into(),
            value_cell: value_cell.into(),
        }
    }

    /// Text after the first line break of the value cell; the whole cell when it has none
    pub fn candidate_value(&self) -> &str {
        match self.value_cell.find('\n') {
            Some(pos) => &self.value_cell[pos + 1..],
            None => &self.value_cell,
        }
    }
}

/// Outcome of one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Accepted concentrations in mg/L, in table row order
    pub accepted_values: Vec<f64>,

    /// Geometric mean to 5 decimal places, `0.00000` when nothing was accepted
    pub summary: String,
}

impl QueryResult {
    pub fn new(accepted_values: Vec<f64>, summary: String) -> Self {
        Self {
            accepted_values,
            summary,
        }
    }

    /// Result of a query with no accepted rows
    pub fn empty() -> Self {
        Self::new(Vec::new(), EMPTY_SUMMARY.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.accepted_values.is_empty()
    }
}

/// Session-scoped flags controlling one-time setup and the readiness strategy
///
/// Both start `true` and can only ever be cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    first_query: bool,
    first_successful_query: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            first_query: true,
            first_successful_query: true,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// No query has completed yet in this session
    pub fn is_first_query(&self) -> bool {
        self.first_query
    }

    /// No query has returned data yet in this session
    pub fn is_first_successful_query(&self) -> bool {
        self.first_successful_query
    }

    /// Clear `first_query`; returns whether this call flipped it
    pub fn finish_first_query(&mut self) -> bool {
        std::mem::replace(&mut self.first_query, false)
    }

    /// Clear `first_successful_query`; returns whether this call flipped it
    pub fn finish_first_success(&mut self) -> bool {
        std::mem::replace(&mut self.first_successful_query, false)
    }
}

/// The four parallel batch input lists
///
/// Every chemical is tried against every species; `endpoints[i]` and
/// `durations[i]` belong to `species[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInput {
    pub chemicals: Vec<String>,
    pub species: Vec<String>,
    pub endpoints: Vec<String>,
    pub durations: Vec<u32>,
}

/// A query scheduled by [`BatchInput::conditions`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedQuery {
    pub condition: QueryCondition,

    /// Last chemical for this species; the result matrix row ends after it
    pub closes_species_row: bool,
}

impl BatchInput {
    /// Verify `len(species) == len(endpoints) == len(durations)`
    pub fn check(&self) -> Result<(), QueryError> {
        let species = self.species.len();
        if species != self.endpoints.len() || species != self.durations.len() {
            return Err(QueryError::Precondition(format!(
                "species, endpoints, and durations must be equal length (got {}, {}, {})",
                species,
                self.endpoints.len(),
                self.durations.len()
            )));
        }
        Ok(())
    }

    pub fn query_count(&self) -> usize {
        self.species.len() * self.chemicals.len()
    }

    /// Species-major, chemical-minor query order; call after [`check`](Self::check)
    pub fn conditions(&self) -> impl Iterator<Item = PlannedQuery> + '_ {
        let last_chemical = self.chemicals.len().saturating_sub(1);
        self.species
            .iter()
            .zip(self.endpoints.iter())
            .zip(self.durations.iter())
            .flat_map(move |((species, endpoint), duration)| {
                self.chemicals
                    .iter()
                    .enumerate()
                    .map(move |(index, chemical)| PlannedQuery {
                        condition: QueryCondition::new(
                            chemical.as_str(),
                            species.as_str(),
                            endpoint.as_str(),
                            *duration,
                        ),
                        closes_species_row: index == last_chemical,
                    })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> BatchInput {
        BatchInput {
            chemicals: vec!["DDT".into(), "hexachlorobenzene".into(), "heptachlor".into()],
            species: vec!["Lepomis".into(), "Bufo".into()],
            endpoints: vec!["LC50".into(), "LC50".into()],
            durations: vec![4, 1],
        }
    }

    #[test]
    fn condition_formats_duration_and_log_prefix() {
        let condition = QueryCondition::new("DDT", "Lepomis", "LC50", 4);
        assert_eq!(condition.duration_label(), "4 Day(s)");
        assert_eq!(condition.log_prefix(), "Lepomis\tDDT\tLC50\t4_Day(s)");
    }

    #[test]
    fn candidate_value_skips_the_metadata_line() {
        let record = RawRecord::new("LC50", "4 Day(s)", "AI\n1.2 mg/L (Lab)");
        assert_eq!(record.candidate_value(), "1.2 mg/L (Lab)");

        let single_line = RawRecord::new("LC50", "4 Day(s)", "1.2 mg/L");
        assert_eq!(single_line.candidate_value(), "1.2 mg/L");

        let two_breaks = RawRecord::new("LC50", "4 Day(s)", "AI\n3 mg/L\nnote");
        assert_eq!(two_breaks.candidate_value(), "3 mg/L\nnote");
    }

    #[test]
    fn session_flags_flip_exactly_once() {
        let mut state = SessionState::new();
        assert!(state.is_first_query());
        assert!(state.is_first_successful_query());

        assert!(state.finish_first_query());
        assert!(!state.finish_first_query());
        assert!(!state.is_first_query());
        assert!(state.is_first_successful_query());

        assert!(state.finish_first_success());
        assert!(!state.finish_first_success());
        assert!(!state.is_first_successful_query());
    }

    #[test]
    fn check_accepts_parallel_lists() {
        assert!(sample_input().check().is_ok());
    }

    #[test]
    fn check_rejects_mismatched_endpoints() {
        let mut input = sample_input();
        input.endpoints.pop();
        assert!(matches!(input.check(), Err(QueryError::Precondition(_))));
    }

    #[test]
    fn check_rejects_mismatched_durations() {
        let mut input = sample_input();
        input.durations.push(2);
        assert!(matches!(input.check(), Err(QueryError::Precondition(_))));
    }

    #[test]
    fn chemical_list_is_sized_independently() {
        let mut input = sample_input();
        input.chemicals.truncate(1);
        assert!(input.check().is_ok());
        assert_eq!(input.query_count(), 2);
    }

    #[test]
    fn conditions_iterate_species_major() {
        let input = sample_input();
        let planned: Vec<PlannedQuery> = input.conditions().collect();
        assert_eq!(planned.len(), 6);

        let order: Vec<(&str, &str)> = planned
            .iter()
            .map(|p| (p.condition.species(), p.condition.chemical()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("Lepomis", "DDT"),
                ("Lepomis", "hexachlorobenzene"),
                ("Lepomis", "heptachlor"),
                ("Bufo", "DDT"),
                ("Bufo", "hexachlorobenzene"),
                ("Bufo", "heptachlor"),
            ]
        );

        let closes: Vec<bool> = planned.iter().map(|p| p.closes_species_row).collect();
        assert_eq!(closes, vec![false, false, true, false, false, true]);
        assert_eq!(planned[3].condition.duration_days(), 1);
    }
}
