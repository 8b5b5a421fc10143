//! Aggregator - reduces accepted values to the reported summary string

use tracing::error;

use crate::errors::QueryError;

/// Summary reported when no value was accepted
pub const EMPTY_SUMMARY: &str = "0.00000";

/// `exp(mean(ln(x)))`, or `None` for an empty slice
///
/// Every value must be finite and strictly positive.
pub fn geometric_mean(values: &[f64]) -> Result<Option<f64>, QueryError> {
    if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v <= 0.0) {
        error!(value = *bad, "non-positive concentration reached aggregation");
        return Err(QueryError::AggregationDomain(format!(
            "geometric mean is undefined for {}",
            bad
        )));
    }

    Ok(match values {
        [] => None,
        // exp(ln(v)) can drift by an ulp
        [single] => Some(*single),
        _ => {
            let log_sum: f64 = values.iter().map(|v| v.ln()).sum();
            Some((log_sum / values.len() as f64).exp())
        }
    })
}

/// Fixed 5-decimal rendering used for every summary
pub fn format_summary(value: f64) -> String {
    format!("{:.5}", value)
}

/// Summary string for a query's accepted values
pub fn summarize(values: &[f64]) -> Result<String, QueryError> {
    Ok(geometric_mean(values)?
        .map(format_summary)
        .unwrap_or_else(|| EMPTY_SUMMARY.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_reports_literal_zero() {
        assert_eq!(summarize(&[]).unwrap(), "0.00000");
    }

    #[test]
    fn single_value_is_its_own_mean() {
        assert_eq!(summarize(&[1.2]).unwrap(), "1.20000");
        assert_eq!(summarize(&[0.0305]).unwrap(), format_summary(0.0305));
    }

    #[test]
    fn two_values_use_the_geometric_mean() {
        assert_eq!(summarize(&[1.2, 3.0]).unwrap(), "1.89737");
    }

    #[test]
    fn order_does_not_change_the_summary() {
        let forward = summarize(&[0.5, 12.0, 3.3, 47.0]).unwrap();
        let reversed = summarize(&[47.0, 3.3, 12.0, 0.5]).unwrap();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn non_positive_values_are_integrity_violations() {
        assert!(matches!(
            summarize(&[1.0, 0.0]),
            Err(QueryError::AggregationDomain(_))
        ));
        assert!(matches!(
            geometric_mean(&[-2.0]),
            Err(QueryError::AggregationDomain(_))
        ));
        assert!(matches!(
            geometric_mean(&[f64::NAN]),
            Err(QueryError::AggregationDomain(_))
        ));
    }
}
