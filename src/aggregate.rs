//! Aggregator
//!
//! Reduces one dispatch's results and records into summary statistics plus a
//! risk score and level. Pure: identical inputs always yield the identical
//! aggregate.

use crate::error::OsintError;
use crate::model::{
    AggregatedResult, NormalizedRecord, ProviderResult, Query, Statistics, Status,
};
use crate::risk;

/// Reduce a completed dispatch into an [`AggregatedResult`]
///
/// `found + not_found + errors` always equals `results.len()`; timeouts are
/// folded into `errors`. An out-of-range score would indicate a defect in the
/// scoring function itself, not a runtime condition, and is surfaced as
/// [`OsintError::Aggregation`].
pub fn aggregate(
    query: &Query,
    results: &[ProviderResult],
    records: Vec<NormalizedRecord>,
) -> Result<AggregatedResult, OsintError> {
    let mut statistics = Statistics::default();
    for result in results {
        match result.status {
            Status::Success => statistics.found += 1,
            Status::NotFound => statistics.not_found += 1,
            Status::Error | Status::Timeout => statistics.errors += 1,
        }
    }

    let risk_score = risk::score(query.kind, &records, query.submitted_at);
    if risk_score > 100 {
        return Err(OsintError::Aggregation(format!(
            "risk score {risk_score} outside 0..=100 for kind {}",
            query.kind
        )));
    }

    Ok(AggregatedResult {
        query: query.clone(),
        records,
        statistics,
        risk_score,
        risk_level: risk::level_for(risk_score),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QueryKind;
    use std::time::Duration;

    fn result(status: Status) -> ProviderResult {
        ProviderResult::new("p", status, Duration::from_millis(5))
    }

    #[test]
    fn test_statistics_partition_counts_every_provider() {
        let query = Query::new(QueryKind::Username, "whoever");
        let results: Vec<ProviderResult> = [
            vec![result(Status::Success); 12],
            vec![result(Status::NotFound); 5],
            vec![result(Status::Timeout); 2],
            vec![result(Status::Error); 1],
        ]
        .concat();

        let aggregated = aggregate(&query, &results, Vec::new()).unwrap();
        assert_eq!(aggregated.statistics.found, 12);
        assert_eq!(aggregated.statistics.not_found, 5);
        assert_eq!(aggregated.statistics.errors, 3);
        assert_eq!(aggregated.statistics.total(), results.len());
    }

    #[test]
    fn test_all_timeouts_is_a_valid_result() {
        let query = Query::new(QueryKind::Email, "a@b.com");
        let results = vec![result(Status::Timeout); 4];

        let aggregated = aggregate(&query, &results, Vec::new()).unwrap();
        assert_eq!(aggregated.statistics.found, 0);
        assert_eq!(aggregated.statistics.errors, 4);
        assert_eq!(aggregated.risk_score, 0);
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let query = Query::new(QueryKind::Email, "a@b.com");
        let results = vec![result(Status::Success); 2];
        let records = vec![NormalizedRecord::Breach {
            title: "Dropbox".to_string(),
            domain: "dropbox.com".to_string(),
            pwn_count: 68_000_000,
            data_classes: vec!["Passwords".to_string()],
            breach_date: "2012-07-01".to_string(),
            added_date: "2016-08-31".to_string(),
        }];

        let a = aggregate(&query, &results, records.clone()).unwrap();
        let b = aggregate(&query, &results, records).unwrap();
        assert_eq!(a.risk_score, b.risk_score);
        assert_eq!(a.risk_level, b.risk_level);
    }
}
