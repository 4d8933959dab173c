//! Score aggregation across a cohort.
//!
//! This module reduces the per-category values of a cohort into a single
//! summary value per category, optionally partitioned by an attribute.

use crate::models::{
    AggregateResult, GroupedAggregateResult, Response, ScoreCategory, UNKNOWN_BUCKET,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Reduction applied to the present values of a category.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum AggregationKind {
    #[default]
    Average,
    Sum,
    Count,
    Min,
    Max,
    Median,
    Mode,
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregationKind::Average => "average",
            AggregationKind::Sum => "sum",
            AggregationKind::Count => "count",
            AggregationKind::Min => "min",
            AggregationKind::Max => "max",
            AggregationKind::Median => "median",
            AggregationKind::Mode => "mode",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for AggregationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "average" | "avg" | "mean" => Ok(AggregationKind::Average),
            "sum" => Ok(AggregationKind::Sum),
            "count" => Ok(AggregationKind::Count),
            "min" => Ok(AggregationKind::Min),
            "max" => Ok(AggregationKind::Max),
            "median" => Ok(AggregationKind::Median),
            "mode" => Ok(AggregationKind::Mode),
            other => Err(format!("unknown aggregation: {}", other)),
        }
    }
}

impl AggregationKind {
    /// Reduce a non-empty set of values. Returns `None` for an empty set.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }

        let result = match self {
            AggregationKind::Average => values.iter().sum::<f64>() / values.len() as f64,
            AggregationKind::Sum => values.iter().sum(),
            AggregationKind::Count => values.len() as f64,
            AggregationKind::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            AggregationKind::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            AggregationKind::Median => median(values),
            AggregationKind::Mode => mode(values),
        };

        Some(result)
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

fn median(values: &[f64]) -> f64 {
    let sorted = sorted(values);
    let len = sorted.len();
    if len % 2 == 0 {
        let mid = len / 2;
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[len / 2]
    }
}

/// Most frequent value; ties go to the smallest value.
fn mode(values: &[f64]) -> f64 {
    let sorted = sorted(values);

    let mut best = sorted[0];
    let mut best_run = 0;
    let mut i = 0;
    while i < sorted.len() {
        let value = sorted[i];
        let mut run = 1;
        while i + run < sorted.len() && sorted[i + run] == value {
            run += 1;
        }
        // Strict comparison keeps the earlier (smaller) value on ties.
        if run > best_run {
            best = value;
            best_run = run;
        }
        i += run;
    }

    best
}

/// Collect the present values of one category across a cohort.
pub fn present_values(cohort: &[Response], category: ScoreCategory) -> Vec<f64> {
    cohort
        .iter()
        .filter_map(|response| response.score(category))
        .collect()
}

/// Aggregate each category over the cohort.
///
/// Categories with no present values are omitted from the result.
pub fn aggregate(
    cohort: &[Response],
    categories: &[ScoreCategory],
    kind: AggregationKind,
) -> AggregateResult {
    let mut result = AggregateResult::new();

    for &category in categories {
        let values = present_values(cohort, category);
        if let Some(value) = kind.apply(&values) {
            result.insert(category, value);
        }
    }

    result
}

/// Partition the cohort by an attribute and aggregate each partition.
///
/// Responses without the attribute land in the `"Unknown"` bucket.
pub fn aggregate_grouped(
    cohort: &[Response],
    categories: &[ScoreCategory],
    kind: AggregationKind,
    group_by: &str,
) -> GroupedAggregateResult {
    group_by_attribute(cohort, group_by)
        .into_iter()
        .map(|(group, members)| (group, aggregate(&members, categories, kind)))
        .collect()
}

/// Split a cohort into attribute buckets, preserving cohort order within each.
pub fn group_by_attribute(cohort: &[Response], attribute: &str) -> BTreeMap<String, Vec<Response>> {
    let mut grouped: BTreeMap<String, Vec<Response>> = BTreeMap::new();

    for response in cohort {
        let key = response.attribute(attribute).unwrap_or(UNKNOWN_BUCKET);
        grouped
            .entry(key.to_string())
            .or_default()
            .push(response.clone());
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResponseType;

    fn create_test_response(id: &str, scores: &[(ScoreCategory, f64)], country: Option<&str>) -> Response {
        Response {
            id: id.to_string(),
            response_type: ResponseType::Church,
            scores: scores.iter().copied().collect(),
            location: None,
            attributes: country
                .map(|c| [("country".to_string(), c.to_string())].into_iter().collect())
                .unwrap_or_default(),
        }
    }

    fn preaching_cohort(values: &[f64]) -> Vec<Response> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| create_test_response(&format!("r{}", i), &[(ScoreCategory::Preaching, *v)], None))
            .collect()
    }

    fn single(cohort: &[Response], kind: AggregationKind) -> Option<f64> {
        aggregate(cohort, &[ScoreCategory::Preaching], kind)
            .get(&ScoreCategory::Preaching)
            .copied()
    }

    #[test]
    fn test_basic_reductions() {
        let cohort = preaching_cohort(&[3.0, 4.0, 5.0]);

        assert_eq!(single(&cohort, AggregationKind::Average), Some(4.0));
        assert_eq!(single(&cohort, AggregationKind::Sum), Some(12.0));
        assert_eq!(single(&cohort, AggregationKind::Count), Some(3.0));
        assert_eq!(single(&cohort, AggregationKind::Min), Some(3.0));
        assert_eq!(single(&cohort, AggregationKind::Max), Some(5.0));
        assert_eq!(single(&cohort, AggregationKind::Median), Some(4.0));
    }

    #[test]
    fn test_average_equals_sum_over_count() {
        let cohort = preaching_cohort(&[1.5, 2.25, 4.0, 3.1, 0.7]);
        let avg = single(&cohort, AggregationKind::Average).unwrap();
        let sum = single(&cohort, AggregationKind::Sum).unwrap();
        let count = single(&cohort, AggregationKind::Count).unwrap();
        assert!((avg - sum / count).abs() < 1e-9);
    }

    #[test]
    fn test_count_ignores_unanswered() {
        let mut cohort = preaching_cohort(&[2.0, 4.0]);
        cohort.push(create_test_response("blank", &[(ScoreCategory::Worship, 1.0)], None));

        assert_eq!(single(&cohort, AggregationKind::Count), Some(2.0));
        assert_eq!(single(&cohort, AggregationKind::Average), Some(3.0));
    }

    #[test]
    fn test_empty_cohort_and_missing_category_are_omitted() {
        let empty: Vec<Response> = Vec::new();
        assert!(aggregate(&empty, &[ScoreCategory::Preaching], AggregationKind::Average).is_empty());

        let cohort = preaching_cohort(&[3.0]);
        let result = aggregate(
            &cohort,
            &[ScoreCategory::Preaching, ScoreCategory::Worship],
            AggregationKind::Average,
        );
        assert_eq!(result.len(), 1);
        assert!(!result.contains_key(&ScoreCategory::Worship));
    }

    #[test]
    fn test_single_element_idempotence() {
        let response = create_test_response(
            "solo",
            &[(ScoreCategory::Preaching, 3.5), (ScoreCategory::Prayer, 2.0)],
            None,
        );
        let categories = [ScoreCategory::Preaching, ScoreCategory::Prayer, ScoreCategory::Worship];

        for kind in [
            AggregationKind::Average,
            AggregationKind::Min,
            AggregationKind::Max,
            AggregationKind::Median,
            AggregationKind::Mode,
            AggregationKind::Sum,
        ] {
            let result = aggregate(std::slice::from_ref(&response), &categories, kind);
            assert_eq!(result, response.scores, "kind {}", kind);
        }
    }

    #[test]
    fn test_median_even_count() {
        let cohort = preaching_cohort(&[5.0, 1.0, 4.0, 2.0]);
        assert_eq!(single(&cohort, AggregationKind::Median), Some(3.0));
    }

    #[test]
    fn test_mode_ties_pick_smallest() {
        let cohort = preaching_cohort(&[4.0, 2.0, 4.0, 2.0, 5.0]);
        assert_eq!(single(&cohort, AggregationKind::Mode), Some(2.0));

        let cohort = preaching_cohort(&[3.0, 5.0, 5.0, 1.0]);
        assert_eq!(single(&cohort, AggregationKind::Mode), Some(5.0));
    }

    #[test]
    fn test_grouped_aggregation_uses_unknown_bucket() {
        let cohort = vec![
            create_test_response("a", &[(ScoreCategory::Preaching, 2.0)], Some("Kenya")),
            create_test_response("b", &[(ScoreCategory::Preaching, 4.0)], Some("Kenya")),
            create_test_response("c", &[(ScoreCategory::Preaching, 5.0)], None),
        ];

        let grouped = aggregate_grouped(
            &cohort,
            &[ScoreCategory::Preaching],
            AggregationKind::Average,
            "country",
        );

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["Kenya"][&ScoreCategory::Preaching], 3.0);
        assert_eq!(grouped[UNKNOWN_BUCKET][&ScoreCategory::Preaching], 5.0);
    }

    #[test]
    fn test_grouped_aggregation_blank_attribute_is_unknown() {
        let cohort = vec![
            create_test_response("a", &[(ScoreCategory::Preaching, 2.0)], Some(" Kenya ")),
            create_test_response("b", &[(ScoreCategory::Preaching, 4.0)], Some("")),
            create_test_response("c", &[(ScoreCategory::Preaching, 5.0)], Some("   ")),
            create_test_response("d", &[(ScoreCategory::Preaching, 3.0)], None),
        ];

        let grouped = aggregate_grouped(
            &cohort,
            &[ScoreCategory::Preaching],
            AggregationKind::Count,
            "country",
        );

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["Kenya"][&ScoreCategory::Preaching], 1.0);
        assert_eq!(grouped[UNKNOWN_BUCKET][&ScoreCategory::Preaching], 3.0);
        assert!(!grouped.contains_key(""));
    }

    #[test]
    fn test_aggregation_kind_parsing() {
        assert_eq!("Mean".parse::<AggregationKind>(), Ok(AggregationKind::Average));
        assert_eq!("mode".parse::<AggregationKind>(), Ok(AggregationKind::Mode));
        assert!("variance".parse::<AggregationKind>().is_err());
    }
}
