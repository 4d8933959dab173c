//! Target-versus-cohort comparison.
//!
//! Classifies every category the target and its peers both answered into a
//! strength, an improvement area, or an exact tie.

use super::aggregator::{aggregate, AggregationKind};
use crate::models::{AreaEntry, ComparisonResult, Response};
use crate::registry::{RegistryError, ScoreRegistry};
use tracing::debug;

/// Compare a target response against its cohort.
///
/// Any cohort entry sharing the target's id is dropped before averaging, so
/// the target never contributes to its own baseline.
pub fn compare(
    target: &Response,
    cohort: &[Response],
    registry: &ScoreRegistry,
) -> Result<ComparisonResult, RegistryError> {
    let categories = registry.categories_for(target.response_type)?;

    let peers: Vec<Response> = cohort
        .iter()
        .filter(|r| r.id != target.id)
        .cloned()
        .collect();

    let cohort_averages = aggregate(&peers, categories, AggregationKind::Average);

    let mut strength_areas = Vec::new();
    let mut improvement_areas = Vec::new();
    let mut equal_count = 0;

    for (&category, &cohort_score) in &cohort_averages {
        let Some(target_score) = target.score(category) else {
            continue;
        };

        let difference = target_score - cohort_score;
        let entry = AreaEntry {
            category,
            target_score,
            cohort_score,
            difference,
        };

        if difference > 0.0 {
            strength_areas.push(entry);
        } else if difference < 0.0 {
            improvement_areas.push(entry);
        } else {
            equal_count += 1;
        }
    }

    sort_areas(&mut strength_areas);
    sort_areas(&mut improvement_areas);

    debug!(
        "Compared {} against {} peers: {} strengths, {} improvements, {} equal",
        target.id,
        peers.len(),
        strength_areas.len(),
        improvement_areas.len(),
        equal_count
    );

    Ok(ComparisonResult {
        target_scores: target.scores.clone(),
        cohort_averages,
        strength_areas,
        improvement_areas,
        equal_count,
    })
}

/// Largest gap first; equal gaps ordered by category key.
pub fn sort_areas(areas: &mut [AreaEntry]) {
    areas.sort_by(|a, b| {
        b.difference
            .abs()
            .total_cmp(&a.difference.abs())
            .then_with(|| a.category.key().cmp(b.category.key()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResponseType, ScoreCategory};
    use std::collections::{BTreeMap, BTreeSet};

    fn create_test_response(id: &str, scores: &[(ScoreCategory, f64)]) -> Response {
        Response {
            id: id.to_string(),
            response_type: ResponseType::Church,
            scores: scores.iter().copied().collect(),
            location: None,
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_strength_area_scenario() {
        let target = create_test_response("t", &[(ScoreCategory::Preaching, 5.0)]);
        let cohort = vec![
            create_test_response("a", &[(ScoreCategory::Preaching, 3.0)]),
            create_test_response("b", &[(ScoreCategory::Preaching, 4.0)]),
            create_test_response("c", &[(ScoreCategory::Preaching, 5.0)]),
        ];

        let result = compare(&target, &cohort, &ScoreRegistry::standard()).unwrap();

        assert_eq!(
            result.strength_areas,
            vec![AreaEntry {
                category: ScoreCategory::Preaching,
                target_score: 5.0,
                cohort_score: 4.0,
                difference: 1.0,
            }]
        );
        assert!(result.improvement_areas.is_empty());
        assert_eq!(result.equal_count, 0);
    }

    #[test]
    fn test_classification_and_ordering() {
        let target = create_test_response(
            "t",
            &[
                (ScoreCategory::Preaching, 5.0),
                (ScoreCategory::Worship, 4.0),
                (ScoreCategory::Prayer, 1.0),
                (ScoreCategory::Evangelism, 2.0),
                (ScoreCategory::Leadership, 3.0),
                (ScoreCategory::Discipleship, 4.0),
            ],
        );
        let cohort = vec![create_test_response(
            "p",
            &[
                (ScoreCategory::Preaching, 4.0),
                (ScoreCategory::Worship, 3.0),
                (ScoreCategory::Prayer, 3.0),
                (ScoreCategory::Evangelism, 3.0),
                (ScoreCategory::Leadership, 3.0),
                (ScoreCategory::Stewardship, 2.0),
            ],
        )];

        let result = compare(&target, &cohort, &ScoreRegistry::standard()).unwrap();

        // Equal gaps fall back to key order: preaching before worship.
        let strengths: Vec<_> = result.strength_areas.iter().map(|a| a.category).collect();
        assert_eq!(strengths, vec![ScoreCategory::Preaching, ScoreCategory::Worship]);

        let improvements: Vec<_> = result.improvement_areas.iter().map(|a| a.category).collect();
        assert_eq!(improvements, vec![ScoreCategory::Prayer, ScoreCategory::Evangelism]);

        assert_eq!(result.equal_count, 1);
    }

    #[test]
    fn test_partition_completeness() {
        let target = create_test_response(
            "t",
            &[
                (ScoreCategory::Preaching, 2.0),
                (ScoreCategory::Worship, 3.0),
                (ScoreCategory::Prayer, 4.0),
                (ScoreCategory::Stewardship, 1.0),
            ],
        );
        let cohort = vec![
            create_test_response("a", &[(ScoreCategory::Preaching, 3.0), (ScoreCategory::Worship, 3.0)]),
            create_test_response("b", &[(ScoreCategory::Prayer, 2.0), (ScoreCategory::Leadership, 5.0)]),
        ];

        let result = compare(&target, &cohort, &ScoreRegistry::standard()).unwrap();

        let compared: BTreeSet<_> = result
            .cohort_averages
            .keys()
            .filter(|c| result.target_scores.contains_key(*c))
            .copied()
            .collect();
        assert_eq!(result.compared_count(), compared.len());

        for category in compared {
            let in_strengths = result.strength_areas.iter().filter(|a| a.category == category).count();
            let in_improvements = result.improvement_areas.iter().filter(|a| a.category == category).count();
            assert!(in_strengths + in_improvements <= 1);
        }
        // Stewardship (target only) and leadership (cohort only) are not compared.
        assert_eq!(result.compared_count(), 3);
    }

    #[test]
    fn test_target_is_excluded_from_its_own_cohort() {
        let target = create_test_response("t", &[(ScoreCategory::Preaching, 5.0)]);
        let cohort = vec![
            target.clone(),
            create_test_response("a", &[(ScoreCategory::Preaching, 3.0)]),
        ];

        let result = compare(&target, &cohort, &ScoreRegistry::standard()).unwrap();
        assert_eq!(result.cohort_averages[&ScoreCategory::Preaching], 3.0);
        assert_eq!(result.strength_areas[0].difference, 2.0);
    }

    #[test]
    fn test_empty_cohort_is_degenerate_not_error() {
        let target = create_test_response("t", &[(ScoreCategory::Preaching, 5.0)]);

        let alone = compare(&target, std::slice::from_ref(&target), &ScoreRegistry::standard()).unwrap();
        assert!(alone.cohort_averages.is_empty());
        assert!(alone.strength_areas.is_empty());
        assert!(alone.improvement_areas.is_empty());
        assert_eq!(alone.equal_count, 0);
        assert_eq!(alone.target_scores, target.scores);
    }

    #[test]
    fn test_unregistered_type_is_an_error() {
        let target = create_test_response("t", &[(ScoreCategory::Preaching, 5.0)]);
        let registry = ScoreRegistry::with_catalog(BTreeMap::new());
        assert!(compare(&target, &[], &registry).is_err());
    }
}
