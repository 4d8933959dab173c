//! Geographic distribution of a cohort.

use crate::models::{CountryBucket, GeographicDistribution, Response, UNKNOWN_BUCKET};

/// Bucket a cohort by country, collecting the distinct cities of each bucket.
///
/// Responses without a country are counted under `"Unknown"`.
pub fn distribute(cohort: &[Response]) -> GeographicDistribution {
    let mut distribution = GeographicDistribution::new();

    for response in cohort {
        let country = response.attribute("country").unwrap_or(UNKNOWN_BUCKET);
        let bucket = distribution.entry(country.to_string()).or_default();
        bucket.count += 1;
        if let Some(city) = response.attribute("city") {
            bucket.cities.insert(city.to_string());
        }
    }

    let total = cohort.len();
    for bucket in distribution.values_mut() {
        bucket.share = if total == 0 {
            0.0
        } else {
            bucket.count as f64 / total as f64
        };
    }

    distribution
}

/// Countries ordered by response count (largest first, then by name).
pub fn ranked_countries(distribution: &GeographicDistribution) -> Vec<(&String, &CountryBucket)> {
    let mut ranked: Vec<_> = distribution.iter().collect();
    ranked.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)));
    ranked
}
