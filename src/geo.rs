//! Geospatial containment.
//!
//! Great-circle containment tests for drawn circular regions and bounding
//! boxes that fit a set of located responses.

use crate::models::{GeoPoint, Region};
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Two points closer than this on both axes are the same point.
pub const COINCIDENCE_TOLERANCE_DEGREES: f64 = 1e-6;

/// Axis-aligned lat/lng box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegion {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingRegion {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Midpoint of the box.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }
}

/// Haversine distance between two points, in meters.
pub fn haversine_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_METERS * c
}

fn coincident(a: &GeoPoint, b: &GeoPoint) -> bool {
    (a.latitude - b.latitude).abs() <= COINCIDENCE_TOLERANCE_DEGREES
        && (a.longitude - b.longitude).abs() <= COINCIDENCE_TOLERANCE_DEGREES
}

/// Whether a point lies inside a circular region.
///
/// Points without coordinates are never contained, and a negative radius
/// contains nothing. The center itself (within the coincidence tolerance)
/// is contained at any non-negative radius, including zero.
pub fn contains(point: Option<&GeoPoint>, region: &Region) -> bool {
    let Some(point) = point else {
        return false;
    };

    if !region.radius_meters.is_finite() || region.radius_meters < 0.0 {
        return false;
    }

    coincident(point, &region.center)
        || haversine_distance(point, &region.center) <= region.radius_meters
}

/// Smallest lat/lng box enclosing every located point.
///
/// Returns `default` when none of the points has coordinates.
pub fn fit_region<'a, I>(points: I, default: BoundingRegion) -> BoundingRegion
where
    I: IntoIterator<Item = Option<&'a GeoPoint>>,
{
    points
        .into_iter()
        .flatten()
        .fold(None, |acc: Option<BoundingRegion>, p| {
            Some(match acc {
                None => BoundingRegion::new(p.latitude, p.longitude, p.latitude, p.longitude),
                Some(b) => BoundingRegion::new(
                    b.south.min(p.latitude),
                    b.west.min(p.longitude),
                    b.north.max(p.latitude),
                    b.east.max(p.longitude),
                ),
            })
        })
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(lat: f64, lng: f64, radius: f64) -> Region {
        Region {
            center: GeoPoint::new(lat, lng),
            radius_meters: radius,
        }
    }

    fn wide_view() -> BoundingRegion {
        BoundingRegion::new(-60.0, -180.0, 75.0, 180.0)
    }

    #[test]
    fn test_center_is_contained() {
        let r = region(0.0, 0.0, 100_000.0);
        assert!(contains(Some(&GeoPoint::new(0.0, 0.0)), &r));
    }

    #[test]
    fn test_distant_point_is_not_contained() {
        let r = region(0.0, 0.0, 100_000.0);
        let far = GeoPoint::new(10.0, 10.0);

        let distance = haversine_distance(&far, &r.center);
        assert!((distance - 1_568_000.0).abs() < 5_000.0, "distance {}", distance);
        assert!(!contains(Some(&far), &r));
    }

    #[test]
    fn test_missing_coordinates_never_contained() {
        assert!(!contains(None, &region(0.0, 0.0, 1e9)));
    }

    #[test]
    fn test_zero_radius_matches_only_center() {
        let r = region(-1.2921, 36.8219, 0.0);
        assert!(contains(Some(&GeoPoint::new(-1.2921, 36.8219)), &r));
        assert!(contains(Some(&GeoPoint::new(-1.2921 + 5e-7, 36.8219)), &r));
        assert!(!contains(Some(&GeoPoint::new(-1.2921 + 1e-4, 36.8219)), &r));
    }

    #[test]
    fn test_negative_radius_contains_nothing() {
        let r = region(0.0, 0.0, -1.0);
        assert!(!contains(Some(&GeoPoint::new(0.0, 0.0)), &r));
    }

    #[test]
    fn test_containment_is_monotonic_in_radius() {
        let points: Vec<GeoPoint> = (0..40)
            .map(|i| GeoPoint::new(i as f64 * 0.05 - 1.0, (i % 7) as f64 * 0.1))
            .collect();
        let radii = [0.0, 1.0, 500.0, 10_000.0, 50_000.0, 150_000.0, 1_000_000.0];

        let mut previous: Vec<bool> = vec![false; points.len()];
        for radius in radii {
            let r = region(0.0, 0.0, radius);
            let current: Vec<bool> = points.iter().map(|p| contains(Some(p), &r)).collect();
            for (before, now) in previous.iter().zip(&current) {
                assert!(!before || *now, "point dropped when radius grew to {}", radius);
            }
            previous = current;
        }
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let nairobi = GeoPoint::new(-1.2921, 36.8219);
        let lagos = GeoPoint::new(6.5244, 3.3792);
        let there = haversine_distance(&nairobi, &lagos);
        let back = haversine_distance(&lagos, &nairobi);
        assert!((there - back).abs() < 1e-6);
        assert!(there > 3_700_000.0 && there < 3_900_000.0);
    }

    #[test]
    fn test_fit_region() {
        let a = GeoPoint::new(-1.0, 36.0);
        let b = GeoPoint::new(6.5, 3.4);
        let bounds = fit_region([Some(&a), None, Some(&b)], wide_view());

        assert_eq!(bounds, BoundingRegion::new(-1.0, 3.4, 6.5, 36.0));
        let center = bounds.center();
        assert!((center.latitude - 2.75).abs() < 1e-9);
        assert!((center.longitude - 19.7).abs() < 1e-9);
    }

    #[test]
    fn test_fit_region_without_points_uses_default() {
        assert_eq!(fit_region([None, None], wide_view()), wide_view());
        assert_eq!(fit_region(Vec::<Option<&GeoPoint>>::new(), wide_view()), wide_view());
    }
}
