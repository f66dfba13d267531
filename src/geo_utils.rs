//! # Geographic Utilities
//!
//! Core geographic computations for multi-individual GPS analysis.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`distance_km`] | Great-circle distance between two points in kilometers |
//! | [`midpoint`] | Arithmetic midpoint of two coordinates |
//! | [`compute_bounds`] | Bounding box of a set of points |
//! | [`compute_center`] | Arithmetic centroid of a set of points |
//! | [`bounds_overlap`] | Check if two bounding boxes overlap, with a buffer |
//! | [`reach_degrees`] | Degree spans covering a great-circle distance |
//! | [`km_to_degrees`] | Convert kilometers to approximate degrees at a latitude |
//!
//! ## Example
//!
//! ```rust
//! use proximity_engine::{GeoPoint, geo_utils};
//!
//! let nest = GeoPoint::new(46.5480, 7.9850);
//! let ridge = GeoPoint::new(46.5600, 8.0050);
//!
//! let d = geo_utils::distance_km(&nest, &ridge);
//! assert!(d > 1.5 && d < 2.5);
//! assert_eq!(d, geo_utils::distance_km(&ridge, &nest));
//! ```
//!
//! ## Accepted Limitations
//!
//! Distances use the haversine formula on a sphere of radius
//! [`EARTH_RADIUS_KM`]. Precision degrades for nearly antipodal points and
//! centroids are plain lat/lon means, which misbehave across the
//! anti-meridian and near the poles. Tracking data for this crate comes from
//! bounded regional study areas, so neither case is special-cased.

use std::cmp::Ordering;

use geo::{Distance, Haversine, Point};

use crate::{Bounds, GeoPoint};

/// Mean Earth radius in kilometers (IUGG), the same radius `geo` uses for haversine.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Length of one degree of latitude on the sphere, in kilometers.
const KM_PER_DEGREE: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two points in kilometers.
///
/// The arguments are put into a canonical order before evaluating the
/// formula, so `distance_km(a, b)` and `distance_km(b, a)` are bit-for-bit
/// identical. Identical coordinates yield exactly `0.0`.
///
/// # Example
///
/// ```rust
/// use proximity_engine::{GeoPoint, geo_utils};
///
/// let london = GeoPoint::new(51.5074, -0.1278);
/// let paris = GeoPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::distance_km(&london, &paris);
/// assert!((distance - 343.5).abs() < 1.0);
/// ```
#[inline]
pub fn distance_km(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let (a, b) = match p1
        .latitude
        .total_cmp(&p2.latitude)
        .then(p1.longitude.total_cmp(&p2.longitude))
    {
        Ordering::Greater => (p2, p1),
        _ => (p1, p2),
    };

    let point1 = Point::new(a.longitude, a.latitude);
    let point2 = Point::new(b.longitude, b.latitude);
    Haversine::distance(point1, point2) / 1000.0
}

/// Midpoint of two coordinates as the mean of their latitudes and longitudes.
#[inline]
pub fn midpoint(p1: &GeoPoint, p2: &GeoPoint) -> GeoPoint {
    GeoPoint::new(
        (p1.latitude + p2.latitude) / 2.0,
        (p1.longitude + p2.longitude) / 2.0,
    )
}

/// Convert kilometers to approximate degrees at a given latitude.
///
/// Returns the longitude-degree span, which is never smaller than the
/// latitude-degree span for the same distance, so the result is safe to use
/// as a square search radius. The cosine is clamped at 0.1 to stay finite
/// near the poles.
#[inline]
pub fn km_to_degrees(km: f64, latitude: f64) -> f64 {
    let lat_rad = latitude.to_radians();
    km / (KM_PER_DEGREE * lat_rad.cos().max(0.1))
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Compute the bounding box of a set of points.
///
/// Returns `None` for empty input.
///
/// # Example
///
/// ```rust
/// use proximity_engine::{GeoPoint, geo_utils};
///
/// let points = vec![
///     GeoPoint::new(46.50, 7.90),
///     GeoPoint::new(46.60, 8.10),
///     GeoPoint::new(46.55, 8.00),
/// ];
///
/// let bounds = geo_utils::compute_bounds(&points).unwrap();
/// assert_eq!(bounds.min_lat, 46.50);
/// assert_eq!(bounds.max_lng, 8.10);
/// ```
pub fn compute_bounds(points: &[GeoPoint]) -> Option<Bounds> {
    Bounds::from_positions(points.iter().copied())
}

/// Latitude and longitude spans, in degrees, that contain every point within
/// `km` of any point whose absolute latitude is at most `max_abs_latitude`.
///
/// The longitude span inverts the haversine formula at the widest latitude,
/// so it is exact for great circles rather than an approximation along the
/// parallel. A span of 360 means longitude cannot be used to exclude
/// anything.
///
/// # Example
///
/// ```rust
/// use proximity_engine::{GeoPoint, geo_utils};
///
/// let (_, lng_span) = geo_utils::reach_degrees(2000.0, 60.0);
/// let d = geo_utils::distance_km(&GeoPoint::new(60.0, 0.0), &GeoPoint::new(60.0, lng_span));
/// assert!((d - 2000.0).abs() < 1e-3);
/// ```
pub fn reach_degrees(km: f64, max_abs_latitude: f64) -> (f64, f64) {
    let angle = km / EARTH_RADIUS_KM;
    let lat_span = angle.to_degrees();

    let half = (angle / 2.0).min(std::f64::consts::FRAC_PI_2);
    let cos_lat = max_abs_latitude.abs().min(90.0).to_radians().cos();
    let ratio = half.sin() / cos_lat;
    let lng_span = if ratio.is_finite() && ratio < 1.0 {
        2.0 * ratio.asin().to_degrees()
    } else {
        360.0
    };

    // Absorbs rounding in the forward formula
    (lat_span * (1.0 + 1e-9), lng_span * (1.0 + 1e-9))
}

/// Check if two bounding boxes overlap once each is widened by `buffer_km`.
///
/// `reference_lat` must be the largest absolute latitude of either box. Two
/// points, one from each box, that are within `buffer_km` of each other
/// always pass. Used to skip pairs of individuals that never came within
/// range of each other before any point-by-point comparison.
pub fn bounds_overlap(a: &Bounds, b: &Bounds, buffer_km: f64, reference_lat: f64) -> bool {
    let (lat_buffer, lng_buffer) = reach_degrees(buffer_km, reference_lat);

    !(a.max_lat + lat_buffer < b.min_lat
        || b.max_lat + lat_buffer < a.min_lat
        || a.max_lng + lng_buffer < b.min_lng
        || b.max_lng + lng_buffer < a.min_lng)
}

// =============================================================================
// Center/Centroid Functions
// =============================================================================

/// Arithmetic centroid of a set of points.
///
/// Returns `None` for empty input. This is the mean of latitudes and
/// longitudes, not a spherical centroid.
pub fn compute_center(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }

    let sum_lat: f64 = points.iter().map(|p| p.latitude).sum();
    let sum_lng: f64 = points.iter().map(|p| p.longitude).sum();
    let n = points.len() as f64;

    Some(GeoPoint::new(sum_lat / n, sum_lng / n))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_distance_same_point() {
        let p = GeoPoint::new(46.5480, 7.9850);
        assert_eq!(distance_km(&p, &p), 0.0);
    }

    #[test]
    fn test_distance_known_value() {
        // London to Paris is approximately 343.5 km
        let london = GeoPoint::new(51.5074, -0.1278);
        let paris = GeoPoint::new(48.8566, 2.3522);
        assert!(approx_eq(distance_km(&london, &paris), 343.5, 1.0));
    }

    #[test]
    fn test_one_degree_latitude() {
        let a = GeoPoint::new(46.0, 8.0);
        let b = GeoPoint::new(47.0, 8.0);
        assert!(approx_eq(distance_km(&a, &b), KM_PER_DEGREE, 1e-6));
    }

    #[test]
    fn test_midpoint() {
        let m = midpoint(&GeoPoint::new(46.0, 8.0), &GeoPoint::new(46.2, 8.4));
        assert!(approx_eq(m.latitude, 46.1, 1e-12));
        assert!(approx_eq(m.longitude, 8.2, 1e-12));
    }

    #[test]
    fn test_compute_bounds_empty() {
        assert!(compute_bounds(&[]).is_none());
    }

    #[test]
    fn test_compute_center() {
        let points = vec![GeoPoint::new(46.50, 7.90), GeoPoint::new(46.52, 7.94)];
        let center = compute_center(&points).unwrap();
        assert!(approx_eq(center.latitude, 46.51, 1e-9));
        assert!(approx_eq(center.longitude, 7.92, 1e-9));
        assert!(compute_center(&[]).is_none());
    }

    #[test]
    fn test_bounds_overlap() {
        let a = Bounds { min_lat: 46.50, max_lat: 46.51, min_lng: 7.90, max_lng: 7.91 };
        let b = Bounds { min_lat: 46.52, max_lat: 46.53, min_lng: 7.92, max_lng: 7.93 };
        assert!(!bounds_overlap(&a, &b, 0.0, 46.5));
        // ~1.1 km apart in latitude, a 2 km buffer closes the gap
        assert!(bounds_overlap(&a, &b, 2.0, 46.5));
    }

    #[test]
    fn test_reach_degrees_matches_great_circle() {
        for (km, lat) in [(0.5, 46.5), (2.0, 0.0), (150.0, 70.0), (2000.0, 60.0)] {
            let (lat_span, lng_span) = reach_degrees(km, lat);
            let origin = GeoPoint::new(lat, 0.0);

            let north = distance_km(&origin, &GeoPoint::new(lat - lat_span, 0.0));
            let east = distance_km(&origin, &GeoPoint::new(lat, lng_span));
            assert!(approx_eq(north, km, km * 1e-6), "lat span at {km} km, {lat} deg");
            assert!(approx_eq(east, km, km * 1e-6), "lng span at {km} km, {lat} deg");
        }
    }

    #[test]
    fn test_reach_degrees_near_pole_is_unbounded() {
        assert_eq!(reach_degrees(500.0, 89.0).1, 360.0 * (1.0 + 1e-9));
        assert_eq!(reach_degrees(30_000.0, 0.0).1, 360.0 * (1.0 + 1e-9));
    }

    #[test]
    fn test_bounds_overlap_far_north() {
        // 36.4 degrees of longitude at 60N is just under 2000 km
        let a = Bounds { min_lat: 60.0, max_lat: 60.0, min_lng: 0.0, max_lng: 0.0 };
        let b = Bounds { min_lat: 60.0, max_lat: 60.0, min_lng: 36.4, max_lng: 36.4 };
        assert!(bounds_overlap(&a, &b, 2000.0, 60.0));
        assert!(!bounds_overlap(&a, &b, 1900.0, 60.0));
    }

    #[test]
    fn test_km_to_degrees() {
        assert!(approx_eq(km_to_degrees(KM_PER_DEGREE, 0.0), 1.0, 1e-9));
        // Longitude degrees shrink with latitude, so more of them are needed
        assert!(km_to_degrees(KM_PER_DEGREE, 46.0) > 1.0);
    }

    proptest! {
        #[test]
        fn prop_distance_is_symmetric(
            lat1 in 45.0f64..48.0, lng1 in 5.0f64..11.0,
            lat2 in 45.0f64..48.0, lng2 in 5.0f64..11.0,
        ) {
            let a = GeoPoint::new(lat1, lng1);
            let b = GeoPoint::new(lat2, lng2);
            prop_assert_eq!(distance_km(&a, &b), distance_km(&b, &a));
            prop_assert_eq!(distance_km(&a, &a), 0.0);
            prop_assert!(distance_km(&a, &b) >= 0.0);
        }
    }
}
