//! Great-circle geodesy helpers: distance, bearing, interpolation, offsets.

use crate::models::{BoundingBox, GeoPoint};

/// Mean Earth radius used by every great-circle computation, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Calculate distance between two points in meters using Haversine formula.
///
/// # Arguments
/// * `lat1`, `lon1` - First point coordinates in decimal degrees
/// * `lat2`, `lon2` - Second point coordinates in decimal degrees
///
/// # Returns
/// Distance in meters
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Calculate initial bearing from point 1 to point 2 in radians.
/// Returns bearing in radians, 0 = north, π/2 = east.
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let x = delta_lambda.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    x.atan2(y)
}

/// Initial bearing in compass degrees, normalized to [0, 360).
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    bearing(lat1, lon1, lat2, lon2).to_degrees().rem_euclid(360.0)
}

/// Offset a position by distance and bearing.
///
/// # Arguments
/// * `lat`, `lon` - Starting position in degrees
/// * `distance_m` - Distance in meters
/// * `bearing_rad` - Bearing in radians (0 = north, π/2 = east)
///
/// # Returns
/// (new_lat, new_lon) in degrees
pub fn offset_by_bearing(lat: f64, lon: f64, distance_m: f64, bearing_rad: f64) -> (f64, f64) {
    if distance_m.abs() <= f64::EPSILON {
        return (lat, lon);
    }

    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();
    let angular_distance = distance_m / EARTH_RADIUS_M;

    let sin_lat1 = lat1.sin();
    let cos_lat1 = lat1.cos();
    let sin_ad = angular_distance.sin();
    let cos_ad = angular_distance.cos();

    let sin_lat2 = sin_lat1 * cos_ad + cos_lat1 * sin_ad * bearing_rad.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();

    let y = bearing_rad.sin() * sin_ad * cos_lat1;
    let x = cos_ad - sin_lat1 * sin_lat2;
    let lon2 = wrap_longitude_rad(lon1 + y.atan2(x));

    (lat2.to_degrees(), lon2.to_degrees())
}

/// Point at `fraction` (0..=1) of the way along the great circle from `start` to `end`.
pub fn intermediate_point(start: GeoPoint, end: GeoPoint, fraction: f64) -> GeoPoint {
    if fraction <= 0.0 {
        return start;
    }
    if fraction >= 1.0 {
        return end;
    }

    let lat1 = start.lat.to_radians();
    let lon1 = start.lon.to_radians();
    let lat2 = end.lat.to_radians();
    let lon2 = end.lon.to_radians();

    let delta = haversine_distance(start.lat, start.lon, end.lat, end.lon) / EARTH_RADIUS_M;
    if delta.abs() < 1e-12 {
        return start;
    }

    let a = ((1.0 - fraction) * delta).sin() / delta.sin();
    let b = (fraction * delta).sin() / delta.sin();

    let x = a * lat1.cos() * lon1.cos() + b * lat2.cos() * lon2.cos();
    let y = a * lat1.cos() * lon1.sin() + b * lat2.cos() * lon2.sin();
    let z = a * lat1.sin() + b * lat2.sin();

    GeoPoint {
        lat: z.atan2((x * x + y * y).sqrt()).to_degrees(),
        lon: y.atan2(x).to_degrees(),
    }
}

/// `segments + 1` evenly spaced great-circle points from `start` to `end`, endpoints included.
pub fn path_points(start: GeoPoint, end: GeoPoint, segments: usize) -> Vec<GeoPoint> {
    let segments = segments.max(1);
    (0..=segments)
        .map(|i| intermediate_point(start, end, i as f64 / segments as f64))
        .collect()
}

/// Sum of great-circle segment lengths along `path`, in meters.
pub fn path_length_m(path: &[GeoPoint]) -> f64 {
    path.windows(2)
        .map(|pair| pair[0].distance_to(&pair[1]))
        .sum()
}

/// Square box extending `radius_m` north, south, east and west of `center`.
pub fn bounding_box_around(center: GeoPoint, radius_m: f64) -> BoundingBox {
    use std::f64::consts::{FRAC_PI_2, PI};

    let radius = radius_m.max(0.0);
    let (north, _) = offset_by_bearing(center.lat, center.lon, radius, 0.0);
    let (south, _) = offset_by_bearing(center.lat, center.lon, radius, PI);
    let (_, east) = offset_by_bearing(center.lat, center.lon, radius, FRAC_PI_2);
    let (_, west) = offset_by_bearing(center.lat, center.lon, radius, -FRAC_PI_2);

    BoundingBox {
        min_lon: west.min(center.lon),
        min_lat: south.min(center.lat),
        max_lon: east.max(center.lon),
        max_lat: north.max(center.lat),
    }
}

/// Wrap a longitude in degrees into [-180, 180].
pub fn wrap_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        return lon;
    }
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

fn wrap_longitude_rad(lon: f64) -> f64 {
    (lon + std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI) - std::f64::consts::PI
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // ~111km between these points (1 degree latitude)
        let dist = haversine_distance(0.0, 0.0, 1.0, 0.0);
        assert!((dist - 111_194.0).abs() < 100.0);
    }

    #[test]
    fn test_haversine_same_point() {
        let dist = haversine_distance(37.7749, -122.4194, 37.7749, -122.4194);
        assert!(dist < 0.001);
    }

    #[test]
    fn test_bearing_points_east_along_equator() {
        let b = bearing_deg(0.0, 0.0, 0.0, 1.0);
        assert!((b - 90.0).abs() < 1e-9, "got {b}");
        let west = bearing_deg(0.0, 1.0, 0.0, 0.0);
        assert!((west - 270.0).abs() < 1e-9, "got {west}");
    }

    #[test]
    fn test_offset_then_distance_round_trips() {
        let (lat, lon) = offset_by_bearing(37.77, -122.42, 1_000.0, 1.0);
        let dist = haversine_distance(37.77, -122.42, lat, lon);
        assert!((dist - 1_000.0).abs() < 0.01, "got {dist}");
    }

    #[test]
    fn test_intermediate_point_midpoint_is_equidistant() {
        let a = GeoPoint { lat: 37.77, lon: -122.42 };
        let b = GeoPoint { lat: 37.78, lon: -122.43 };
        let mid = intermediate_point(a, b, 0.5);
        let da = a.distance_to(&mid);
        let db = b.distance_to(&mid);
        assert!((da - db).abs() < 0.01, "{da} vs {db}");
    }

    #[test]
    fn test_path_points_include_endpoints_and_preserve_length() {
        let a = GeoPoint { lat: 10.0, lon: 20.0 };
        let b = GeoPoint { lat: 11.0, lon: 21.0 };
        let points = path_points(a, b, 10);
        assert_eq!(points.len(), 11);
        assert_eq!(points[0], a);
        assert_eq!(points[10], b);
        let direct = a.distance_to(&b);
        assert!((path_length_m(&points) - direct).abs() < 1.0);
    }

    #[test]
    fn test_bounding_box_around_has_requested_extent() {
        let center = GeoPoint { lat: 37.7749, lon: -122.4194 };
        let bbox = bounding_box_around(center, 5_000.0);
        let north_south = haversine_distance(bbox.min_lat, center.lon, bbox.max_lat, center.lon);
        assert!((north_south - 10_000.0).abs() < 1.0, "got {north_south}");
        assert!(bbox.validate().is_ok());
    }

    #[test]
    fn test_wrap_longitude_keeps_range() {
        assert_eq!(wrap_longitude(179.5), 179.5);
        assert!((wrap_longitude(190.0) + 170.0).abs() < 1e-9);
        assert!((wrap_longitude(-190.0) - 170.0).abs() < 1e-9);
    }
}
