//! Risk metrics for a path, whatever its source.

use crate::models::{GeoPoint, RiskLevel};
use crate::risk::{grid_risk_score, risk_level_for_normalized};
use crate::scenario::Scenario;
use crate::spatial::path_length_m;
use serde::{Deserialize, Serialize};

/// Cruise speed used for time estimates, in m/s.
pub const NOMINAL_SPEED_MPS: f64 = 15.0;

/// Number of path vertices in each risk bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSegmentCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl RiskSegmentCounts {
    pub fn total(&self) -> usize {
        self.low + self.medium + self.high
    }

    fn record(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::Low => self.low += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::High => self.high += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteMetrics {
    pub distance_m: f64,
    pub estimated_time_s: f64,
    /// Mean normalized vertex risk, scaled to 0-100.
    pub total_risk_score: f64,
    pub max_risk_zone: RiskLevel,
    pub risk_segment_counts: RiskSegmentCounts,
}

/// Score `path` under the given conditions.
///
/// Paths with fewer than two vertices have no segments and score all zeros.
pub fn analyze_path(path: &[GeoPoint], kp: f64, scenario: Scenario) -> RouteMetrics {
    if path.len() < 2 {
        return RouteMetrics::default();
    }

    let mut counts = RiskSegmentCounts::default();
    let mut risk_sum = 0.0;
    let mut max_risk: f64 = 0.0;
    for point in path {
        let risk = grid_risk_score(kp, point.lat, point.lon, scenario) / 100.0;
        counts.record(risk_level_for_normalized(risk));
        risk_sum += risk;
        max_risk = max_risk.max(risk);
    }

    let distance_m = path_length_m(path);
    RouteMetrics {
        distance_m,
        estimated_time_s: distance_m / NOMINAL_SPEED_MPS,
        total_risk_score: (risk_sum / path.len() as f64 * 100.0).clamp(0.0, 100.0),
        max_risk_zone: risk_level_for_normalized(max_risk),
        risk_segment_counts: counts,
    }
}

/// Where a variant's geometry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathSource {
    Road,
    Grid,
    StraightLine,
    Drifted,
    Imu,
}

/// A scored route alternative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteVariant {
    pub path: Vec<GeoPoint>,
    #[serde(flatten)]
    pub metrics: RouteMetrics,
    pub risk_weight: f64,
    pub source: PathSource,
}

impl RouteVariant {
    pub fn from_path(
        path: Vec<GeoPoint>,
        kp: f64,
        scenario: Scenario,
        risk_weight: f64,
        source: PathSource,
    ) -> Self {
        let metrics = analyze_path(&path, kp, scenario);
        Self {
            path,
            metrics,
            risk_weight,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::haversine_distance;

    #[test]
    fn two_point_distance_matches_haversine() {
        let a = GeoPoint { lat: 37.77, lon: -122.42 };
        let b = GeoPoint { lat: 37.78, lon: -122.43 };
        let metrics = analyze_path(&[a, b], 2.0, Scenario::Normal);
        let expected = haversine_distance(a.lat, a.lon, b.lat, b.lon);
        assert!((metrics.distance_m - expected).abs() <= expected * 0.005);
        assert!((metrics.estimated_time_s - expected / NOMINAL_SPEED_MPS).abs() < 1e-6);
        assert_eq!(metrics.risk_segment_counts.total(), 2);
    }

    #[test]
    fn degenerate_paths_score_zero() {
        assert_eq!(analyze_path(&[], 5.0, Scenario::Severe), RouteMetrics::default());
        let single = [GeoPoint { lat: 10.0, lon: 10.0 }];
        let metrics = analyze_path(&single, 5.0, Scenario::Severe);
        assert_eq!(metrics.risk_segment_counts.total(), 0);
        assert_eq!(metrics.distance_m, 0.0);
    }

    #[test]
    fn buckets_follow_normalized_thresholds() {
        // Outside every geomagnetic region and below 30 degrees latitude.
        let p = GeoPoint { lat: 20.0, lon: 100.0 };
        let q = GeoPoint { lat: 20.001, lon: 100.001 };

        let quiet = analyze_path(&[p, q], 2.0, Scenario::Normal);
        assert_eq!(quiet.max_risk_zone, RiskLevel::Low);
        assert_eq!(quiet.risk_segment_counts.low, 2);

        // kp 9, severe: 70 * 2 = 140, clamped to 100.
        let storm = analyze_path(&[p, q], 9.0, Scenario::Severe);
        assert_eq!(storm.max_risk_zone, RiskLevel::High);
        assert_eq!(storm.risk_segment_counts.high, 2);
        assert!((storm.total_risk_score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn total_risk_grows_with_kp() {
        let path = [
            GeoPoint { lat: 51.5, lon: -0.12 },
            GeoPoint { lat: 52.0, lon: 0.5 },
            GeoPoint { lat: 52.5, lon: 1.0 },
        ];
        let low = analyze_path(&path, 2.0, Scenario::Normal);
        let high = analyze_path(&path, 6.0, Scenario::Normal);
        assert!(high.total_risk_score > low.total_risk_score);
        assert_eq!(low.distance_m, high.distance_m);
    }

    #[test]
    fn variant_serializes_metrics_inline() {
        let variant = RouteVariant::from_path(
            vec![GeoPoint { lat: 0.0, lon: 20.0 }, GeoPoint { lat: 0.0, lon: 20.01 }],
            1.0,
            Scenario::Moderate,
            0.1,
            PathSource::StraightLine,
        );
        let json = serde_json::to_value(&variant).unwrap();
        assert!(json["distance_m"].as_f64().unwrap() > 0.0);
        assert_eq!(json["source"], "straight_line");
        assert_eq!(json["max_risk_zone"], "low");
    }
}
