//! Space-weather risk model.
//!
//! Converts Kp, solar wind and location into a risk tier, a 0-100 grid risk
//! score and an estimated GPS error envelope. Every function here is pure;
//! randomized variants take the random source as an argument.

use crate::models::{GpsErrorRange, RiskLevel};
use crate::scenario::Scenario;
use rand::Rng;
use serde::Serialize;

/// Kp below this is quiet (Low).
pub const KP_MEDIUM_THRESHOLD: f64 = 4.0;
/// Kp at or above this is a strong storm (High).
pub const KP_HIGH_THRESHOLD: f64 = 7.0;
/// Solar wind faster than this escalates the risk tier (km/s).
pub const FAST_SOLAR_WIND_KMS: f64 = 600.0;
/// Latitudes beyond this (absolute degrees) escalate the risk tier.
pub const HIGH_LATITUDE_DEG: f64 = 60.0;

/// Heatmap score thresholds (0-100 scale).
pub const SCORE_MEDIUM_THRESHOLD: f64 = 40.0;
pub const SCORE_HIGH_THRESHOLD: f64 = 70.0;

/// Route thresholds (normalized 0-1 scale).
pub const NORMALIZED_MEDIUM_THRESHOLD: f64 = 0.4;
pub const NORMALIZED_HIGH_THRESHOLD: f64 = 0.7;

const MAX_BASE_SCORE: f64 = 70.0;
const TEXTURE_SPREAD: f64 = 0.20;
const GPS_ERROR_JITTER: f64 = 0.10;

/// A named region with elevated geomagnetic sensitivity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeomagneticRegion {
    pub name: &'static str,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
    pub multiplier: f64,
}

impl GeomagneticRegion {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

/// Region table. Order matters: the first matching region wins.
pub const GEOMAGNETIC_REGIONS: [GeomagneticRegion; 5] = [
    GeomagneticRegion {
        name: "Northern auroral oval (North American sector)",
        min_lat: 55.0,
        max_lat: 75.0,
        min_lon: -170.0,
        max_lon: -50.0,
        multiplier: 1.40,
    },
    GeomagneticRegion {
        name: "Northern auroral oval (Eurasian sector)",
        min_lat: 60.0,
        max_lat: 75.0,
        min_lon: -50.0,
        max_lon: 180.0,
        multiplier: 1.30,
    },
    GeomagneticRegion {
        name: "Southern auroral oval",
        min_lat: -75.0,
        max_lat: -55.0,
        min_lon: -180.0,
        max_lon: 180.0,
        multiplier: 1.30,
    },
    GeomagneticRegion {
        name: "South Atlantic Anomaly",
        min_lat: -50.0,
        max_lat: 0.0,
        min_lon: -90.0,
        max_lon: 40.0,
        multiplier: 1.25,
    },
    GeomagneticRegion {
        name: "Equatorial ionization anomaly",
        min_lat: -15.0,
        max_lat: 15.0,
        min_lon: -180.0,
        max_lon: 180.0,
        multiplier: 1.15,
    },
];

/// First region in table order containing the point.
pub fn region_for(lat: f64, lon: f64) -> Option<&'static GeomagneticRegion> {
    GEOMAGNETIC_REGIONS
        .iter()
        .find(|region| region.contains(lat, lon))
}

pub fn region_factor(lat: f64, lon: f64) -> f64 {
    region_for(lat, lon).map_or(1.0, |region| region.multiplier)
}

/// Geomagnetic latitude factor: disturbances concentrate toward the poles.
pub fn geomagnetic_factor(lat: f64) -> f64 {
    let abs_lat = lat.abs();
    if abs_lat > 70.0 {
        2.0
    } else if abs_lat > 50.0 {
        1.5
    } else if abs_lat > 30.0 {
        1.2
    } else {
        1.0
    }
}

/// Classify navigation risk.
///
/// Kp sets the base tier; fast solar wind escalates one tier; a high-latitude
/// location escalates one more (so Low becomes at least Medium). Absent
/// optional inputs contribute nothing.
pub fn classify_risk(kp: f64, solar_wind_speed: Option<f64>, latitude: Option<f64>) -> RiskLevel {
    let mut level = if kp < KP_MEDIUM_THRESHOLD {
        RiskLevel::Low
    } else if kp < KP_HIGH_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    };

    if solar_wind_speed.is_some_and(|speed| speed > FAST_SOLAR_WIND_KMS) {
        level = level.escalate();
    }
    if latitude.is_some_and(|lat| lat.abs() > HIGH_LATITUDE_DEG) {
        level = level.escalate();
    }

    level
}

fn raw_grid_score(kp: f64, lat: f64, lon: f64, scenario: Scenario) -> f64 {
    let base = (kp.clamp(0.0, 9.0) / 9.0) * MAX_BASE_SCORE;
    base * geomagnetic_factor(lat) * region_factor(lat, lon) * scenario.risk_factor()
}

/// Risk score in [0, 100] for a location under the given conditions.
pub fn grid_risk_score(kp: f64, lat: f64, lon: f64, scenario: Scenario) -> f64 {
    raw_grid_score(kp, lat, lon, scenario).clamp(0.0, 100.0)
}

/// [`grid_risk_score`] with a ±20% local texture drawn from `rng`.
///
/// For a fixed rng state the result is still monotonic in kp.
pub fn grid_risk_score_textured<R: Rng>(
    kp: f64,
    lat: f64,
    lon: f64,
    scenario: Scenario,
    rng: &mut R,
) -> f64 {
    let texture = rng.random_range((1.0 - TEXTURE_SPREAD)..=(1.0 + TEXTURE_SPREAD));
    (raw_grid_score(kp, lat, lon, scenario) * texture).clamp(0.0, 100.0)
}

/// Level for a 0-100 score (heatmap thresholds 40/70).
pub fn risk_level_for_score(score: f64) -> RiskLevel {
    if score < SCORE_MEDIUM_THRESHOLD {
        RiskLevel::Low
    } else if score < SCORE_HIGH_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Level for a normalized 0-1 risk (route thresholds 0.4/0.7).
pub fn risk_level_for_normalized(risk: f64) -> RiskLevel {
    if risk < NORMALIZED_MEDIUM_THRESHOLD {
        RiskLevel::Low
    } else if risk < NORMALIZED_HIGH_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Unscaled GPS error envelope for a risk tier.
pub fn base_gps_error(level: RiskLevel) -> GpsErrorRange {
    match level {
        RiskLevel::Low => GpsErrorRange::new(5.0, 15.0),
        RiskLevel::Medium => GpsErrorRange::new(30.0, 100.0),
        RiskLevel::High => GpsErrorRange::new(100.0, 500.0),
    }
}

fn latitude_error_factor(latitude: Option<f64>) -> f64 {
    match latitude.map(f64::abs) {
        Some(lat) if lat > 60.0 => 1.8,
        Some(lat) if lat > 45.0 => 1.3,
        _ => 1.0,
    }
}

/// Nominal GPS error envelope scaled by scenario and latitude.
pub fn estimate_gps_error(
    level: RiskLevel,
    latitude: Option<f64>,
    scenario: Scenario,
) -> GpsErrorRange {
    let base = base_gps_error(level);
    let scale = scenario.gps_error_factor() * latitude_error_factor(latitude);
    GpsErrorRange::new(base.min_m * scale, base.max_m * scale)
}

/// [`estimate_gps_error`] with independent ±10% jitter on each bound.
///
/// The jitter is narrower than the gap between scenario multipliers, so the
/// ordering normal < moderate < severe holds for any draw.
pub fn estimate_gps_error_jittered<R: Rng>(
    level: RiskLevel,
    latitude: Option<f64>,
    scenario: Scenario,
    rng: &mut R,
) -> GpsErrorRange {
    let nominal = estimate_gps_error(level, latitude, scenario);
    let low = rng.random_range((1.0 - GPS_ERROR_JITTER)..=(1.0 + GPS_ERROR_JITTER));
    let high = rng.random_range((1.0 - GPS_ERROR_JITTER)..=(1.0 + GPS_ERROR_JITTER));
    GpsErrorRange::new(nominal.min_m * low, nominal.max_m * high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn classify_uses_kp_tiers() {
        assert_eq!(classify_risk(3.9, None, None), RiskLevel::Low);
        assert_eq!(classify_risk(4.0, None, None), RiskLevel::Medium);
        assert_eq!(classify_risk(6.9, None, None), RiskLevel::Medium);
        assert_eq!(classify_risk(7.0, None, None), RiskLevel::High);
    }

    #[test]
    fn classify_escalates_for_wind_and_latitude() {
        assert_eq!(classify_risk(2.0, Some(650.0), None), RiskLevel::Medium);
        assert_eq!(classify_risk(2.0, Some(600.0), None), RiskLevel::Low);
        assert_eq!(classify_risk(2.0, None, Some(-65.0)), RiskLevel::Medium);
        assert_eq!(classify_risk(5.0, None, Some(65.0)), RiskLevel::High);
        assert_eq!(classify_risk(2.0, Some(700.0), Some(70.0)), RiskLevel::High);
    }

    #[test]
    fn classify_is_monotonic_in_kp() {
        for wind in [None, Some(450.0), Some(750.0)] {
            for lat in [None, Some(0.0), Some(55.0), Some(-72.0)] {
                let mut previous = RiskLevel::Low;
                for step in 0..90 {
                    let kp = step as f64 * 0.1;
                    let level = classify_risk(kp, wind, lat);
                    assert!(level >= previous, "kp {kp} wind {wind:?} lat {lat:?}");
                    previous = level;
                }
            }
        }
    }

    #[test]
    fn region_table_first_match_wins() {
        // Inside both the North American oval and (by latitude) the Eurasian band's range,
        // but the longitude only matches the first entry.
        let region = region_for(64.8, -147.7).unwrap();
        assert!(region.name.contains("North American"));
        // Inside both the South Atlantic Anomaly and the equatorial band: SAA is listed first.
        let region = region_for(-10.0, -30.0).unwrap();
        assert_eq!(region.name, "South Atlantic Anomaly");
        assert_eq!(region_factor(37.77, -122.42), 1.0);
    }

    #[test]
    fn grid_score_matches_formula() {
        // San Francisco: |lat| > 30 gives 1.2, no region.
        let score = grid_risk_score(4.5, 37.77, -122.42, Scenario::Normal);
        assert!((score - 35.0 * 1.2).abs() < 1e-9, "got {score}");
        let severe = grid_risk_score(4.5, 37.77, -122.42, Scenario::Severe);
        assert!((severe - 84.0).abs() < 1e-9, "got {severe}");
    }

    #[test]
    fn grid_score_is_bounded_everywhere() {
        for scenario in Scenario::ALL {
            for kp_step in 0..=18 {
                let kp = kp_step as f64 * 0.5;
                for lat_step in -18..=18 {
                    let lat = lat_step as f64 * 5.0;
                    for lon_step in -12..=12 {
                        let lon = lon_step as f64 * 15.0;
                        let score = grid_risk_score(kp, lat, lon, scenario);
                        assert!((0.0..=100.0).contains(&score));
                    }
                }
            }
        }
    }

    #[test]
    fn textured_score_stays_within_twenty_percent() {
        let mut rng = StdRng::seed_from_u64(3);
        let nominal = grid_risk_score(3.0, 10.0, 100.0, Scenario::Normal);
        for _ in 0..100 {
            let textured = grid_risk_score_textured(3.0, 10.0, 100.0, Scenario::Normal, &mut rng);
            assert!(textured >= nominal * 0.8 - 1e-9 && textured <= nominal * 1.2 + 1e-9);
        }
    }

    #[test]
    fn textured_score_is_monotonic_for_a_fixed_seed() {
        let mut previous = 0.0;
        for step in 0..=90 {
            let kp = step as f64 * 0.1;
            let mut rng = StdRng::seed_from_u64(11);
            let score = grid_risk_score_textured(kp, 62.0, 20.0, Scenario::Moderate, &mut rng);
            assert!(score >= previous);
            previous = score;
        }
    }

    #[test]
    fn score_and_normalized_thresholds() {
        assert_eq!(risk_level_for_score(39.9), RiskLevel::Low);
        assert_eq!(risk_level_for_score(40.0), RiskLevel::Medium);
        assert_eq!(risk_level_for_score(70.0), RiskLevel::High);
        assert_eq!(risk_level_for_normalized(0.39), RiskLevel::Low);
        assert_eq!(risk_level_for_normalized(0.4), RiskLevel::Medium);
        assert_eq!(risk_level_for_normalized(0.7), RiskLevel::High);
    }

    #[test]
    fn gps_error_scales_with_latitude() {
        let base = estimate_gps_error(RiskLevel::Medium, Some(10.0), Scenario::Normal);
        assert_eq!(base, GpsErrorRange::new(30.0, 100.0));
        let mid = estimate_gps_error(RiskLevel::Medium, Some(-50.0), Scenario::Normal);
        assert!((mid.max_m - 130.0).abs() < 1e-9);
        let polar = estimate_gps_error(RiskLevel::Medium, Some(75.0), Scenario::Normal);
        assert!((polar.max_m - 180.0).abs() < 1e-9);
        let unknown = estimate_gps_error(RiskLevel::Medium, None, Scenario::Normal);
        assert_eq!(unknown, base);
    }

    #[test]
    fn gps_error_strictly_increases_with_scenario() {
        let mut rng = StdRng::seed_from_u64(99);
        for level in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High] {
            for lat in [None, Some(0.0), Some(50.0), Some(80.0)] {
                let nominal: Vec<GpsErrorRange> = Scenario::ALL
                    .iter()
                    .map(|s| estimate_gps_error(level, lat, *s))
                    .collect();
                assert!(nominal[0].max_m < nominal[1].max_m && nominal[1].max_m < nominal[2].max_m);
                assert!(nominal[0].min_m < nominal[1].min_m && nominal[1].min_m < nominal[2].min_m);

                for _ in 0..50 {
                    let jittered: Vec<GpsErrorRange> = Scenario::ALL
                        .iter()
                        .map(|s| estimate_gps_error_jittered(level, lat, *s, &mut rng))
                        .collect();
                    for range in &jittered {
                        assert!(range.min_m >= 0.0 && range.min_m <= range.max_m);
                    }
                    assert!(jittered[0].max_m < jittered[1].max_m);
                    assert!(jittered[1].max_m < jittered[2].max_m);
                    assert!(jittered[0].min_m < jittered[1].min_m);
                    assert!(jittered[1].min_m < jittered[2].min_m);
                }
            }
        }
    }
}
