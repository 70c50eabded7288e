//! Synthetic GPS drift.
//!
//! A trace keeps one heading for its whole length; a slowly wandering bias
//! pushes each point along it and independent per-axis noise sits on top.
//! Everything is driven by a seeded `StdRng`, so the same inputs always
//! produce the same trace.

use crate::error::{Error, Result};
use crate::models::{GeoPoint, RiskLevel};
use crate::spatial::{path_length_m, wrap_longitude};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;

/// Longest GPS failure that can be simulated, in seconds.
pub const MAX_FAILURE_DURATION_S: f64 = 86_400.0;

/// Most samples one GPS failure trace may hold.
pub const MAX_FAILURE_SAMPLES: usize = 100_000;

const MIN_COS_LAT: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftTier {
    Small,
    Moderate,
    Severe,
}

impl DriftTier {
    pub fn for_kp(kp: f64) -> Self {
        if kp < 4.0 {
            DriftTier::Small
        } else if kp < 7.0 {
            DriftTier::Moderate
        } else {
            DriftTier::Severe
        }
    }
}

/// Bias and noise ranges for one tier, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftBand {
    pub bias_min_m: f64,
    pub bias_max_m: f64,
    pub noise_min_m: f64,
    pub noise_max_m: f64,
}

impl DriftBand {
    fn scaled(&self, factor: f64) -> Self {
        Self {
            bias_min_m: self.bias_min_m * factor,
            bias_max_m: self.bias_max_m * factor,
            noise_min_m: self.noise_min_m * factor,
            noise_max_m: self.noise_max_m * factor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftPolicy {
    pub small: DriftBand,
    pub moderate: DriftBand,
    pub severe: DriftBand,
    /// Relative swing of the bias along the trace
    pub wander_amplitude: f64,
    /// Points per radian of bias wander
    pub wander_period: f64,
    /// Seconds between consecutive samples
    pub sample_interval_s: f64,
    pub meters_per_degree: f64,
    /// Divide east offsets by cos(lat) before converting to degrees.
    pub correct_longitude: bool,
}

impl Default for DriftPolicy {
    fn default() -> Self {
        Self {
            small: DriftBand {
                bias_min_m: 2.0,
                bias_max_m: 5.0,
                noise_min_m: 3.0,
                noise_max_m: 10.0,
            },
            moderate: DriftBand {
                bias_min_m: 200.0,
                bias_max_m: 500.0,
                noise_min_m: 50.0,
                noise_max_m: 100.0,
            },
            severe: DriftBand {
                bias_min_m: 800.0,
                bias_max_m: 2500.0,
                noise_min_m: 150.0,
                noise_max_m: 400.0,
            },
            wander_amplitude: 0.3,
            wander_period: 10.0,
            sample_interval_s: 5.0,
            meters_per_degree: 111_000.0,
            correct_longitude: true,
        }
    }
}

impl DriftPolicy {
    pub fn band(&self, tier: DriftTier) -> &DriftBand {
        match tier {
            DriftTier::Small => &self.small,
            DriftTier::Moderate => &self.moderate,
            DriftTier::Severe => &self.severe,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftTrace {
    pub path: Vec<GeoPoint>,
    /// Length of the drifted trace, in meters
    pub total_drift_m: f64,
    pub drift_rate_mps: f64,
    pub start_position: Option<GeoPoint>,
    pub end_position: Option<GeoPoint>,
    pub duration_s: f64,
    /// Largest distance between a source point and its drifted counterpart
    pub max_offset_m: f64,
    pub mean_offset_m: f64,
}

/// Severity of a simulated receiver failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureSeverity {
    Low,
    #[default]
    Medium,
    High,
}

impl FailureSeverity {
    fn tier(self) -> DriftTier {
        match self {
            FailureSeverity::Low => DriftTier::Small,
            FailureSeverity::Medium => DriftTier::Moderate,
            FailureSeverity::High => DriftTier::Severe,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureSeverity::Low => "low",
            FailureSeverity::Medium => "medium",
            FailureSeverity::High => "high",
        }
    }
}

impl fmt::Display for FailureSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureSeverity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(FailureSeverity::Low),
            "medium" => Ok(FailureSeverity::Medium),
            "high" => Ok(FailureSeverity::High),
            _ => Err(Error::UnknownSeverity(s.to_string())),
        }
    }
}

/// Bias multiplier applied to a failure for the surrounding risk level.
pub fn risk_multiplier(level: RiskLevel) -> f64 {
    match level {
        RiskLevel::Low => 0.5,
        RiskLevel::Medium => 1.0,
        RiskLevel::High => 2.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsFailureRequest {
    pub start: GeoPoint,
    pub duration_s: f64,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub severity: FailureSeverity,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsFailureReport {
    pub trace: DriftTrace,
    pub risk_level: RiskLevel,
    pub severity: FailureSeverity,
    pub duration_s: f64,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DriftSimulator {
    policy: DriftPolicy,
}

impl DriftSimulator {
    pub fn new(policy: DriftPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DriftPolicy {
        &self.policy
    }

    /// Drift `path` under `kp`.
    ///
    /// Without an explicit `seed` one is derived from the path and kp.
    /// `duration_s` defaults to one sample interval per point.
    pub fn simulate(
        &self,
        path: &[GeoPoint],
        kp: f64,
        seed: Option<u64>,
        duration_s: Option<f64>,
    ) -> DriftTrace {
        let seed = seed.unwrap_or_else(|| derive_seed(path, kp));
        let band = *self.policy.band(DriftTier::for_kp(kp));
        let mut rng = StdRng::seed_from_u64(seed);
        self.perturb(path, &band, duration_s, &mut rng)
    }

    /// Stationary receiver at `request.start`, sampled every interval for
    /// the requested duration.
    pub fn simulate_failure(&self, request: &GpsFailureRequest) -> Result<GpsFailureReport> {
        request.start.validate()?;
        let duration = request.duration_s;
        if !duration.is_finite() || duration <= 0.0 || duration > MAX_FAILURE_DURATION_S {
            return Err(Error::InvalidDuration {
                value: duration,
                max: MAX_FAILURE_DURATION_S,
            });
        }

        let interval = self.policy.sample_interval_s;
        if !interval.is_finite() || interval <= 0.0 {
            return Err(Error::InvalidSampleInterval(interval));
        }
        let samples = (duration / interval).floor() + 1.0;
        if samples > MAX_FAILURE_SAMPLES as f64 {
            return Err(Error::TooManySamples {
                count: samples,
                max: MAX_FAILURE_SAMPLES,
            });
        }
        let sample_count = samples as usize;
        let path = vec![request.start; sample_count];

        let band = self
            .policy
            .band(request.severity.tier())
            .scaled(risk_multiplier(request.risk_level));
        let seed = request.seed.unwrap_or_else(|| {
            mix_seed(
                derive_seed(&path, duration),
                request.severity as u64 * 3 + request.risk_level as u64,
            )
        });
        let mut rng = StdRng::seed_from_u64(seed);
        let trace = self.perturb(&path, &band, Some(duration), &mut rng);

        Ok(GpsFailureReport {
            trace,
            risk_level: request.risk_level,
            severity: request.severity,
            duration_s: duration,
            sample_count,
        })
    }

    fn perturb<R: Rng>(
        &self,
        path: &[GeoPoint],
        band: &DriftBand,
        duration_s: Option<f64>,
        rng: &mut R,
    ) -> DriftTrace {
        let policy = &self.policy;
        let base_bias = draw(rng, band.bias_min_m, band.bias_max_m);
        let noise = draw(rng, band.noise_min_m, band.noise_max_m);
        let heading = rng.random_range(0.0..TAU);
        let period = if policy.wander_period > 0.0 {
            policy.wander_period
        } else {
            1.0
        };

        let drifted: Vec<GeoPoint> = path
            .iter()
            .enumerate()
            .map(|(i, point)| {
                let wander = policy.wander_amplitude * (i as f64 / period).sin();
                let bias = base_bias * (1.0 + wander);
                let north_m = bias * heading.cos() + draw(rng, -noise, noise);
                let east_m = bias * heading.sin() + draw(rng, -noise, noise);
                self.offset_point(*point, north_m, east_m)
            })
            .collect();

        let offsets: Vec<f64> = path
            .iter()
            .zip(&drifted)
            .map(|(source, moved)| source.distance_to(moved))
            .collect();
        let max_offset_m = offsets.iter().copied().fold(0.0, f64::max);
        let mean_offset_m = if offsets.is_empty() {
            0.0
        } else {
            offsets.iter().sum::<f64>() / offsets.len() as f64
        };

        let total_drift_m = path_length_m(&drifted);
        let duration_s = duration_s
            .filter(|d| d.is_finite() && *d >= 0.0)
            .unwrap_or(path.len() as f64 * policy.sample_interval_s);
        let drift_rate_mps = if duration_s > 0.0 {
            total_drift_m / duration_s
        } else {
            0.0
        };

        DriftTrace {
            start_position: drifted.first().copied(),
            end_position: drifted.last().copied(),
            path: drifted,
            total_drift_m,
            drift_rate_mps,
            duration_s,
            max_offset_m,
            mean_offset_m,
        }
    }

    fn offset_point(&self, point: GeoPoint, north_m: f64, east_m: f64) -> GeoPoint {
        let meters_per_degree = self.policy.meters_per_degree;
        let lon_scale = if self.policy.correct_longitude {
            point.lat.to_radians().cos().max(MIN_COS_LAT)
        } else {
            1.0
        };
        GeoPoint {
            lat: (point.lat + north_m / meters_per_degree).clamp(-90.0, 90.0),
            lon: wrap_longitude(point.lon + east_m / (meters_per_degree * lon_scale)),
        }
    }
}

fn draw<R: Rng>(rng: &mut R, low: f64, high: f64) -> f64 {
    if high > low {
        rng.random_range(low..=high)
    } else {
        low
    }
}

/// Deterministic seed from the path length, its first point and kp.
pub fn derive_seed(path: &[GeoPoint], kp: f64) -> u64 {
    let mut seed = splitmix64(path.len() as u64);
    if let Some(first) = path.first() {
        seed = mix_seed(seed, first.lat.to_bits());
        seed = mix_seed(seed, first.lon.to_bits());
    }
    mix_seed(seed, kp.to_bits())
}

fn mix_seed(seed: u64, value: u64) -> u64 {
    splitmix64(seed ^ value.rotate_left(17))
}

fn splitmix64(value: u64) -> u64 {
    let mut z = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::path_points;

    fn sample_path() -> Vec<GeoPoint> {
        path_points(
            GeoPoint { lat: 37.77, lon: -122.42 },
            GeoPoint { lat: 37.80, lon: -122.45 },
            19,
        )
    }

    #[test]
    fn same_inputs_same_trace() {
        let sim = DriftSimulator::default();
        let path = sample_path();
        let a = sim.simulate(&path, 5.0, Some(42), None);
        let b = sim.simulate(&path, 5.0, Some(42), None);
        assert_eq!(a, b);

        let derived_a = sim.simulate(&path, 5.0, None, None);
        let derived_b = sim.simulate(&path, 5.0, None, None);
        assert_eq!(derived_a, derived_b);

        let other = sim.simulate(&path, 5.0, Some(43), None);
        assert_ne!(a.path, other.path);
    }

    #[test]
    fn trace_preserves_length_and_reports_duration() {
        let sim = DriftSimulator::default();
        let path = sample_path();
        let trace = sim.simulate(&path, 2.0, Some(1), None);
        assert_eq!(trace.path.len(), path.len());
        assert_eq!(trace.duration_s, 100.0);
        assert!((trace.drift_rate_mps - trace.total_drift_m / 100.0).abs() < 1e-9);
        assert_eq!(trace.start_position, trace.path.first().copied());
        assert_eq!(trace.end_position, trace.path.last().copied());

        let zero = sim.simulate(&path, 2.0, Some(1), Some(0.0));
        assert_eq!(zero.drift_rate_mps, 0.0);
    }

    #[test]
    fn quiet_conditions_drift_by_meters() {
        let sim = DriftSimulator::default();
        let trace = sim.simulate(&sample_path(), 2.0, Some(9), None);
        // bias <= 5 * 1.3, noise <= 10 per axis
        assert!(trace.max_offset_m < 25.0, "got {}", trace.max_offset_m);
    }

    #[test]
    fn severe_conditions_drift_by_hundreds_of_meters() {
        let sim = DriftSimulator::default();
        let trace = sim.simulate(&sample_path(), 8.0, Some(9), None);
        assert!(trace.mean_offset_m > 200.0, "got {}", trace.mean_offset_m);
        assert!(trace.max_offset_m < 4_000.0, "got {}", trace.max_offset_m);
    }

    #[test]
    fn longitude_correction_preserves_metric_offset() {
        let policy = DriftPolicy {
            severe: DriftBand {
                bias_min_m: 1_000.0,
                bias_max_m: 1_000.0,
                noise_min_m: 0.0,
                noise_max_m: 0.0,
            },
            wander_amplitude: 0.0,
            ..DriftPolicy::default()
        };
        let polar = vec![GeoPoint { lat: 80.0, lon: 10.0 }; 5];
        let sim = DriftSimulator::new(policy.clone());
        for seed in 0..20 {
            let trace = sim.simulate(&polar, 8.0, Some(seed), None);
            for offset in polar.iter().zip(&trace.path).map(|(a, b)| a.distance_to(b)) {
                assert!((offset - 1_000.0).abs() < 20.0, "seed {seed}: {offset}");
            }
        }

        let uncorrected = DriftSimulator::new(DriftPolicy {
            correct_longitude: false,
            ..policy
        });
        let shrunk = (0..20).any(|seed| {
            let trace = uncorrected.simulate(&polar, 8.0, Some(seed), None);
            trace.max_offset_m < 900.0
        });
        assert!(shrunk);
    }

    #[test]
    fn drifted_points_stay_valid_near_the_pole() {
        let sim = DriftSimulator::default();
        let path = vec![GeoPoint { lat: 89.999, lon: 179.999 }; 10];
        let trace = sim.simulate(&path, 9.0, Some(5), None);
        assert!(trace.path.iter().all(|p| p.validate().is_ok()));
    }

    #[test]
    fn empty_path_yields_empty_trace() {
        let trace = DriftSimulator::default().simulate(&[], 5.0, None, None);
        assert!(trace.path.is_empty());
        assert_eq!(trace.total_drift_m, 0.0);
        assert_eq!(trace.start_position, None);
    }

    #[test]
    fn gps_failure_samples_every_interval() {
        let sim = DriftSimulator::default();
        let request = GpsFailureRequest {
            start: GeoPoint { lat: 51.5, lon: -0.12 },
            duration_s: 60.0,
            risk_level: RiskLevel::High,
            severity: FailureSeverity::Medium,
            seed: Some(3),
        };
        let report = sim.simulate_failure(&request).unwrap();
        assert_eq!(report.sample_count, 13);
        assert_eq!(report.trace.path.len(), 13);
        assert_eq!(report.duration_s, 60.0);
        // Moderate band doubled for high risk: bias >= 400 m, noise <= 200 m per axis.
        assert!(report.trace.mean_offset_m > 100.0);
        assert_eq!(sim.simulate_failure(&request).unwrap(), report);
    }

    #[test]
    fn gps_failure_rejects_bad_durations() {
        let sim = DriftSimulator::default();
        for duration in [0.0, -5.0, MAX_FAILURE_DURATION_S + 1.0, f64::NAN] {
            let request = GpsFailureRequest {
                start: GeoPoint { lat: 0.0, lon: 0.0 },
                duration_s: duration,
                risk_level: RiskLevel::Low,
                severity: FailureSeverity::Low,
                seed: None,
            };
            assert!(matches!(
                sim.simulate_failure(&request),
                Err(Error::InvalidDuration { .. })
            ));
        }
    }

    #[test]
    fn gps_failure_bounds_the_sample_count() {
        let request = GpsFailureRequest {
            start: GeoPoint { lat: 35.0, lon: 139.0 },
            duration_s: 60.0,
            risk_level: RiskLevel::Medium,
            severity: FailureSeverity::Medium,
            seed: Some(1),
        };
        for interval in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let sim = DriftSimulator::new(DriftPolicy {
                sample_interval_s: interval,
                ..DriftPolicy::default()
            });
            assert!(matches!(
                sim.simulate_failure(&request),
                Err(Error::InvalidSampleInterval(_))
            ));
        }

        let dense = DriftSimulator::new(DriftPolicy {
            sample_interval_s: 1e-6,
            ..DriftPolicy::default()
        });
        assert!(matches!(
            dense.simulate_failure(&request),
            Err(Error::TooManySamples { .. })
        ));

        // 1 s over a full day stays within the limit
        let per_second = DriftSimulator::new(DriftPolicy {
            sample_interval_s: 1.0,
            ..DriftPolicy::default()
        });
        let report = per_second
            .simulate_failure(&GpsFailureRequest {
                duration_s: MAX_FAILURE_DURATION_S,
                ..request
            })
            .unwrap();
        assert_eq!(report.sample_count, 86_401);
    }

    #[test]
    fn severity_parses() {
        assert_eq!("HIGH".parse::<FailureSeverity>(), Ok(FailureSeverity::High));
        assert!("catastrophic".parse::<FailureSeverity>().is_err());
        assert_eq!(DriftTier::for_kp(3.99), DriftTier::Small);
        assert_eq!(DriftTier::for_kp(4.0), DriftTier::Moderate);
        assert_eq!(DriftTier::for_kp(7.0), DriftTier::Severe);
    }
}
