//! Storm scenarios: the static scenario table, simulated conditions and storm timelines.

use crate::error::{Error, Result};
use crate::models::{GpsErrorRange, RiskLevel};
use crate::risk::{base_gps_error, classify_risk};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of samples in a storm timeline.
pub const TIMELINE_POINTS: usize = 24;
/// Spacing between timeline samples, in minutes.
pub const TIMELINE_STEP_MINUTES: i64 = 5;

const SOLAR_WIND_SPREAD_KMS: f64 = 50.0;
const SOLAR_WIND_DENSITY_RANGE: (f64, f64) = (5.0, 10.0);

/// Named space-weather scenario.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    #[default]
    Normal,
    Moderate,
    Severe,
}

/// Static parameters for a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioConfig {
    /// Typical Kp during the scenario
    pub kp_base: f64,
    /// Peak-to-peak spread of Kp around the base
    pub kp_variation: f64,
    /// Typical solar wind speed (km/s)
    pub solar_wind_base: f64,
    pub description: &'static str,
}

const NORMAL_CONFIG: ScenarioConfig = ScenarioConfig {
    kp_base: 2.0,
    kp_variation: 0.5,
    solar_wind_base: 400.0,
    description: "Normal space weather conditions",
};

const MODERATE_CONFIG: ScenarioConfig = ScenarioConfig {
    kp_base: 5.0,
    kp_variation: 1.0,
    solar_wind_base: 550.0,
    description: "Moderate geomagnetic storm",
};

const SEVERE_CONFIG: ScenarioConfig = ScenarioConfig {
    kp_base: 8.0,
    kp_variation: 0.7,
    solar_wind_base: 700.0,
    description: "Severe geomagnetic storm",
};

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Normal, Scenario::Moderate, Scenario::Severe];

    pub fn config(&self) -> &'static ScenarioConfig {
        match self {
            Scenario::Normal => &NORMAL_CONFIG,
            Scenario::Moderate => &MODERATE_CONFIG,
            Scenario::Severe => &SEVERE_CONFIG,
        }
    }

    /// Multiplier applied to the grid risk score.
    pub fn risk_factor(&self) -> f64 {
        match self {
            Scenario::Normal => 1.0,
            Scenario::Moderate => 1.5,
            Scenario::Severe => 2.0,
        }
    }

    /// Multiplier applied to GPS error estimates.
    pub fn gps_error_factor(&self) -> f64 {
        match self {
            Scenario::Normal => 1.0,
            Scenario::Moderate => 1.5,
            Scenario::Severe => 2.5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Normal => "normal",
            Scenario::Moderate => "moderate",
            Scenario::Severe => "severe",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Scenario::Normal),
            "moderate" => Ok(Scenario::Moderate),
            "severe" => Ok(Scenario::Severe),
            _ => Err(Error::UnknownScenario(s.to_string())),
        }
    }
}

/// Raw conditions drawn for a simulated scenario, before risk processing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedConditions {
    pub kp_index: f64,
    pub solar_wind_speed: f64,
    pub solar_wind_density: f64,
}

/// Draw one set of conditions for `scenario`.
///
/// Kp lands within half the scenario variation of its base, solar wind within
/// 50 km/s of the scenario base.
pub fn draw_conditions<R: Rng>(scenario: Scenario, rng: &mut R) -> SimulatedConditions {
    let config = scenario.config();
    let half_variation = config.kp_variation / 2.0;
    let kp = config.kp_base + rng.random_range(-half_variation..=half_variation);
    let wind =
        config.solar_wind_base + rng.random_range(-SOLAR_WIND_SPREAD_KMS..=SOLAR_WIND_SPREAD_KMS);
    let density = rng.random_range(SOLAR_WIND_DENSITY_RANGE.0..=SOLAR_WIND_DENSITY_RANGE.1);

    SimulatedConditions {
        kp_index: round_kp(kp),
        solar_wind_speed: (wind * 10.0).round() / 10.0,
        solar_wind_density: density,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StormPhase {
    Quiet,
    Onset,
    Peak,
    Recovery,
}

impl StormPhase {
    pub fn description(&self) -> &'static str {
        match self {
            StormPhase::Quiet => "Pre-storm quiet period",
            StormPhase::Onset => "Storm onset - conditions deteriorating",
            StormPhase::Peak => "Storm peak - maximum impact",
            StormPhase::Recovery => "Storm recovery - conditions improving",
        }
    }

    fn for_index(index: usize) -> Self {
        match index {
            0..=5 => StormPhase::Quiet,
            6..=11 => StormPhase::Onset,
            12..=17 => StormPhase::Peak,
            _ => StormPhase::Recovery,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub timestamp: DateTime<Utc>,
    pub kp_index: f64,
    pub phase: StormPhase,
    pub phase_description: String,
    pub risk_level: RiskLevel,
    pub gps_error_range_m: GpsErrorRange,
}

/// Two hours of synthetic storm evolution, newest sample first.
pub fn storm_timeline<R: Rng>(
    scenario: Scenario,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<TimelinePoint> {
    let config = scenario.config();
    let base = config.kp_base;

    (0..TIMELINE_POINTS)
        .map(|i| {
            let phase = StormPhase::for_index(i);
            let kp = match phase {
                StormPhase::Quiet => base * 0.3 + rng.random_range(-0.2..=0.2),
                StormPhase::Onset => {
                    let progress = (i - 6) as f64 / 6.0;
                    base * (0.3 + 0.7 * progress) + rng.random_range(-0.3..=0.3)
                }
                StormPhase::Peak => {
                    base + rng.random_range(-config.kp_variation..=config.kp_variation)
                }
                StormPhase::Recovery => {
                    let progress = (i - 18) as f64 / 6.0;
                    base * (1.0 - 0.8 * progress) + rng.random_range(-0.2..=0.2)
                }
            };
            let kp_index = round_kp(kp);
            let risk_level = classify_risk(kp_index, None, None);

            TimelinePoint {
                timestamp: now - Duration::minutes(TIMELINE_STEP_MINUTES * i as i64),
                kp_index,
                phase,
                phase_description: phase.description().to_string(),
                risk_level,
                gps_error_range_m: base_gps_error(risk_level),
            }
        })
        .collect()
}

fn round_kp(kp: f64) -> f64 {
    (kp.clamp(0.0, 9.0) * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn scenario_parses_case_insensitively() {
        assert_eq!("Severe".parse::<Scenario>(), Ok(Scenario::Severe));
        assert_eq!(" moderate ".parse::<Scenario>(), Ok(Scenario::Moderate));
        assert_eq!(
            "simulation".parse::<Scenario>(),
            Err(Error::UnknownScenario("simulation".to_string()))
        );
    }

    #[test]
    fn drawn_conditions_stay_near_scenario_base() {
        let mut rng = StdRng::seed_from_u64(7);
        for scenario in Scenario::ALL {
            let config = scenario.config();
            for _ in 0..200 {
                let drawn = draw_conditions(scenario, &mut rng);
                assert!((drawn.kp_index - config.kp_base).abs() <= config.kp_variation / 2.0 + 0.05);
                assert!((drawn.solar_wind_speed - config.solar_wind_base).abs() <= 50.05);
                assert!((5.0..=10.0).contains(&drawn.solar_wind_density));
            }
        }
    }

    #[test]
    fn timeline_has_four_phases_and_peaks_in_the_middle() {
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(42);
        let timeline = storm_timeline(Scenario::Severe, now, &mut rng);
        assert_eq!(timeline.len(), TIMELINE_POINTS);
        assert_eq!(timeline[0].phase, StormPhase::Quiet);
        assert_eq!(timeline[6].phase, StormPhase::Onset);
        assert_eq!(timeline[12].phase, StormPhase::Peak);
        assert_eq!(timeline[23].phase, StormPhase::Recovery);
        assert_eq!(timeline[0].timestamp, now);
        assert_eq!(timeline[1].timestamp, now - Duration::minutes(5));

        let quiet_max = timeline[..6].iter().map(|p| p.kp_index).fold(0.0, f64::max);
        let peak_min = timeline[12..18]
            .iter()
            .map(|p| p.kp_index)
            .fold(9.0, f64::min);
        assert!(peak_min > quiet_max);
        assert!(timeline[12..18].iter().all(|p| p.risk_level == RiskLevel::High));
        assert!(timeline.iter().all(|p| (0.0..=9.0).contains(&p.kp_index)));
    }
}
