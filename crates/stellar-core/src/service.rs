//! Request-level operations.
//!
//! Each call carries its own conditions ([`WeatherContext`]) and random
//! source; nothing is cached between calls.

use crate::drift::{DriftSimulator, GpsFailureReport, GpsFailureRequest};
use crate::error::{validate_kp, validate_optional_wind, Result};
use crate::grid_router::{
    route_on_grid, GridRoute, PathfinderConfig, RiskGrid, FASTEST_RISK_WEIGHT,
    RISK_AVERSE_RISK_WEIGHT,
};
use crate::heatmap::{build_heatmap, Heatmap, HeatmapPolicy};
use crate::models::{BoundingBox, DataSource, GeoPoint, SpaceWeatherSample};
use crate::risk::{
    classify_risk, estimate_gps_error_jittered, region_for, FAST_SOLAR_WIND_KMS,
    HIGH_LATITUDE_DEG,
};
use crate::route_risk::{PathSource, RouteVariant};
use crate::scenario::{draw_conditions, Scenario};
use crate::spatial::path_points;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub use crate::scenario::storm_timeline;

/// Segments in the dead-reckoning line.
pub const IMU_SEGMENTS: usize = 10;

/// Minimum improvement in total risk score for a variant to count as safer.
const SAFER_MARGIN: f64 = 1e-9;

/// Space-weather readings supplied by a caller or provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub kp_index: f64,
    #[serde(default)]
    pub solar_wind_speed: Option<f64>,
    #[serde(default)]
    pub solar_wind_density: Option<f64>,
    pub source: DataSource,
    /// Provider notices, kept ahead of computed alerts.
    #[serde(default)]
    pub alerts: Vec<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Observation {
    pub fn manual(kp_index: f64) -> Self {
        Self {
            kp_index,
            solar_wind_speed: None,
            solar_wind_density: None,
            source: DataSource::Manual,
            alerts: Vec::new(),
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WeatherInput {
    Observed(Observation),
    Simulated(Scenario),
}

/// Conditions a single request is evaluated under.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherContext {
    pub kp_index: f64,
    pub scenario: Scenario,
}

impl WeatherContext {
    pub fn new(kp_index: f64, scenario: Scenario) -> Result<Self> {
        Ok(Self {
            kp_index: validate_kp(kp_index)?,
            scenario,
        })
    }

    /// Context implied by a sample: simulated samples carry their scenario,
    /// everything else is evaluated as normal.
    pub fn from_sample(sample: &SpaceWeatherSample) -> Self {
        let scenario = match sample.source {
            DataSource::Simulation(scenario) => scenario,
            _ => Scenario::Normal,
        };
        Self {
            kp_index: sample.kp_index,
            scenario,
        }
    }
}

/// Evaluate space weather at an optional location.
pub fn compute_weather<R: Rng>(
    input: WeatherInput,
    location: Option<GeoPoint>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<SpaceWeatherSample> {
    if let Some(point) = location {
        point.validate()?;
    }
    match input {
        WeatherInput::Observed(observation) => observed_sample(observation, location, now, rng),
        WeatherInput::Simulated(scenario) => Ok(simulated_sample(scenario, location, now, rng)),
    }
}

fn observed_sample<R: Rng>(
    observation: Observation,
    location: Option<GeoPoint>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<SpaceWeatherSample> {
    let kp = validate_kp(observation.kp_index)?;
    let wind = validate_optional_wind(observation.solar_wind_speed)?;
    let density = validate_optional_wind(observation.solar_wind_density)?;
    let scenario = match observation.source {
        DataSource::Simulation(scenario) => scenario,
        _ => Scenario::Normal,
    };
    let latitude = location.map(|p| p.lat);

    let risk_level = classify_risk(kp, wind, latitude);
    let mut alerts = observation.alerts;
    alerts.extend(condition_alerts(kp, wind, location));

    Ok(SpaceWeatherSample {
        timestamp: observation.timestamp.unwrap_or(now),
        kp_index: kp,
        solar_wind_speed: wind,
        solar_wind_density: density,
        risk_level,
        gps_error_range_m: estimate_gps_error_jittered(risk_level, latitude, scenario, rng),
        alerts,
        source: observation.source,
    })
}

/// One synthetic sample for `scenario`, processed like any observation.
pub fn simulated_sample<R: Rng>(
    scenario: Scenario,
    location: Option<GeoPoint>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> SpaceWeatherSample {
    let drawn = draw_conditions(scenario, rng);
    let latitude = location.map(|p| p.lat);
    let risk_level = classify_risk(drawn.kp_index, Some(drawn.solar_wind_speed), latitude);

    let mut alerts = vec![format!(
        "Simulated {} storm: {}",
        scenario,
        scenario.config().description
    )];
    alerts.extend(condition_alerts(
        drawn.kp_index,
        Some(drawn.solar_wind_speed),
        location,
    ));

    SpaceWeatherSample {
        timestamp: now,
        kp_index: drawn.kp_index,
        solar_wind_speed: Some(drawn.solar_wind_speed),
        solar_wind_density: Some(drawn.solar_wind_density),
        risk_level,
        gps_error_range_m: estimate_gps_error_jittered(risk_level, latitude, scenario, rng),
        alerts,
        source: DataSource::Simulation(scenario),
    }
}

fn condition_alerts(kp: f64, wind: Option<f64>, location: Option<GeoPoint>) -> Vec<String> {
    let mut alerts = Vec::new();
    if kp >= 7.0 {
        alerts.push(format!(
            "Severe geomagnetic storm (Kp {kp:.1}): expect GPS errors of hundreds of meters"
        ));
    } else if kp >= 5.0 {
        alerts.push(format!(
            "Geomagnetic storm (Kp {kp:.1}): GPS accuracy degraded"
        ));
    }
    if let Some(speed) = wind.filter(|s| *s > FAST_SOLAR_WIND_KMS) {
        alerts.push(format!("High-speed solar wind ({speed:.0} km/s)"));
    }
    if let Some(point) = location {
        if point.lat.abs() > HIGH_LATITUDE_DEG {
            alerts.push("High-latitude location: ionospheric scintillation likely".to_string());
        }
        if let Some(region) = region_for(point.lat, point.lon) {
            alerts.push(format!("Location inside {}", region.name));
        }
    }
    alerts
}

/// Road geometry from the routing provider, resolved before the call.
#[derive(Debug, Clone, PartialEq)]
pub enum RoadGeometry {
    /// Primary route first, then alternatives.
    Routes(Vec<Vec<GeoPoint>>),
    NoRoute,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadStatus {
    Available,
    NoRoute,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStrategy {
    Road,
    Grid,
}

#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub conditions: WeatherContext,
    pub road: RoadGeometry,
    /// Drift seed; derived from the route when absent.
    pub seed: Option<u64>,
    pub config: PathfinderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSetMetadata {
    pub kp_index: f64,
    pub scenario: Scenario,
    pub strategy: RouteStrategy,
    pub road_status: RoadStatus,
    /// True when the grid search failed and a straight line was used.
    pub straight_line_fallback: bool,
    pub grid_size: usize,
    pub nodes_visited: usize,
    pub drift_max_offset_m: f64,
    pub drift_mean_offset_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSet {
    pub normal: RouteVariant,
    pub safe: RouteVariant,
    pub drifted: RouteVariant,
    pub imu: RouteVariant,
    pub metadata: RouteSetMetadata,
}

fn grid_variant(route: GridRoute, context: WeatherContext, risk_weight: f64) -> RouteVariant {
    let source = if route.fallback {
        PathSource::StraightLine
    } else {
        PathSource::Grid
    };
    RouteVariant::from_path(
        route.path,
        context.kp_index,
        context.scenario,
        risk_weight,
        source,
    )
}

/// Normal, safe, drifted and dead-reckoning variants between two points.
pub fn compute_routes(request: RouteRequest) -> Result<RouteSet> {
    request.start.validate()?;
    request.end.validate()?;
    let context = WeatherContext::new(request.conditions.kp_index, request.conditions.scenario)?;
    let RouteRequest {
        start,
        end,
        road,
        seed,
        config,
        ..
    } = request;

    let grid_size = config.effective_grid_size();
    let build_grid = || {
        RiskGrid::build(
            config.bbox_for(start, end),
            context.kp_index,
            context.scenario,
            grid_size,
        )
    };

    let (road_status, roads) = match road {
        RoadGeometry::Routes(routes) => {
            let usable: Vec<Vec<GeoPoint>> = routes
                .into_iter()
                .filter(|path| path.len() >= 2 && path.iter().all(|p| p.validate().is_ok()))
                .collect();
            if usable.is_empty() {
                (RoadStatus::NoRoute, usable)
            } else {
                (RoadStatus::Available, usable)
            }
        }
        RoadGeometry::NoRoute => (RoadStatus::NoRoute, Vec::new()),
        RoadGeometry::Unavailable => (RoadStatus::Unavailable, Vec::new()),
    };

    let mut straight_line_fallback = false;
    let mut nodes_visited = 0;
    let mut road_variants = roads.into_iter().map(|path| {
        RouteVariant::from_path(
            path,
            context.kp_index,
            context.scenario,
            FASTEST_RISK_WEIGHT,
            PathSource::Road,
        )
    });
    let (strategy, normal, safe) = match road_variants.next() {
        None => {
            let grid = build_grid();
            let fast = route_on_grid(
                &grid,
                start,
                end,
                FASTEST_RISK_WEIGHT,
                config.impassable_risk,
            );
            let careful = route_on_grid(
                &grid,
                start,
                end,
                RISK_AVERSE_RISK_WEIGHT,
                config.impassable_risk,
            );
            straight_line_fallback = fast.fallback || careful.fallback;
            nodes_visited = fast.nodes_visited + careful.nodes_visited;
            (
                RouteStrategy::Grid,
                grid_variant(fast, context, FASTEST_RISK_WEIGHT),
                grid_variant(careful, context, RISK_AVERSE_RISK_WEIGHT),
            )
        }
        Some(normal) => {
            let safer_road = road_variants
                .filter(|v| {
                    v.metrics.total_risk_score < normal.metrics.total_risk_score - SAFER_MARGIN
                })
                .min_by(|a, b| {
                    a.metrics
                        .total_risk_score
                        .total_cmp(&b.metrics.total_risk_score)
                });

            let safe = match safer_road {
                Some(mut road) => {
                    road.risk_weight = RISK_AVERSE_RISK_WEIGHT;
                    road
                }
                None => {
                    let grid = build_grid();
                    let careful = route_on_grid(
                        &grid,
                        start,
                        end,
                        RISK_AVERSE_RISK_WEIGHT,
                        config.impassable_risk,
                    );
                    nodes_visited = careful.nodes_visited;
                    let candidate = grid_variant(careful, context, RISK_AVERSE_RISK_WEIGHT);
                    if candidate.metrics.total_risk_score
                        < normal.metrics.total_risk_score - SAFER_MARGIN
                    {
                        candidate
                    } else {
                        RouteVariant {
                            risk_weight: RISK_AVERSE_RISK_WEIGHT,
                            ..normal.clone()
                        }
                    }
                }
            };
            (RouteStrategy::Road, normal, safe)
        }
    };

    let trace = DriftSimulator::default().simulate(&normal.path, context.kp_index, seed, None);
    let metadata = RouteSetMetadata {
        kp_index: context.kp_index,
        scenario: context.scenario,
        strategy,
        road_status,
        straight_line_fallback,
        grid_size,
        nodes_visited,
        drift_max_offset_m: trace.max_offset_m,
        drift_mean_offset_m: trace.mean_offset_m,
    };
    let drifted = RouteVariant::from_path(
        trace.path,
        context.kp_index,
        context.scenario,
        normal.risk_weight,
        PathSource::Drifted,
    );
    let imu = RouteVariant::from_path(
        path_points(start, end, IMU_SEGMENTS),
        context.kp_index,
        context.scenario,
        0.0,
        PathSource::Imu,
    );

    Ok(RouteSet {
        normal,
        safe,
        drifted,
        imu,
        metadata,
    })
}

/// Heatmap with the default cell policy.
pub fn compute_heatmap(
    bbox: BoundingBox,
    resolution_deg: f64,
    kp: f64,
    scenario: Scenario,
) -> Result<Heatmap> {
    compute_heatmap_with(bbox, resolution_deg, kp, scenario, &HeatmapPolicy::default())
}

pub fn compute_heatmap_with(
    bbox: BoundingBox,
    resolution_deg: f64,
    kp: f64,
    scenario: Scenario,
    policy: &HeatmapPolicy,
) -> Result<Heatmap> {
    build_heatmap(bbox, resolution_deg, kp, scenario, policy)
}

pub fn simulate_gps_failure(request: &GpsFailureRequest) -> Result<GpsFailureReport> {
    DriftSimulator::default().simulate_failure(request)
}
