pub mod drift;
pub mod error;
pub mod grid_router;
pub mod heatmap;
pub mod models;
pub mod risk;
pub mod route_risk;
pub mod scenario;
pub mod service;
pub mod spatial;

pub use drift::{
    DriftBand, DriftPolicy, DriftSimulator, DriftTier, DriftTrace, FailureSeverity,
    GpsFailureReport, GpsFailureRequest,
};
pub use error::{validate_kp, Error, Result};
pub use grid_router::{
    find_path, route_on_grid, GridCell, GridRoute, PathfinderConfig, RiskGrid,
    FASTEST_RISK_WEIGHT, RISK_AVERSE_RISK_WEIGHT,
};
pub use heatmap::{build_heatmap, Heatmap, HeatmapCell, HeatmapMetadata, HeatmapPolicy};
pub use models::{BoundingBox, DataSource, GeoPoint, GpsErrorRange, RiskLevel, SpaceWeatherSample};
pub use risk::{
    classify_risk, estimate_gps_error, estimate_gps_error_jittered, grid_risk_score,
    grid_risk_score_textured, risk_level_for_normalized, risk_level_for_score,
};
pub use route_risk::{analyze_path, PathSource, RiskSegmentCounts, RouteMetrics, RouteVariant};
pub use scenario::{Scenario, ScenarioConfig, StormPhase, TimelinePoint};
pub use service::{
    compute_heatmap, compute_routes, compute_weather, simulate_gps_failure, storm_timeline,
    Observation, RoadGeometry, RoadStatus, RouteRequest, RouteSet, RouteSetMetadata,
    RouteStrategy, WeatherContext, WeatherInput,
};
pub use spatial::haversine_distance;
