//! Risk heatmap over a bounding box.

use crate::error::{validate_kp, Error, Result};
use crate::models::{BoundingBox, GeoPoint, GpsErrorRange, RiskLevel};
use crate::risk::{estimate_gps_error, grid_risk_score, risk_level_for_score};
use crate::scenario::Scenario;
use serde::{Deserialize, Serialize};

const DEGENERATE_EXTENT_DEG: f64 = 1e-9;
const MAX_OPACITY: f64 = 0.7;
const CELL_COUNT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapPolicy {
    /// Requested resolutions finer than this are raised to it.
    pub min_resolution_deg: f64,
    /// Resolution is coarsened until the grid has at most this many cells.
    pub max_cells: usize,
}

impl Default for HeatmapPolicy {
    fn default() -> Self {
        Self {
            min_resolution_deg: 0.001,
            max_cells: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    /// Corners counter-clockwise from the south-west.
    pub bounding_polygon: [GeoPoint; 4],
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub color: String,
    pub opacity: f64,
    pub gps_error_range_m: GpsErrorRange,
    pub center: GeoPoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapMetadata {
    pub bbox: BoundingBox,
    pub requested_resolution_deg: f64,
    pub resolution_deg: f64,
    pub rows: usize,
    pub cols: usize,
    pub kp_index: f64,
    pub scenario: Scenario,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    pub cells: Vec<HeatmapCell>,
    pub metadata: HeatmapMetadata,
}

pub fn color_for(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "#4CAF50",
        RiskLevel::Medium => "#FFC107",
        RiskLevel::High => "#F44336",
    }
}

/// Cells needed to cover `extent`, ignoring rounding noise in the division
/// so an exact multiple never gains an empty trailing cell.
fn cells_per_axis(extent: f64, resolution: f64) -> usize {
    ((extent / resolution) - CELL_COUNT_TOLERANCE).ceil().max(1.0) as usize
}

/// Tessellate `bbox` into scored cells.
///
/// Rows run south to north and columns west to east; the last row and column
/// are clipped to the box.
pub fn build_heatmap(
    bbox: BoundingBox,
    resolution_deg: f64,
    kp: f64,
    scenario: Scenario,
    policy: &HeatmapPolicy,
) -> Result<Heatmap> {
    bbox.validate()?;
    let kp = validate_kp(kp)?;
    if !resolution_deg.is_finite() || resolution_deg <= 0.0 {
        return Err(Error::InvalidResolution(resolution_deg));
    }

    let lat_extent = bbox.lat_span();
    let lon_extent = bbox.lon_span();
    let mut resolution = resolution_deg.max(policy.min_resolution_deg);

    let mut metadata = HeatmapMetadata {
        bbox,
        requested_resolution_deg: resolution_deg,
        resolution_deg: resolution,
        rows: 0,
        cols: 0,
        kp_index: kp,
        scenario,
    };
    if lat_extent < DEGENERATE_EXTENT_DEG || lon_extent < DEGENERATE_EXTENT_DEG {
        return Ok(Heatmap {
            cells: Vec::new(),
            metadata,
        });
    }

    let max_cells = policy.max_cells.max(1);
    let (mut rows, mut cols) = (
        cells_per_axis(lat_extent, resolution),
        cells_per_axis(lon_extent, resolution),
    );
    while rows.saturating_mul(cols) > max_cells {
        let scale = (rows.saturating_mul(cols) as f64 / max_cells as f64).sqrt();
        resolution *= scale.max(1.01);
        rows = cells_per_axis(lat_extent, resolution);
        cols = cells_per_axis(lon_extent, resolution);
    }
    metadata.resolution_deg = resolution;
    metadata.rows = rows;
    metadata.cols = cols;

    let mut cells = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        let south = bbox.min_lat + row as f64 * resolution;
        let north = if row + 1 == rows {
            bbox.max_lat
        } else {
            (south + resolution).min(bbox.max_lat)
        };
        for col in 0..cols {
            let west = bbox.min_lon + col as f64 * resolution;
            let east = if col + 1 == cols {
                bbox.max_lon
            } else {
                (west + resolution).min(bbox.max_lon)
            };
            cells.push(score_cell(south, north, west, east, kp, scenario));
        }
    }

    Ok(Heatmap { cells, metadata })
}

fn score_cell(
    south: f64,
    north: f64,
    west: f64,
    east: f64,
    kp: f64,
    scenario: Scenario,
) -> HeatmapCell {
    let center = GeoPoint {
        lat: (south + north) / 2.0,
        lon: (west + east) / 2.0,
    };
    let risk_score = grid_risk_score(kp, center.lat, center.lon, scenario);
    let risk_level = risk_level_for_score(risk_score);

    HeatmapCell {
        bounding_polygon: [
            GeoPoint { lat: south, lon: west },
            GeoPoint { lat: south, lon: east },
            GeoPoint { lat: north, lon: east },
            GeoPoint { lat: north, lon: west },
        ],
        risk_score,
        risk_level,
        color: color_for(risk_level).to_string(),
        opacity: (risk_score / 150.0).min(MAX_OPACITY),
        gps_error_range_m: estimate_gps_error(risk_level, Some(center.lat), scenario),
        center,
    }
}
