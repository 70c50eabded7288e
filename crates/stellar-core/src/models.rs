//! Core data models shared by the risk, routing and drift modules.

use crate::error::{Error, Result};
use crate::scenario::Scenario;
use crate::spatial::haversine_distance;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Create a point, rejecting coordinates outside [-90,90] x [-180,180].
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        let point = Self { lat, lon };
        point.validate()?;
        Ok(point)
    }

    pub fn validate(&self) -> Result<()> {
        let lat_ok = self.lat.is_finite() && (-90.0..=90.0).contains(&self.lat);
        let lon_ok = self.lon.is_finite() && (-180.0..=180.0).contains(&self.lon);
        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(Error::InvalidCoordinate {
                lat: self.lat,
                lon: self.lon,
            })
        }
    }

    /// Great-circle distance to `other` in meters.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_distance(self.lat, self.lon, other.lat, other.lon)
    }
}

/// Geographic rectangle, `[min_lon, min_lat, max_lon, max_lat]` order on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self> {
        let bbox = Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    pub fn validate(&self) -> Result<()> {
        GeoPoint {
            lat: self.min_lat,
            lon: self.min_lon,
        }
        .validate()
        .map_err(|err| Error::InvalidBoundingBox(err.to_string()))?;
        GeoPoint {
            lat: self.max_lat,
            lon: self.max_lon,
        }
        .validate()
        .map_err(|err| Error::InvalidBoundingBox(err.to_string()))?;
        if self.min_lat > self.max_lat || self.min_lon > self.max_lon {
            return Err(Error::InvalidBoundingBox(format!(
                "minimum corner ({}, {}) exceeds maximum corner ({}, {})",
                self.min_lon, self.min_lat, self.max_lon, self.max_lat
            )));
        }
        Ok(())
    }

    /// Box covering both points, padded by `padding_deg` on every side and
    /// widened around its center so each axis spans at least `min_span_deg`.
    /// The result is clamped to valid coordinates.
    pub fn around(a: GeoPoint, b: GeoPoint, padding_deg: f64, min_span_deg: f64) -> Self {
        let padding = padding_deg.max(0.0);
        let half_min = min_span_deg.max(0.0) / 2.0;

        let mut min_lat = a.lat.min(b.lat) - padding;
        let mut max_lat = a.lat.max(b.lat) + padding;
        let mut min_lon = a.lon.min(b.lon) - padding;
        let mut max_lon = a.lon.max(b.lon) + padding;

        if max_lat - min_lat < min_span_deg {
            let center = (a.lat + b.lat) / 2.0;
            min_lat = center - half_min;
            max_lat = center + half_min;
        }
        if max_lon - min_lon < min_span_deg {
            let center = (a.lon + b.lon) / 2.0;
            min_lon = center - half_min;
            max_lon = center + half_min;
        }

        Self {
            min_lon: min_lon.max(-180.0),
            min_lat: min_lat.max(-90.0),
            max_lon: max_lon.min(180.0),
            max_lat: max_lat.min(90.0),
        }
    }

    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lon_span(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            lat: (self.min_lat + self.max_lat) / 2.0,
            lon: (self.min_lon + self.max_lon) / 2.0,
        }
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = Error;

    fn try_from(value: [f64; 4]) -> Result<Self> {
        Self::new(value[0], value[1], value[2], value[3])
    }
}

/// Navigation risk classification, ordered `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// One tier up, saturating at `High`.
    pub fn escalate(self) -> Self {
        match self {
            RiskLevel::Low => RiskLevel::Medium,
            RiskLevel::Medium | RiskLevel::High => RiskLevel::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            _ => Err(Error::UnknownRiskLevel(s.to_string())),
        }
    }
}

/// Estimated horizontal GPS error envelope in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsErrorRange {
    pub min_m: f64,
    pub max_m: f64,
}

impl GpsErrorRange {
    /// Build a range, clamping both ends to >= 0 and ordering them.
    pub fn new(a: f64, b: f64) -> Self {
        let a = a.max(0.0);
        let b = b.max(0.0);
        Self {
            min_m: a.min(b),
            max_m: a.max(b),
        }
    }
}

/// Provenance of a space-weather sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "scenario", rename_all = "snake_case")]
pub enum DataSource {
    /// Live NOAA SWPC products.
    Noaa,
    /// Synthesized from a scenario.
    Simulation(Scenario),
    /// Supplied directly by the caller.
    Manual,
    /// Provider failed; values are the configured fallback.
    Fallback,
}

impl DataSource {
    pub fn is_authoritative(&self) -> bool {
        matches!(self, DataSource::Noaa | DataSource::Manual)
    }
}

/// Space-weather conditions evaluated for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceWeatherSample {
    pub timestamp: DateTime<Utc>,
    pub kp_index: f64,
    #[serde(default)]
    pub solar_wind_speed: Option<f64>,
    #[serde(default)]
    pub solar_wind_density: Option<f64>,
    pub risk_level: RiskLevel,
    pub gps_error_range_m: GpsErrorRange,
    #[serde(default)]
    pub alerts: Vec<String>,
    pub source: DataSource,
}
