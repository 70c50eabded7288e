//! Input validation errors.
//!
//! Only malformed requests are errors. Degenerate-but-valid inputs (a goal the
//! grid search cannot reach, a one-point path, a zero-area box) resolve to
//! their documented fallbacks instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("kp index {0} is outside 0..=9")]
    InvalidKp(f64),
    #[error("coordinate ({lat}, {lon}) is outside WGS84 bounds")]
    InvalidCoordinate { lat: f64, lon: f64 },
    #[error("invalid bounding box: {0}")]
    InvalidBoundingBox(String),
    #[error("heatmap resolution must be a positive number of degrees, got {0}")]
    InvalidResolution(f64),
    #[error("duration must be a positive number of seconds up to {max}, got {value}")]
    InvalidDuration { value: f64, max: f64 },
    #[error("sample interval must be a positive number of seconds, got {0}")]
    InvalidSampleInterval(f64),
    #[error("{count} samples exceeds the limit of {max}")]
    TooManySamples { count: f64, max: usize },
    #[error("solar wind value {0} must be finite and non-negative")]
    InvalidSolarWind(f64),
    #[error("unknown scenario '{0}' (expected normal, moderate or severe)")]
    UnknownScenario(String),
    #[error("unknown risk level '{0}' (expected low, medium or high)")]
    UnknownRiskLevel(String),
    #[error("unknown severity '{0}' (expected low, medium or high)")]
    UnknownSeverity(String),
}

/// Reject kp values outside the 0-9 planetary index scale.
pub fn validate_kp(kp: f64) -> Result<f64> {
    if kp.is_finite() && (0.0..=9.0).contains(&kp) {
        Ok(kp)
    } else {
        Err(Error::InvalidKp(kp))
    }
}

pub(crate) fn validate_optional_wind(value: Option<f64>) -> Result<Option<f64>> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(Error::InvalidSolarWind(v)),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kp_bounds_are_inclusive() {
        assert_eq!(validate_kp(0.0), Ok(0.0));
        assert_eq!(validate_kp(9.0), Ok(9.0));
        assert!(validate_kp(9.01).is_err());
        assert!(validate_kp(-0.1).is_err());
        assert!(validate_kp(f64::NAN).is_err());
    }

    #[test]
    fn negative_solar_wind_is_rejected() {
        assert!(validate_optional_wind(Some(-1.0)).is_err());
        assert_eq!(validate_optional_wind(None), Ok(None));
        assert_eq!(validate_optional_wind(Some(420.0)), Ok(Some(420.0)));
    }
}
