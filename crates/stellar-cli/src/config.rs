//! CLI configuration from environment.

use std::env;
use std::time::Duration;

pub const DEFAULT_NOAA_URL: &str = "https://services.swpc.noaa.gov";
pub const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org";

#[derive(Debug, Clone)]
pub struct Config {
    pub noaa_url: String,
    pub osrm_url: String,
    pub http_timeout: Duration,
    /// Kp used when the space-weather feed cannot be reached.
    pub fallback_kp: f64,
    pub grid_size: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Missing or unparsable values use defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let fallback_kp = lookup("STELLAR_FALLBACK_KP")
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|kp| kp.is_finite() && (0.0..=9.0).contains(kp))
            .unwrap_or(2.0);

        Self {
            noaa_url: lookup("STELLAR_NOAA_URL")
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| DEFAULT_NOAA_URL.to_string()),
            osrm_url: lookup("STELLAR_OSRM_URL")
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| DEFAULT_OSRM_URL.to_string()),
            http_timeout: Duration::from_secs(
                lookup("STELLAR_HTTP_TIMEOUT_S")
                    .and_then(|s| s.trim().parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(10),
            ),
            fallback_kp,
            grid_size: lookup("STELLAR_GRID_SIZE")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(30),
        }
    }
}
