//! NOAA SWPC space-weather feed client.

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use stellar_core::models::DataSource;
use stellar_core::service::Observation;

const KP_PRODUCT: &str = "products/noaa-planetary-k-index.json";
const PLASMA_PRODUCT: &str = "products/solar-wind/plasma-2-hour.json";

/// Latest solar wind plasma reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarWind {
    pub speed_kms: Option<f64>,
    pub density: Option<f64>,
}

/// HTTP client for the NOAA SWPC JSON products.
pub struct NoaaClient {
    client: Client,
    base_url: String,
}

impl NoaaClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .context("Failed to create HTTP client")?,
            base_url: base_url.into(),
        })
    }

    async fn get_json(&self, product: &str) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, product);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "NOAA request failed: {} {}",
                status,
                body
            ));
        }

        response
            .json::<Value>()
            .await
            .with_context(|| format!("Failed to parse {}", url))
    }

    /// Most recent planetary Kp.
    pub async fn fetch_latest_kp(&self) -> Result<f64> {
        let payload = self.get_json(KP_PRODUCT).await?;
        parse_latest_kp(&payload).context("Kp product contained no usable rows")
    }

    pub async fn fetch_solar_wind(&self) -> Result<SolarWind> {
        let payload = self.get_json(PLASMA_PRODUCT).await?;
        parse_latest_solar_wind(&payload).context("Plasma product contained no usable rows")
    }

    /// Current conditions. Kp is required; solar wind is best effort.
    pub async fn current_observation(&self) -> Result<Observation> {
        let kp = self.fetch_latest_kp().await?;
        let wind = match self.fetch_solar_wind().await {
            Ok(wind) => wind,
            Err(err) => {
                tracing::warn!("Solar wind unavailable, continuing without it: {:#}", err);
                SolarWind {
                    speed_kms: None,
                    density: None,
                }
            }
        };
        tracing::debug!(kp, speed = ?wind.speed_kms, "NOAA conditions fetched");

        Ok(Observation {
            kp_index: kp,
            solar_wind_speed: wind.speed_kms,
            solar_wind_density: wind.density,
            source: DataSource::Noaa,
            alerts: Vec::new(),
            timestamp: None,
        })
    }
}

/// Observation used when the feed cannot be reached.
pub fn fallback_observation(kp: f64, reason: &str) -> Observation {
    Observation {
        kp_index: kp,
        solar_wind_speed: None,
        solar_wind_density: None,
        source: DataSource::Fallback,
        alerts: vec![format!(
            "Space weather feed unavailable ({reason}); using fallback Kp {kp:.1}"
        )],
        timestamp: None,
    }
}

fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Column index of `name` in a header row, case-insensitively.
fn column(header: &[Value], name: &str) -> Option<usize> {
    header
        .iter()
        .position(|cell| cell.as_str().is_some_and(|s| s.eq_ignore_ascii_case(name)))
}

/// Latest Kp from either product layout: a header row followed by string
/// rows, or an array of objects with a `Kp` field.
pub fn parse_latest_kp(payload: &Value) -> Option<f64> {
    let rows = payload.as_array()?;
    let kp = match rows.first()? {
        Value::Array(header) => {
            let idx = column(header, "Kp").unwrap_or(1);
            rows.iter()
                .skip(1)
                .rev()
                .find_map(|row| row.as_array().and_then(|r| r.get(idx)).and_then(number))
        }
        Value::Object(_) => rows
            .iter()
            .rev()
            .find_map(|row| row.get("Kp").or_else(|| row.get("kp_index")).and_then(number)),
        _ => None,
    }?;
    Some(kp.clamp(0.0, 9.0))
}

/// Latest row of the plasma product with a usable speed or density.
pub fn parse_latest_solar_wind(payload: &Value) -> Option<SolarWind> {
    let rows = payload.as_array()?;
    let header = rows.first()?.as_array()?;
    let speed_idx = column(header, "speed");
    let density_idx = column(header, "density");
    if speed_idx.is_none() && density_idx.is_none() {
        return None;
    }

    rows.iter().skip(1).rev().find_map(|row| {
        let row = row.as_array()?;
        let pick = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .and_then(number)
                .filter(|v| *v >= 0.0)
        };
        let wind = SolarWind {
            speed_kms: pick(speed_idx),
            density: pick(density_idx),
        };
        (wind.speed_kms.is_some() || wind.density.is_some()).then_some(wind)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kp_from_header_rows() {
        let payload = json!([
            ["time_tag", "Kp", "a_running", "station_count"],
            ["2024-05-10 12:00:00.000", "5.33", "56", "8"],
            ["2024-05-10 15:00:00.000", "8.67", "207", "8"],
        ]);
        assert_eq!(parse_latest_kp(&payload), Some(8.67));
    }

    #[test]
    fn kp_from_object_rows_skips_nulls() {
        let payload = json!([
            {"time_tag": "2024-05-10T12:00:00", "Kp": 4.0},
            {"time_tag": "2024-05-10T15:00:00", "Kp": null},
        ]);
        assert_eq!(parse_latest_kp(&payload), Some(4.0));
    }

    #[test]
    fn kp_rejects_unexpected_shapes() {
        assert_eq!(parse_latest_kp(&json!({"Kp": 3})), None);
        assert_eq!(parse_latest_kp(&json!([])), None);
        assert_eq!(parse_latest_kp(&json!([["time_tag", "Kp"]])), None);
    }

    #[test]
    fn solar_wind_uses_header_columns() {
        let payload = json!([
            ["time_tag", "density", "speed", "temperature"],
            ["2024-05-10 15:00:00.000", "4.1", "702.3", "310000"],
            ["2024-05-10 15:01:00.000", null, null, null],
        ]);
        let wind = parse_latest_solar_wind(&payload).unwrap();
        assert_eq!(wind.speed_kms, Some(702.3));
        assert_eq!(wind.density, Some(4.1));
    }

    #[test]
    fn fallback_is_tagged_and_explained() {
        let observation = fallback_observation(2.0, "timeout");
        assert_eq!(observation.source, DataSource::Fallback);
        assert!(observation.alerts[0].contains("timeout"));
    }
}
