//! OSRM road routing client.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use stellar_core::models::GeoPoint;
use stellar_core::service::RoadGeometry;

#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    geometry: LineString,
}

#[derive(Debug, Deserialize)]
struct LineString {
    /// `[lon, lat]` pairs.
    coordinates: Vec<[f64; 2]>,
}

/// HTTP client for an OSRM `route/v1` service.
pub struct OsrmClient {
    client: Client,
    base_url: String,
}

impl OsrmClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .context("Failed to create HTTP client")?,
            base_url: base_url.into(),
        })
    }

    pub fn route_url(&self, start: GeoPoint, end: GeoPoint) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson&alternatives=true",
            self.base_url, start.lon, start.lat, end.lon, end.lat
        )
    }

    /// Primary route and alternatives between two points.
    pub async fn fetch_routes(&self, start: GeoPoint, end: GeoPoint) -> Result<RoadGeometry> {
        let url = self.route_url(start, end);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach routing service")?;

        // OSRM reports NoRoute with a 400 and a JSON body.
        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read routing response")?;
        let payload: Value = match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(_) if !status.is_success() => {
                return Err(anyhow::anyhow!("Routing request failed: {} {}", status, body));
            }
            Err(err) => return Err(err).context("Failed to parse routing response"),
        };

        let geometry = parse_routes(&payload)?;
        tracing::debug!(?status, routes = route_count(&geometry), "OSRM routes fetched");
        Ok(geometry)
    }
}

fn route_count(geometry: &RoadGeometry) -> usize {
    match geometry {
        RoadGeometry::Routes(routes) => routes.len(),
        _ => 0,
    }
}

/// Convert an OSRM route response into road geometry.
pub fn parse_routes(payload: &Value) -> Result<RoadGeometry> {
    let response = RouteResponse::deserialize(payload).context("Unexpected routing response")?;
    match response.code.as_str() {
        "Ok" => {
            let routes: Vec<Vec<GeoPoint>> = response
                .routes
                .into_iter()
                .map(|route| {
                    route
                        .geometry
                        .coordinates
                        .into_iter()
                        .map(|[lon, lat]| GeoPoint { lat, lon })
                        .collect::<Vec<_>>()
                })
                .filter(|path| path.len() >= 2)
                .collect();
            if routes.is_empty() {
                Ok(RoadGeometry::NoRoute)
            } else {
                Ok(RoadGeometry::Routes(routes))
            }
        }
        "NoRoute" | "NoSegment" => Ok(RoadGeometry::NoRoute),
        code => Err(anyhow::anyhow!(
            "Routing service returned {}: {}",
            code,
            response.message.unwrap_or_default()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn routes_are_converted_to_lat_lon() {
        let payload = json!({
            "code": "Ok",
            "routes": [
                {"geometry": {"type": "LineString", "coordinates": [[-122.42, 37.77], [-122.425, 37.775], [-122.43, 37.78]]}, "distance": 1400.2},
                {"geometry": {"type": "LineString", "coordinates": [[-122.42, 37.77], [-122.43, 37.78]]}, "distance": 1500.0}
            ]
        });
        let RoadGeometry::Routes(routes) = parse_routes(&payload).unwrap() else {
            panic!("expected routes");
        };
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0][0], GeoPoint { lat: 37.77, lon: -122.42 });
        assert_eq!(routes[0].len(), 3);
    }

    #[test]
    fn no_route_codes_map_to_no_route() {
        let payload = json!({"code": "NoRoute", "message": "Impossible route between points"});
        assert_eq!(parse_routes(&payload).unwrap(), RoadGeometry::NoRoute);
        let empty = json!({"code": "Ok", "routes": []});
        assert_eq!(parse_routes(&empty).unwrap(), RoadGeometry::NoRoute);
    }

    #[test]
    fn other_codes_are_errors() {
        let payload = json!({"code": "InvalidQuery", "message": "Query string malformed"});
        let err = parse_routes(&payload).unwrap_err();
        assert!(err.to_string().contains("InvalidQuery"));
        assert!(parse_routes(&json!({"routes": []})).is_err());
    }

    #[test]
    fn route_url_orders_lon_before_lat() {
        let client = OsrmClient::new("http://osrm.local", Duration::from_secs(1)).unwrap();
        let url = client.route_url(
            GeoPoint { lat: 37.77, lon: -122.42 },
            GeoPoint { lat: 37.78, lon: -122.43 },
        );
        assert_eq!(
            url,
            "http://osrm.local/route/v1/driving/-122.42,37.77;-122.43,37.78?overview=full&geometries=geojson&alternatives=true"
        );
    }
}
