//! StellarRoute command line.
//!
//! Evaluates space-weather navigation risk and prints JSON to stdout. Logs go
//! to stderr; set `RUST_LOG` to adjust verbosity.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use stellar_cli::{fallback_observation, Config, NoaaClient, OsrmClient};
use stellar_core::drift::{FailureSeverity, GpsFailureRequest};
use stellar_core::grid_router::PathfinderConfig;
use stellar_core::models::{BoundingBox, GeoPoint, RiskLevel, SpaceWeatherSample};
use stellar_core::scenario::Scenario;
use stellar_core::service::{
    compute_heatmap, compute_routes, compute_weather, simulate_gps_failure, storm_timeline,
    Observation, RoadGeometry, RouteRequest, WeatherContext, WeatherInput,
};
use stellar_core::spatial::bounding_box_around;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Space-weather aware navigation risk engine
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Current space-weather conditions and GPS risk at a location
    Weather {
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
        #[command(flatten)]
        conditions: ConditionsArgs,
    },
    /// Normal, safe, drifted and IMU route variants between two points
    Routes {
        #[arg(long, allow_hyphen_values = true)]
        from_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        from_lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        to_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        to_lon: f64,
        /// Skip the road router and plan on the risk grid
        #[arg(long)]
        grid: bool,
        /// Grid cells per side (default from STELLAR_GRID_SIZE)
        #[arg(long)]
        grid_size: Option<usize>,
        /// Never enter grid cells with normalized risk above this
        #[arg(long)]
        impassable_risk: Option<f64>,
        #[command(flatten)]
        conditions: ConditionsArgs,
    },
    /// Risk heatmap over a bounding box
    Heatmap {
        /// min_lon,min_lat,max_lon,max_lat
        #[arg(long, allow_hyphen_values = true, conflicts_with_all = ["center_lat", "center_lon"])]
        bbox: Option<String>,
        #[arg(long, allow_hyphen_values = true, requires = "center_lon")]
        center_lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "center_lat")]
        center_lon: Option<f64>,
        /// Half-width of the box around the center, in kilometers
        #[arg(long, default_value_t = 5.0)]
        radius_km: f64,
        /// Cell size in degrees
        #[arg(long, default_value_t = 0.02)]
        resolution: f64,
        #[command(flatten)]
        conditions: ConditionsArgs,
    },
    /// Drift trace of a stationary receiver during a GPS failure
    GpsFailure {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Failure duration in seconds
        #[arg(long, default_value_t = 300.0)]
        duration: f64,
        #[arg(long, default_value = "medium")]
        risk_level: RiskLevel,
        #[arg(long, default_value = "medium")]
        severity: FailureSeverity,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Two-hour synthetic storm timeline for a scenario
    Timeline {
        #[arg(long, default_value = "moderate")]
        scenario: Scenario,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Args, Debug)]
struct ConditionsArgs {
    /// Use this Kp instead of the live feed
    #[arg(long, conflicts_with = "simulate")]
    kp: Option<f64>,
    /// Simulate a scenario (normal, moderate, severe) instead of the live feed
    #[arg(long)]
    simulate: Option<Scenario>,
    /// Do not contact external services
    #[arg(long)]
    offline: bool,
    /// Seed for every random draw in this run
    #[arg(long)]
    seed: Option<u64>,
}

impl ConditionsArgs {
    fn rng(&self) -> StdRng {
        seeded_rng(self.seed)
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", rendered);
    Ok(())
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("stellar=info".parse()?)
        .add_directive("stellar_cli=info".parse()?);
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
    Ok(())
}

/// Live observation, or the configured fallback when the feed fails.
async fn observe(config: &Config, offline: bool) -> Observation {
    if offline {
        return fallback_observation(config.fallback_kp, "offline mode");
    }
    let fetched = match NoaaClient::new(config.noaa_url.clone(), config.http_timeout) {
        Ok(client) => client.current_observation().await,
        Err(err) => Err(err),
    };
    match fetched {
        Ok(observation) => observation,
        Err(err) => {
            tracing::warn!("NOAA feed unavailable, using fallback Kp {}: {:#}", config.fallback_kp, err);
            fallback_observation(config.fallback_kp, "feed request failed")
        }
    }
}

async fn resolve_weather(
    args: &ConditionsArgs,
    config: &Config,
    location: Option<GeoPoint>,
    rng: &mut StdRng,
) -> Result<SpaceWeatherSample> {
    let input = match (args.simulate, args.kp) {
        (Some(scenario), _) => WeatherInput::Simulated(scenario),
        (None, Some(kp)) => WeatherInput::Observed(Observation::manual(kp)),
        (None, None) => WeatherInput::Observed(observe(config, args.offline).await),
    };
    let sample = compute_weather(input, location, Utc::now(), rng)?;
    tracing::info!(
        kp = sample.kp_index,
        risk = %sample.risk_level,
        source = ?sample.source,
        "Space weather resolved"
    );
    Ok(sample)
}

async fn fetch_road(config: &Config, start: GeoPoint, end: GeoPoint) -> RoadGeometry {
    let fetched = match OsrmClient::new(config.osrm_url.clone(), config.http_timeout) {
        Ok(client) => client.fetch_routes(start, end).await,
        Err(err) => Err(err),
    };
    fetched.unwrap_or_else(|err| {
        tracing::warn!("Road router unavailable, planning on the risk grid: {:#}", err);
        RoadGeometry::Unavailable
    })
}

fn parse_bbox(raw: &str) -> Result<BoundingBox> {
    let values: Vec<f64> = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Invalid bbox '{}'", raw))?;
    let corners: [f64; 4] = values
        .try_into()
        .map_err(|_| anyhow::anyhow!("bbox needs exactly four values: min_lon,min_lat,max_lon,max_lat"))?;
    Ok(BoundingBox::try_from(corners)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;
    let config = Config::from_env();
    tracing::debug!(?config, "Configuration loaded");

    match cli.command {
        Command::Weather {
            lat,
            lon,
            conditions,
        } => {
            let location = match (lat, lon) {
                (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)?),
                (None, None) => None,
                _ => anyhow::bail!("--lat and --lon must be given together"),
            };
            let mut rng = conditions.rng();
            let sample = resolve_weather(&conditions, &config, location, &mut rng).await?;
            print_json(&sample)?;
        }
        Command::Routes {
            from_lat,
            from_lon,
            to_lat,
            to_lon,
            grid,
            grid_size,
            impassable_risk,
            conditions,
        } => {
            let start = GeoPoint::new(from_lat, from_lon)?;
            let end = GeoPoint::new(to_lat, to_lon)?;
            let mut rng = conditions.rng();
            let sample = resolve_weather(&conditions, &config, Some(start), &mut rng).await?;

            let road = if grid || conditions.offline {
                RoadGeometry::Unavailable
            } else {
                fetch_road(&config, start, end).await
            };
            let request = RouteRequest {
                start,
                end,
                conditions: WeatherContext::from_sample(&sample),
                road,
                seed: conditions.seed,
                config: PathfinderConfig {
                    grid_size: grid_size.unwrap_or(config.grid_size),
                    impassable_risk,
                    ..PathfinderConfig::default()
                },
            };
            let routes = compute_routes(request)?;
            tracing::info!(
                strategy = ?routes.metadata.strategy,
                fallback = routes.metadata.straight_line_fallback,
                normal_risk = routes.normal.metrics.total_risk_score,
                safe_risk = routes.safe.metrics.total_risk_score,
                "Routes computed"
            );
            print_json(&serde_json::json!({
                "conditions": sample,
                "routes": routes,
            }))?;
        }
        Command::Heatmap {
            bbox,
            center_lat,
            center_lon,
            radius_km,
            resolution,
            conditions,
        } => {
            let bbox = match (bbox, center_lat, center_lon) {
                (Some(raw), _, _) => parse_bbox(&raw)?,
                (None, Some(lat), Some(lon)) => {
                    bounding_box_around(GeoPoint::new(lat, lon)?, radius_km * 1000.0)
                }
                _ => anyhow::bail!("give either --bbox or --center-lat/--center-lon"),
            };
            let mut rng = conditions.rng();
            let sample = resolve_weather(&conditions, &config, Some(bbox.center()), &mut rng).await?;
            let context = WeatherContext::from_sample(&sample);
            let heatmap = compute_heatmap(bbox, resolution, context.kp_index, context.scenario)?;
            tracing::info!(
                rows = heatmap.metadata.rows,
                cols = heatmap.metadata.cols,
                resolution = heatmap.metadata.resolution_deg,
                "Heatmap built"
            );
            print_json(&heatmap)?;
        }
        Command::GpsFailure {
            lat,
            lon,
            duration,
            risk_level,
            severity,
            seed,
        } => {
            let report = simulate_gps_failure(&GpsFailureRequest {
                start: GeoPoint::new(lat, lon)?,
                duration_s: duration,
                risk_level,
                severity,
                seed,
            })?;
            tracing::info!(
                samples = report.sample_count,
                max_offset_m = report.trace.max_offset_m,
                "GPS failure simulated"
            );
            print_json(&report)?;
        }
        Command::Timeline { scenario, seed } => {
            let mut rng = seeded_rng(seed);
            let timeline = storm_timeline(scenario, Utc::now(), &mut rng);
            print_json(&serde_json::json!({
                "scenario": scenario,
                "config": scenario.config(),
                "timeline": timeline,
            }))?;
        }
    }

    Ok(())
}
