//! Command line support: configuration and the external data providers.

pub mod config;
pub mod noaa;
pub mod osrm;

pub use config::Config;
pub use noaa::{fallback_observation, NoaaClient};
pub use osrm::OsrmClient;
