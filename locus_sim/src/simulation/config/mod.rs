// locus_sim/src/simulation/config/mod.rs

//! Loading and validating scenario configuration from disk.

pub mod structs;

use std::path::Path;

use figment::{
    providers::{Format, Toml},
    Figment,
};
use tracing::info;

pub use structs::ScenarioConfig;

/// Reads a scenario file. Sections and keys missing from the file keep their defaults.
pub fn load_scenario(path: &Path) -> Result<ScenarioConfig, figment::Error> {
    info!("Loading scenario from: {}", path.display());
    Figment::new().merge(Toml::file(path)).extract()
}

/// Parses a scenario from TOML text.
pub fn parse_scenario(text: &str) -> Result<ScenarioConfig, toml::de::Error> {
    toml::from_str(text)
}
