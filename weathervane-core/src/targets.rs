//! Three-tier resolution of the cities to poll.

use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use tracing::warn;

use crate::{config::AppConfig, model::Location};

/// Built-in fallback targets, used when neither an override nor a usable
/// cities file is configured.
pub fn default_targets() -> Vec<Location> {
    vec![
        Location {
            city_name: "Amsterdam".to_string(),
            latitude: 52.3676,
            longitude: 4.9041,
        },
        Location {
            city_name: "Rotterdam".to_string(),
            latitude: 51.9244,
            longitude: 4.4777,
        },
        Location {
            city_name: "Eindhoven".to_string(),
            latitude: 51.4416,
            longitude: 5.4697,
        },
    ]
}

/// Resolve the ordered target list for one tick. Never returns an empty list.
///
/// Precedence: single-target override, then the cities JSON file, then the
/// built-in defaults. A cities file with any malformed entry is rejected as
/// a whole (warned, fall through); so is an empty one.
pub fn resolve(config: &AppConfig) -> Vec<Location> {
    if let Some(target) = &config.target_override {
        return vec![target.clone()];
    }

    let path = &config.cities_config;
    if path.exists() {
        match load_cities_file(path) {
            Ok(cities) if !cities.is_empty() => return cities,
            Ok(_) => warn!(
                path = %path.display(),
                "cities file is empty; falling back to built-in defaults"
            ),
            Err(err) => warn!(
                path = %path.display(),
                error = %err,
                "failed to load cities file; falling back to built-in defaults"
            ),
        }
    }

    default_targets()
}

fn load_cities_file(path: &Path) -> Result<Vec<Location>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read cities file: {}", path.display()))?;

    let value: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse cities file: {}", path.display()))?;

    if !value.is_array() {
        bail!("cities config must be a JSON array of objects");
    }

    // One malformed entry rejects the whole file; a partially-valid list is
    // never partially accepted.
    let cities: Vec<Location> = serde_json::from_value(value)
        .context("City entry missing required keys (city_name, latitude, longitude)")?;

    Ok(cities)
}
