use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::model::Location;

/// Credentials stored on disk (TOML), written by `weathervane configure`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// OpenWeather API key.
    pub api_key: Option<String>,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weathervane", "weathervane")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Runtime configuration for one pipeline run, built once at process start
/// and passed into the driver. No component reads ambient process state.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// OpenWeather API key; a fetch without one fails per-target.
    pub api_key: Option<String>,

    /// Seconds to sleep between polls.
    pub poll_interval_secs: u64,

    /// Run a single tick and exit instead of looping.
    pub run_once: bool,

    /// Trailing days included in each export; `<= 0` disables exporting.
    pub export_days: i64,

    /// SQLite database file.
    pub db_path: PathBuf,

    /// Directory the export files are written to.
    pub export_dir: PathBuf,

    /// JSON list of cities to poll (second resolver tier).
    pub cities_config: PathBuf,

    /// Single-target override (first resolver tier).
    pub target_override: Option<Location>,

    /// Whether the secondary Parquet export is enabled.
    pub parquet: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            poll_interval_secs: 86_400,
            run_once: false,
            export_days: 7,
            db_path: PathBuf::from("data/weather.db"),
            export_dir: PathBuf::from("data/exports"),
            cities_config: PathBuf::from("cities.json"),
            target_override: None,
            parquet: true,
        }
    }
}
