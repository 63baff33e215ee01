use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// A named geographic point to poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Raw OpenWeather current-weather payload, reduced to the fields this
/// pipeline reads. Everything is optional so a malformed response surfaces
/// as a [`FetchError::Validation`] instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentWeather {
    pub main: Option<MainBlock>,
    pub wind: Option<WindBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MainBlock {
    pub temp: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindBlock {
    pub speed: Option<f64>,
}

impl CurrentWeather {
    pub fn temperature_c(&self) -> Option<f64> {
        self.main.as_ref().and_then(|m| m.temp)
    }

    pub fn wind_speed(&self) -> Option<f64> {
        self.wind.as_ref().and_then(|w| w.speed)
    }

    /// Check that both required numeric fields are present.
    pub fn ensure_required(&self) -> Result<(), FetchError> {
        if self.temperature_c().is_none() {
            return Err(FetchError::missing_field("main.temp"));
        }
        if self.wind_speed().is_none() {
            return Err(FetchError::missing_field("wind.speed"));
        }
        Ok(())
    }
}

/// Canonical persisted record: one weather reading for one city at one
/// instant. Created once by [`Observation::from_current`] and never updated;
/// the store is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub city_name: String,
    pub temperature_c: f64,
    pub temperature_f: f64,
    pub wind_speed: f64,
    pub fetched_at: DateTime<Utc>,
}

impl Observation {
    /// Normalize a raw payload into an observation.
    ///
    /// `fetched_at` is the injected capture instant, not the provider's own
    /// timestamp (the payload's `dt` field is not read by this system).
    /// Re-checks the required fields beyond the fetcher's own validation.
    pub fn from_current(
        payload: &CurrentWeather,
        city_name: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self, FetchError> {
        let temperature_c = payload
            .temperature_c()
            .ok_or_else(|| FetchError::missing_field("main.temp"))?;
        let wind_speed = payload
            .wind_speed()
            .ok_or_else(|| FetchError::missing_field("wind.speed"))?;

        Ok(Self {
            city_name: city_name.to_string(),
            temperature_c,
            temperature_f: temperature_c * 9.0 / 5.0 + 32.0,
            wind_speed,
            fetched_at,
        })
    }
}
