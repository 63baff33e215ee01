//! Core library for the `weathervane` polling ETL.
//!
//! This crate defines:
//! - Configuration (stored credentials and the per-run [`AppConfig`])
//! - Target resolution (override, cities file, built-in defaults)
//! - The OpenWeather fetcher and the normalized [`Observation`] model
//! - The append-only SQLite store and the flat-file exporter
//! - The [`Pipeline`] driver that ties one tick together and loops
//!
//! It is used by `weathervane-cli`, but can also be reused by other binaries
//! or services.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod store;
pub mod targets;

pub use config::{AppConfig, Config};
pub use error::FetchError;
pub use export::{ExportSettings, export_recent};
pub use model::{CurrentWeather, Location, Observation};
pub use pipeline::{Clock, Pipeline, SystemClock, TickReport};
pub use provider::{OpenWeather, WeatherSource};
pub use store::{Order, Store, StoredObservation};
