use crate::{error::FetchError, model::CurrentWeather};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

pub use openweather::OpenWeather;

/// A source of current weather for a coordinate pair.
///
/// The production implementation is [`OpenWeather`]; tests inject scripted
/// sources so the pipeline can be driven without a network.
///
/// No retries belong here: one call is one attempt, and the retry policy
/// (if any) lives with the tick loop.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn current(&self, latitude: f64, longitude: f64) -> Result<CurrentWeather, FetchError>;
}
