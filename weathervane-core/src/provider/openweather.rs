use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::{error::FetchError, model::CurrentWeather};

use super::WeatherSource;

const API_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// OpenWeather current-weather client.
#[derive(Debug, Clone)]
pub struct OpenWeather {
    api_key: Option<String>,
    http: Client,
}

impl OpenWeather {
    /// The key is checked per fetch, not here, so a misconfigured run still
    /// reports the problem per-target instead of refusing to start.
    pub fn new(api_key: Option<String>) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { api_key, http })
    }
}

#[async_trait]
impl WeatherSource for OpenWeather {
    async fn current(&self, latitude: f64, longitude: f64) -> Result<CurrentWeather, FetchError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(FetchError::Configuration)?;

        let res = self
            .http
            .get(API_URL)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("appid", api_key.to_string()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Network(format!("Failed to send request to OpenWeather: {e}")))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| FetchError::Network(format!("Failed to read OpenWeather response body: {e}")))?;

        if !status.is_success() {
            return Err(FetchError::Network(format!(
                "OpenWeather request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        let payload: CurrentWeather = serde_json::from_str(&body)
            .map_err(|e| FetchError::Validation(format!("Failed to parse OpenWeather JSON: {e}")))?;

        payload.ensure_required()?;

        Ok(payload)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }

    // Never cut inside a multibyte character.
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &body[..end])
}
