use thiserror::Error;

/// Failure of a single fetch/normalize attempt for one target.
///
/// These are expected, per-target errors: the pipeline records them and moves
/// on to the next target. Store and primary-export failures are deliberately
/// *not* represented here; those propagate as `anyhow::Error` and terminate
/// the run.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No API key is configured for the weather provider.
    #[error("no OpenWeather API key is configured. Hint: run `weathervane configure` first")]
    Configuration,

    /// The request could not be sent, timed out, or returned a non-2xx status.
    #[error("{0}")]
    Network(String),

    /// The response parsed but lacks a required numeric field.
    #[error("{0}")]
    Validation(String),
}

impl FetchError {
    pub(crate) fn missing_field(name: &str) -> Self {
        FetchError::Validation(format!("API response missing '{name}'"))
    }
}
