//! The tick loop: resolve targets, fetch and normalize each one
//! independently, append the successes as one batch, export the recent
//! window, then sleep or terminate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use anyhow::Result;

use crate::{
    config::AppConfig,
    error::FetchError,
    export::{self, ExportSettings},
    model::{Location, Observation},
    provider::WeatherSource,
    store::Store,
    targets,
};

/// Time source for the pipeline. Injectable so tests can run many ticks
/// without real delays.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time and real sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// What one tick did: rows appended and the per-target failures collected
/// along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub inserted: usize,
    pub errors: Vec<String>,
}

/// Orchestrates the ETL. Holds no state across ticks beyond the store
/// itself; the target list is re-resolved fresh every tick so config can
/// change between polls without a restart.
pub struct Pipeline {
    config: AppConfig,
    store: Store,
    source: Box<dyn WeatherSource>,
    clock: Box<dyn Clock>,
}

impl Pipeline {
    pub fn new(config: AppConfig, store: Store, source: Box<dyn WeatherSource>) -> Self {
        Self::with_clock(config, store, source, Box::new(SystemClock))
    }

    pub fn with_clock(
        config: AppConfig,
        store: Store,
        source: Box<dyn WeatherSource>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self { config, store, source, clock }
    }

    /// Run the loop until single-shot completion or cancellation.
    ///
    /// Cancellation is only observed during the inter-tick sleep; a tick in
    /// flight always completes (and commits) first, so no work is lost.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        self.store.ensure_schema().await?;

        loop {
            self.run_tick().await?;

            if self.config.run_once {
                return Ok(());
            }

            let interval = Duration::from_secs(self.config.poll_interval_secs);
            info!(seconds = self.config.poll_interval_secs, "sleeping before next poll");

            tokio::select! {
                () = self.clock.sleep(interval) => {}
                () = shutdown.cancelled() => {
                    info!("shutdown requested; stopping poll loop");
                    return Ok(());
                }
            }
        }
    }

    /// One full pass over all targets.
    ///
    /// A failing target is recorded and never aborts its siblings; the batch
    /// keeps the resolver's target order. Store and CSV-export failures are
    /// serious and propagate, terminating the tick.
    pub async fn run_tick(&self) -> Result<TickReport> {
        // Resolved once and reused for both fetching and the summary log.
        let targets = targets::resolve(&self.config);

        let mut batch: Vec<Observation> = Vec::with_capacity(targets.len());
        let mut errors: Vec<String> = Vec::new();

        for target in &targets {
            match self.fetch_one(target).await {
                Ok(obs) => {
                    info!(
                        city = %target.city_name,
                        latitude = target.latitude,
                        longitude = target.longitude,
                        "fetched current weather"
                    );
                    batch.push(obs);
                }
                Err(err) => errors.push(format!("{}: {err}", target.city_name)),
            }
        }

        if batch.is_empty() {
            info!("no data inserted; all fetches failed");
        } else {
            self.store.append(&batch).await?;

            let cities: Vec<&str> = batch.iter().map(|o| o.city_name.as_str()).collect();
            info!(
                rows = batch.len(),
                cities = ?cities,
                db = %self.config.db_path.display(),
                "inserted batch"
            );

            let settings = ExportSettings {
                dir: self.config.export_dir.clone(),
                parquet: self.config.parquet,
            };
            export::export_recent(&self.store, &settings, self.config.export_days, self.clock.now())
                .await?;
        }

        for err in &errors {
            warn!("{err}");
        }

        Ok(TickReport { inserted: batch.len(), errors })
    }

    async fn fetch_one(&self, target: &Location) -> Result<Observation, FetchError> {
        let payload = self.source.current(target.latitude, target.longitude).await?;
        Observation::from_current(&payload, &target.city_name, self.clock.now())
    }
}
