use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use weathervane_core::{
    AppConfig, Config, ExportSettings, Location, OpenWeather, Order, Pipeline, Store,
    export_recent,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weathervane", version, about = "Weather polling ETL")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the configured targets, persist observations, export the recent window.
    Run(RunArgs),

    /// Store the OpenWeather API key.
    Configure,

    /// One-off export of the recent window from an existing store.
    Export {
        /// Lookback window in days.
        #[arg(long, default_value_t = 7)]
        days: i64,

        #[arg(long, default_value = "data/weather.db")]
        db: PathBuf,

        #[arg(long, default_value = "data/exports")]
        export_dir: PathBuf,

        /// Skip the secondary Parquet file.
        #[arg(long)]
        no_parquet: bool,
    },

    /// Print recent observations, oldest first.
    Recent {
        /// Lookback window in days.
        #[arg(long, default_value_t = 7)]
        days: i64,

        #[arg(long, default_value = "data/weather.db")]
        db: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Run a single tick and exit.
    #[arg(long)]
    pub once: bool,

    /// Seconds to sleep between polls.
    #[arg(long, default_value_t = 86_400)]
    pub interval_secs: u64,

    /// Lookback window in days for each export; 0 disables exporting.
    #[arg(long, default_value_t = 7)]
    pub days: i64,

    #[arg(long, default_value = "data/weather.db")]
    pub db: PathBuf,

    #[arg(long, default_value = "data/exports")]
    pub export_dir: PathBuf,

    /// JSON list of cities to poll.
    #[arg(long, default_value = "cities.json")]
    pub cities: PathBuf,

    /// Poll a single city instead of the configured list.
    #[arg(long, requires = "lat")]
    pub city: Option<String>,

    #[arg(long, requires = "lon")]
    pub lat: Option<f64>,

    #[arg(long, requires = "city")]
    pub lon: Option<f64>,

    /// Skip the secondary Parquet export.
    #[arg(long)]
    pub no_parquet: bool,

    /// Override the stored API key for this run.
    #[arg(long)]
    pub api_key: Option<String>,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Run(args) => run_pipeline(args).await,
            Command::Configure => configure(),
            Command::Export { days, db, export_dir, no_parquet } => {
                export_once(days, db, export_dir, !no_parquet).await
            }
            Command::Recent { days, db } => print_recent(days, db).await,
        }
    }
}

async fn run_pipeline(args: RunArgs) -> Result<()> {
    let file_cfg = Config::load()?;
    let api_key = args.api_key.or(file_cfg.api_key);

    let target_override = match (args.city, args.lat, args.lon) {
        (Some(city_name), Some(latitude), Some(longitude)) => {
            Some(Location { city_name, latitude, longitude })
        }
        _ => None,
    };

    let config = AppConfig {
        api_key: api_key.clone(),
        poll_interval_secs: args.interval_secs,
        run_once: args.once,
        export_days: args.days,
        db_path: args.db,
        export_dir: args.export_dir,
        cities_config: args.cities,
        target_override,
        parquet: !args.no_parquet,
    };

    let store = Store::open(&config.db_path).await?;
    let source = OpenWeather::new(api_key)?;
    let pipeline = Pipeline::new(config, store, Box::new(source));

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    pipeline.run(shutdown).await
}

fn configure() -> Result<()> {
    let mut cfg = Config::load()?;

    let key = inquire::Text::new("OpenWeather API key:").prompt()?;
    cfg.api_key = Some(key.trim().to_string());
    cfg.save()?;

    println!("Saved API key to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn export_once(days: i64, db: PathBuf, export_dir: PathBuf, parquet: bool) -> Result<()> {
    let store = Store::open(&db).await?;
    store.ensure_schema().await?;

    let settings = ExportSettings { dir: export_dir, parquet };
    export_recent(&store, &settings, days, Utc::now()).await
}

async fn print_recent(days: i64, db: PathBuf) -> Result<()> {
    let store = Store::open(&db).await?;
    store.ensure_schema().await?;

    let cutoff = chrono::Duration::try_days(days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .with_context(|| format!("Lookback window of {days} day(s) is out of range"))?;
    let rows = store.query_since(cutoff, Order::Asc).await?;

    if rows.is_empty() {
        println!("No observations in the last {days} day(s). Run the ETL first.");
        return Ok(());
    }

    for row in rows {
        let obs = &row.observation;
        println!(
            "{}  {:<16} {:>6.1} C {:>6.1} F  wind {:>5.1} m/s",
            obs.fetched_at.format("%Y-%m-%d %H:%M"),
            obs.city_name,
            obs.temperature_c,
            obs.temperature_f,
            obs.wind_speed,
        );
    }

    Ok(())
}
