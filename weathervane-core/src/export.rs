//! Flat-file exports of a recent window of the store.
//!
//! CSV is the primary format and its failures propagate; Parquet is the
//! optional secondary format, gated behind the `parquet` cargo feature and
//! an [`ExportSettings`] flag, and its failures are logged but never fatal.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tracing::info;

use crate::store::{Order, Store, StoredObservation};

/// Where and how exports are written.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub dir: PathBuf,
    pub parquet: bool,
}

/// Export all rows from the trailing `days` window, newest first.
///
/// `days <= 0` disables exporting; an empty window logs and returns without
/// creating any file. Files are named by the window and overwritten on each
/// export.
pub async fn export_recent(
    store: &Store,
    settings: &ExportSettings,
    days: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    if days <= 0 {
        return Ok(());
    }

    let cutoff = Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .with_context(|| format!("Export window of {days} day(s) is out of range"))?;
    let rows = store.query_since(cutoff, Order::Desc).await?;

    if rows.is_empty() {
        info!(days, "no rows to export");
        return Ok(());
    }

    fs::create_dir_all(&settings.dir).with_context(|| {
        format!("Failed to create export directory: {}", settings.dir.display())
    })?;

    let csv_path = settings.dir.join(format!("weather_last_{days}d.csv"));
    write_csv(&rows, &csv_path)
        .with_context(|| format!("Failed to write CSV export: {}", csv_path.display()))?;
    info!(path = %csv_path.display(), rows = rows.len(), "exported CSV");

    if settings.parquet {
        let parquet_path = settings.dir.join(format!("weather_last_{days}d.parquet"));
        write_parquet_or_log(&rows, &parquet_path);
    }

    Ok(())
}

fn write_csv(rows: &[StoredObservation], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "id",
        "city_name",
        "temperature_c",
        "temperature_f",
        "wind_speed",
        "fetched_at",
    ])?;

    for row in rows {
        let obs = &row.observation;
        wtr.write_record([
            row.id.to_string(),
            obs.city_name.clone(),
            obs.temperature_c.to_string(),
            obs.temperature_f.to_string(),
            obs.wind_speed.to_string(),
            obs.fetched_at.to_rfc3339_opts(SecondsFormat::Micros, false),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(feature = "parquet")]
fn write_parquet_or_log(rows: &[StoredObservation], path: &Path) {
    match write_parquet(rows, path) {
        Ok(()) => info!(path = %path.display(), rows = rows.len(), "exported Parquet"),
        Err(err) => tracing::warn!(error = %err, "Parquet export skipped"),
    }
}

#[cfg(not(feature = "parquet"))]
fn write_parquet_or_log(_rows: &[StoredObservation], _path: &Path) {
    info!("Parquet export skipped (built without the `parquet` feature)");
}

#[cfg(feature = "parquet")]
fn write_parquet(rows: &[StoredObservation], path: &Path) -> Result<()> {
    use std::{fs::File, sync::Arc};

    use arrow::{
        array::{ArrayRef, Float64Array, Int64Array, StringArray},
        record_batch::RecordBatch,
    };
    use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};

    let ids = Int64Array::from(rows.iter().map(|r| r.id).collect::<Vec<_>>());
    let cities = StringArray::from(
        rows.iter().map(|r| r.observation.city_name.as_str()).collect::<Vec<_>>(),
    );
    let temps_c = Float64Array::from(
        rows.iter().map(|r| r.observation.temperature_c).collect::<Vec<_>>(),
    );
    let temps_f = Float64Array::from(
        rows.iter().map(|r| r.observation.temperature_f).collect::<Vec<_>>(),
    );
    let wind = Float64Array::from(
        rows.iter().map(|r| r.observation.wind_speed).collect::<Vec<_>>(),
    );
    let fetched = StringArray::from(
        rows.iter()
            .map(|r| r.observation.fetched_at.to_rfc3339_opts(SecondsFormat::Micros, false))
            .collect::<Vec<_>>(),
    );

    let columns: Vec<(&str, ArrayRef)> = vec![
        ("id", Arc::new(ids) as ArrayRef),
        ("city_name", Arc::new(cities) as ArrayRef),
        ("temperature_c", Arc::new(temps_c) as ArrayRef),
        ("temperature_f", Arc::new(temps_f) as ArrayRef),
        ("wind_speed", Arc::new(wind) as ArrayRef),
        ("fetched_at", Arc::new(fetched) as ArrayRef),
    ];

    let batch = RecordBatch::try_from_iter(columns)?;

    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Observation;

    fn observation(city: &str, temp: f64, fetched_at: DateTime<Utc>) -> Observation {
        Observation {
            city_name: city.to_string(),
            temperature_c: temp,
            temperature_f: temp * 9.0 / 5.0 + 32.0,
            wind_speed: 3.2,
            fetched_at,
        }
    }

    async fn store_with(rows: &[Observation]) -> Store {
        let store = Store::open_in_memory().await.unwrap();
        store.ensure_schema().await.unwrap();
        store.append(rows).await.unwrap();
        store
    }

    fn settings(dir: &Path, parquet: bool) -> ExportSettings {
        ExportSettings { dir: dir.to_path_buf(), parquet }
    }

    #[tokio::test]
    async fn empty_window_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let store = store_with(&[observation("Old", 5.0, now - Duration::days(10))]).await;

        export_recent(&store, &settings(dir.path(), false), 7, now).await.unwrap();

        assert!(!dir.path().join("weather_last_7d.csv").exists());
        assert!(!dir.path().join("weather_last_7d.parquet").exists());
    }

    #[tokio::test]
    async fn non_positive_days_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let store = store_with(&[observation("Amsterdam", 10.0, now)]).await;

        export_recent(&store, &settings(dir.path(), false), 0, now).await.unwrap();

        assert!(!dir.path().join("weather_last_0d.csv").exists());
    }

    #[tokio::test]
    async fn absurd_day_window_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let store = store_with(&[observation("Amsterdam", 10.0, now)]).await;

        let err = export_recent(&store, &settings(dir.path(), false), i64::MAX, now)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("out of range"));
        assert!(!dir.path().join(format!("weather_last_{}d.csv", i64::MAX)).exists());
    }

    #[tokio::test]
    async fn writes_csv_with_header_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let store = store_with(&[
            observation("Older", 8.0, now - Duration::days(2)),
            observation("Newer", 10.0, now - Duration::days(1)),
        ])
        .await;

        export_recent(&store, &settings(dir.path(), false), 7, now).await.unwrap();

        let csv_path = dir.path().join("weather_last_7d.csv");
        let contents = fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();

        assert_eq!(
            lines[0],
            "id,city_name,temperature_c,temperature_f,wind_speed,fetched_at"
        );
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("Newer"));
        assert!(lines[2].contains("Older"));
    }

    #[tokio::test]
    async fn export_overwrites_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let store = store_with(&[observation("Amsterdam", 10.0, now)]).await;

        export_recent(&store, &settings(dir.path(), false), 7, now).await.unwrap();
        store.append(&[observation("Rotterdam", 11.0, now)]).await.unwrap();
        export_recent(&store, &settings(dir.path(), false), 7, now).await.unwrap();

        let contents = fs::read_to_string(dir.path().join("weather_last_7d.csv")).unwrap();
        assert_eq!(contents.lines().count(), 3);
        assert!(contents.contains("Rotterdam"));
    }

    #[cfg(feature = "parquet")]
    #[tokio::test]
    async fn writes_parquet_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let store = store_with(&[observation("Amsterdam", 10.0, now)]).await;

        export_recent(&store, &settings(dir.path(), true), 7, now).await.unwrap();

        let parquet_path = dir.path().join("weather_last_7d.parquet");
        assert!(parquet_path.exists());
        assert!(fs::metadata(&parquet_path).unwrap().len() > 0);
    }

    #[tokio::test]
    async fn parquet_disabled_by_settings_writes_only_csv() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let store = store_with(&[observation("Amsterdam", 10.0, now)]).await;

        export_recent(&store, &settings(dir.path(), false), 7, now).await.unwrap();

        assert!(dir.path().join("weather_last_7d.csv").exists());
        assert!(!dir.path().join("weather_last_7d.parquet").exists());
    }
}
