//! Append-only SQLite table of observations.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::info;

use crate::model::Observation;

/// Row ordering for [`Store::query_since`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// An [`Observation`] as read back from the store, with its surrogate key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObservation {
    pub id: i64,
    pub observation: Observation,
}

/// Handle to the durable observation table. Rows are only ever appended;
/// nothing here deletes or updates.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        Ok(Self { pool })
    }

    /// In-memory database for tests. A single connection keeps the schema
    /// alive for the pool's lifetime.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        Ok(Self { pool })
    }

    /// Create the observation table if absent. Idempotent; safe to call on
    /// every process start.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS weather (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                city_name TEXT NOT NULL,
                temperature_c REAL,
                temperature_f REAL,
                wind_speed REAL,
                fetched_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create weather table")?;

        Ok(())
    }

    /// Append a batch in one transaction: all rows become visible together,
    /// or none do. An empty batch is a logged no-op.
    pub async fn append(&self, batch: &[Observation]) -> Result<()> {
        if batch.is_empty() {
            info!("no rows to insert");
            return Ok(());
        }

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        for obs in batch {
            sqlx::query(
                "INSERT INTO weather (city_name, temperature_c, temperature_f, wind_speed, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&obs.city_name)
            .bind(obs.temperature_c)
            .bind(obs.temperature_f)
            .bind(obs.wind_speed)
            .bind(format_timestamp(obs.fetched_at))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert row for {}", obs.city_name))?;
        }

        tx.commit().await.context("Failed to commit batch")?;

        Ok(())
    }

    /// All rows with `fetched_at >= cutoff`. An empty result is valid.
    pub async fn query_since(
        &self,
        cutoff: DateTime<Utc>,
        order: Order,
    ) -> Result<Vec<StoredObservation>> {
        // Ties on fetched_at break by insertion order so batches read back
        // in the order they were assembled.
        let sql = match order {
            Order::Asc => {
                "SELECT id, city_name, temperature_c, temperature_f, wind_speed, fetched_at
                 FROM weather WHERE fetched_at >= ?1 ORDER BY fetched_at ASC, id ASC"
            }
            Order::Desc => {
                "SELECT id, city_name, temperature_c, temperature_f, wind_speed, fetched_at
                 FROM weather WHERE fetched_at >= ?1 ORDER BY fetched_at DESC, id DESC"
            }
        };

        let rows = sqlx::query(sql)
            .bind(format_timestamp(cutoff))
            .fetch_all(&self.pool)
            .await
            .context("Failed to query observations")?;

        rows.into_iter()
            .map(|row| {
                let fetched_at: String = row.get("fetched_at");
                let fetched_at = DateTime::parse_from_rfc3339(&fetched_at)
                    .with_context(|| format!("Invalid fetched_at in store: {fetched_at}"))?
                    .with_timezone(&Utc);

                Ok(StoredObservation {
                    id: row.get("id"),
                    observation: Observation {
                        city_name: row.get("city_name"),
                        temperature_c: row.get("temperature_c"),
                        temperature_f: row.get("temperature_f"),
                        wind_speed: row.get("wind_speed"),
                        fetched_at,
                    },
                })
            })
            .collect()
    }

    /// Total row count, mostly useful for reporting and tests.
    pub async fn row_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM weather")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count observations")?;

        Ok(row.get("n"))
    }
}

/// Fixed-width RFC 3339 UTC text, so lexicographic comparison in SQL matches
/// chronological order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn observation(city: &str, temp: f64, fetched_at: DateTime<Utc>) -> Observation {
        Observation {
            city_name: city.to_string(),
            temperature_c: temp,
            temperature_f: temp * 9.0 / 5.0 + 32.0,
            wind_speed: 3.2,
            fetched_at,
        }
    }

    async fn fresh_store() -> Store {
        let store = Store::open_in_memory().await.unwrap();
        store.ensure_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let store = fresh_store().await;
        store.append(&[observation("Amsterdam", 10.0, Utc::now())]).await.unwrap();

        store.ensure_schema().await.unwrap();

        assert_eq!(store.row_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let store = fresh_store().await;
        store.append(&[]).await.unwrap();

        assert_eq!(store.row_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn append_round_trips_values() {
        let store = fresh_store().await;
        let now = Utc::now();
        store.append(&[observation("Amsterdam", 10.0, now)]).await.unwrap();

        let rows = store.query_since(now - Duration::days(1), Order::Asc).await.unwrap();
        assert_eq!(rows.len(), 1);

        let obs = &rows[0].observation;
        assert_eq!(obs.city_name, "Amsterdam");
        assert_eq!(obs.temperature_c, 10.0);
        assert_eq!(obs.temperature_f, 50.0);
        assert_eq!(obs.wind_speed, 3.2);
        assert_eq!(obs.fetched_at, now);
        assert!(rows[0].id > 0);
    }

    #[tokio::test]
    async fn query_since_respects_cutoff_and_order() {
        let store = fresh_store().await;
        let now = Utc::now();

        store
            .append(&[
                observation("Old", 1.0, now - Duration::days(10)),
                observation("Mid", 2.0, now - Duration::days(3)),
                observation("New", 3.0, now),
            ])
            .await
            .unwrap();

        let asc = store.query_since(now - Duration::days(7), Order::Asc).await.unwrap();
        let names: Vec<&str> =
            asc.iter().map(|r| r.observation.city_name.as_str()).collect();
        assert_eq!(names, ["Mid", "New"]);

        let desc = store.query_since(now - Duration::days(7), Order::Desc).await.unwrap();
        let names: Vec<&str> =
            desc.iter().map(|r| r.observation.city_name.as_str()).collect();
        assert_eq!(names, ["New", "Mid"]);
    }

    #[tokio::test]
    async fn row_count_grows_monotonically_across_batches() {
        let store = fresh_store().await;
        let now = Utc::now();

        let mut previous = 0;
        for tick in 0..3 {
            store
                .append(&[
                    observation("Amsterdam", 10.0 + f64::from(tick), now),
                    observation("Rotterdam", 11.0 + f64::from(tick), now),
                ])
                .await
                .unwrap();

            let count = store.row_count().await.unwrap();
            assert!(count > previous);
            previous = count;
        }

        assert_eq!(previous, 6);
    }

    #[tokio::test]
    async fn failed_append_leaves_no_partial_batch() {
        let store = fresh_store().await;
        let now = Utc::now();
        store.append(&[observation("Existing", 1.0, now)]).await.unwrap();

        // Reject one city at the SQL level so the batch fails mid-insert.
        sqlx::query(
            "CREATE TRIGGER reject_rotterdam BEFORE INSERT ON weather
             WHEN NEW.city_name = 'Rotterdam'
             BEGIN SELECT RAISE(ABORT, 'rejected by trigger'); END",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let err = store
            .append(&[
                observation("Amsterdam", 10.0, now),
                observation("Rotterdam", 11.0, now),
                observation("Eindhoven", 12.0, now),
            ])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Rotterdam"));

        // The Amsterdam insert succeeded inside the transaction but must
        // have been rolled back with the rest of the batch.
        assert_eq!(store.row_count().await.unwrap(), 1);
        let rows = store.query_since(now - Duration::days(1), Order::Asc).await.unwrap();
        assert_eq!(rows[0].observation.city_name, "Existing");
    }

    #[tokio::test]
    async fn ties_on_fetched_at_keep_insertion_order() {
        let store = fresh_store().await;
        let now = Utc::now();

        store
            .append(&[
                observation("First", 1.0, now),
                observation("Second", 2.0, now),
                observation("Third", 3.0, now),
            ])
            .await
            .unwrap();

        let rows = store.query_since(now - Duration::days(1), Order::Asc).await.unwrap();
        let names: Vec<&str> =
            rows.iter().map(|r| r.observation.city_name.as_str()).collect();
        assert_eq!(names, ["First", "Second", "Third"]);
    }
}
