//! Recording store.
//!
//! Append-only SQLite table holding one serialised snapshot per engine tick
//! while recording is armed. The store is a staging area, not an archive:
//! `export_csv` drains every row into a CSV file and truncates the table, so
//! nothing persists across an export.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

use crate::flightdata::FlightData;

/// Fixed CSV export header: timestamp plus the flattened snapshot fields.
pub const CSV_HEADER: [&str; 44] = [
    "timestamp",
    "latitude",
    "longitude",
    "altitude",
    "altitudeAGL",
    "pitch",
    "roll",
    "headingTrue",
    "headingMag",
    "vs",
    "ias",
    "tas",
    "gs",
    "eng1Running",
    "eng1N1",
    "eng1N2",
    "eng1Throttle",
    "eng2Running",
    "eng2N1",
    "eng2N2",
    "eng2Throttle",
    "onGround",
    "stallWarning",
    "overspeedWarning",
    "com1",
    "com2",
    "nav1",
    "nav2",
    "xpdrCode",
    "apMaster",
    "apHeading",
    "apAltitude",
    "apVS",
    "apSpeed",
    "altimeterInHg",
    "beacon",
    "strobe",
    "landing",
    "elevator",
    "aileron",
    "rudder",
    "flaps",
    "spoilers",
    "gearDown",
];

/// Errors from the recording store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("snapshot serialisation: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("export file: {0}")]
    Io(#[from] std::io::Error),
}

/// SQLite-backed recording store.
pub struct FlightLog {
    pool: SqlitePool,
}

impl FlightLog {
    /// Open (or create) the store at `path`.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS flight_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                data TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Append one snapshot as a JSON row stamped with the current time.
    pub async fn append(&self, data: &FlightData) -> Result<(), StoreError> {
        let json = serde_json::to_string(data)?;
        sqlx::query("INSERT INTO flight_data (data) VALUES (?)")
            .bind(json)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Number of rows currently staged.
    pub async fn count(&self) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM flight_data")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Drain every staged row into a CSV file at `path` and truncate the
    /// store. Returns the number of exported rows; an empty store produces a
    /// header-only file.
    pub async fn export_csv(&self, path: &Path) -> Result<u64, StoreError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT timestamp, data FROM flight_data ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(CSV_HEADER)?;
        for (timestamp, json) in &rows {
            let data: FlightData = serde_json::from_str(json)?;
            writer.write_record(csv_row(timestamp, &data))?;
        }
        writer.flush()?;

        sqlx::query("DELETE FROM flight_data")
            .execute(&self.pool)
            .await?;

        info!(rows = rows.len(), path = %path.display(), "recording exported");
        Ok(rows.len() as u64)
    }
}

/// Flatten one row into the [`CSV_HEADER`] column order.
fn csv_row(timestamp: &str, d: &FlightData) -> Vec<String> {
    fn ff(v: f64) -> String {
        format!("{v:.4}")
    }
    fn fb(v: bool) -> String {
        (if v { "1" } else { "0" }).to_string()
    }

    vec![
        timestamp.to_string(),
        ff(d.position.latitude),
        ff(d.position.longitude),
        ff(d.position.altitude),
        ff(d.position.altitude_agl),
        ff(d.attitude.pitch),
        ff(d.attitude.roll),
        ff(d.attitude.heading_true),
        ff(d.attitude.heading_mag),
        ff(d.attitude.vs),
        ff(d.attitude.ias),
        ff(d.attitude.tas),
        ff(d.attitude.gs),
        fb(d.engines[0].running),
        ff(d.engines[0].n1),
        ff(d.engines[0].n2),
        ff(d.engines[0].throttle),
        fb(d.engines[1].running),
        ff(d.engines[1].n1),
        ff(d.engines[1].n2),
        ff(d.engines[1].throttle),
        fb(d.sensors.on_ground),
        fb(d.sensors.stall_warning),
        fb(d.sensors.overspeed_warning),
        ff(d.radios.com1),
        ff(d.radios.com2),
        ff(d.radios.nav1),
        ff(d.radios.nav2),
        d.radios.transponder_code.to_string(),
        fb(d.autopilot.master),
        ff(d.autopilot.heading),
        ff(d.autopilot.altitude),
        ff(d.autopilot.vs),
        ff(d.autopilot.speed),
        ff(d.altimeter),
        fb(d.lights.beacon),
        fb(d.lights.strobe),
        fb(d.lights.landing),
        ff(d.controls.elevator),
        ff(d.controls.aileron),
        ff(d.controls.rudder),
        ff(d.controls.flaps),
        ff(d.controls.spoilers),
        fb(d.controls.gear_down),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> FlightData {
        let mut data = FlightData::default();
        data.position.latitude = 51.4775;
        data.position.longitude = -0.4614;
        data.position.altitude = 83.0;
        data.sensors.on_ground = true;
        data.radios.com1 = 118.3;
        data.radios.transponder_code = 1200;
        data.altimeter = 29.92;
        data
    }

    async fn temp_store() -> (FlightLog, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FlightLog::open(&dir.path().join("flight_data.db"))
            .await
            .unwrap();
        (store, dir)
    }

    #[test]
    fn row_matches_header_width() {
        let row = csv_row("2026-01-01 12:00:00", &sample_data());
        assert_eq!(row.len(), CSV_HEADER.len());
    }

    #[test]
    fn row_formats_booleans_and_floats() {
        let row = csv_row("t", &sample_data());
        let on_ground = CSV_HEADER.iter().position(|&c| c == "onGround").unwrap();
        let latitude = CSV_HEADER.iter().position(|&c| c == "latitude").unwrap();
        let beacon = CSV_HEADER.iter().position(|&c| c == "beacon").unwrap();
        assert_eq!(row[on_ground], "1");
        assert_eq!(row[beacon], "0");
        assert_eq!(row[latitude], "51.4775");
    }

    #[tokio::test]
    async fn append_and_count() {
        let (store, _dir) = temp_store().await;
        assert_eq!(store.count().await.unwrap(), 0);

        store.append(&sample_data()).await.unwrap();
        store.append(&sample_data()).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn export_drains_store() {
        let (store, dir) = temp_store().await;
        for _ in 0..3 {
            store.append(&sample_data()).await.unwrap();
        }

        let out = dir.path().join("export.csv");
        let exported = store.export_csv(&out).await.unwrap();
        assert_eq!(exported, 3);
        assert_eq!(store.count().await.unwrap(), 0);

        let contents = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4); // header + 3 rows
        assert!(lines[0].starts_with("timestamp,latitude,longitude"));
        assert!(lines[1].contains("51.4775"));
    }

    #[tokio::test]
    async fn re_export_after_drain_is_header_only() {
        let (store, dir) = temp_store().await;
        store.append(&sample_data()).await.unwrap();

        let first = dir.path().join("first.csv");
        store.export_csv(&first).await.unwrap();

        let second = dir.path().join("second.csv");
        let exported = store.export_csv(&second).await.unwrap();
        assert_eq!(exported, 0);

        let contents = std::fs::read_to_string(&second).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_store() {
        let (store, dir) = temp_store().await;
        let data = sample_data();
        store.append(&data).await.unwrap();

        let out = dir.path().join("export.csv");
        store.export_csv(&out).await.unwrap();

        let contents = std::fs::read_to_string(&out).unwrap();
        let row = contents.lines().nth(1).unwrap();
        assert!(row.contains("118.3000")); // com1
        assert!(row.contains("1200")); // transponder code
        assert!(row.contains("29.9200")); // altimeter
    }
}
