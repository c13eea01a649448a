//! Persistence of locations and bucketed observations.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::{fs, path::Path};
use tracing::info;

use crate::{
    error::StoreError,
    model::{Location, LocationDescriptor, Observation, PersistedObservation, WindDirection},
};

/// Minimal query contract the bundler needs from a store.
pub trait WeatherStore: Send + Sync {
    fn location_by_name(&self, name: &str) -> Result<Option<Location>, StoreError>;

    fn location_by_name_country(
        &self,
        name: &str,
        country: &str,
    ) -> Result<Option<Location>, StoreError>;

    fn location_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<Location>, StoreError>;

    fn create_location(&self, fields: &LocationDescriptor) -> Result<Location, StoreError>;

    fn observations_at(
        &self,
        location_id: i64,
        bucket: DateTime<Utc>,
    ) -> Result<Vec<Observation>, StoreError>;

    /// Write every row in one commit.
    fn insert_observations(&self, rows: &[PersistedObservation]) -> Result<(), StoreError>;

    fn locations(&self) -> Result<Vec<Location>, StoreError>;

    /// Delete rows whose bucket is at or before `cutoff`, returning how many went.
    fn prune_observations_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

const LOCATION_COLUMNS: &str = "location_id, name, country, latitude, longitude";

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Directory(parent.to_path_buf(), e))?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    /// In-memory database, mostly for tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS locations (
                location_id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT,
                country TEXT,
                latitude REAL,
                longitude REAL
            );

            CREATE TABLE IF NOT EXISTS observations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                location_id INTEGER NOT NULL REFERENCES locations(location_id),
                bucket INTEGER NOT NULL,
                temperature REAL,
                humidity REAL,
                pressure REAL,
                wind_speed REAL,
                wind_direction TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_locations_name ON locations(name);
            CREATE INDEX IF NOT EXISTS idx_observations_bucket ON observations(location_id, bucket);
            "#,
        )?;
        Ok(())
    }

    fn row_to_location(row: &Row<'_>) -> rusqlite::Result<Location> {
        Ok(Location {
            id: row.get(0)?,
            name: row.get(1)?,
            country: row.get(2)?,
            latitude: row.get(3)?,
            longitude: row.get(4)?,
        })
    }

    fn first_location<P: rusqlite::Params>(
        &self,
        filter: &str,
        params: P,
    ) -> Result<Option<Location>, StoreError> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {LOCATION_COLUMNS} FROM locations WHERE {filter} ORDER BY location_id LIMIT 1"
        );
        let location = conn.query_row(&sql, params, Self::row_to_location).optional()?;
        Ok(location)
    }
}

impl WeatherStore for SqliteStore {
    fn location_by_name(&self, name: &str) -> Result<Option<Location>, StoreError> {
        self.first_location("name = ?1", params![name])
    }

    fn location_by_name_country(
        &self,
        name: &str,
        country: &str,
    ) -> Result<Option<Location>, StoreError> {
        self.first_location("name = ?1 AND country = ?2", params![name, country])
    }

    fn location_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<Location>, StoreError> {
        self.first_location("latitude = ?1 AND longitude = ?2", params![latitude, longitude])
    }

    fn create_location(&self, fields: &LocationDescriptor) -> Result<Location, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO locations (name, country, latitude, longitude) VALUES (?1, ?2, ?3, ?4)",
            params![fields.name, fields.country, fields.latitude, fields.longitude],
        )?;

        let location = Location {
            id: conn.last_insert_rowid(),
            name: fields.name.clone(),
            country: fields.country.clone(),
            latitude: fields.latitude,
            longitude: fields.longitude,
        };
        info!(
            location_id = location.id,
            name = %location.display_name(),
            latitude = ?location.latitude,
            longitude = ?location.longitude,
            "location created"
        );
        Ok(location)
    }

    fn observations_at(
        &self,
        location_id: i64,
        bucket: DateTime<Utc>,
    ) -> Result<Vec<Observation>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT temperature, humidity, pressure, wind_speed, wind_direction \
             FROM observations WHERE location_id = ?1 AND bucket = ?2 ORDER BY id",
        )?;

        let rows = stmt.query_map(params![location_id, bucket.timestamp()], |row| {
            Ok((
                row.get::<_, Option<f64>>(0)?,
                row.get::<_, Option<f64>>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut observations = Vec::new();
        for row in rows {
            let (temperature, humidity, pressure, wind_speed, direction) = row?;
            let wind_direction: WindDirection = direction.parse().map_err(StoreError::Corrupt)?;
            observations.push(Observation {
                temperature,
                humidity,
                pressure,
                wind_speed,
                wind_direction,
            });
        }
        Ok(observations)
    }

    fn insert_observations(&self, rows: &[PersistedObservation]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO observations \
                 (location_id, bucket, temperature, humidity, pressure, wind_speed, wind_direction) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for row in rows {
                let obs = &row.observation;
                stmt.execute(params![
                    row.location_id,
                    row.bucket.timestamp(),
                    obs.temperature,
                    obs.humidity,
                    obs.pressure,
                    obs.wind_speed,
                    obs.wind_direction.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn locations(&self) -> Result<Vec<Location>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {LOCATION_COLUMNS} FROM locations ORDER BY location_id"))?;
        let rows = stmt.query_map([], Self::row_to_location)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn prune_observations_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let removed =
            conn.execute("DELETE FROM observations WHERE bucket <= ?1", params![cutoff.timestamp()])?;
        Ok(removed)
    }
}
