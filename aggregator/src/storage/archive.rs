//! SQLite archive for evicted aircraft.
//!
//! Each eviction appends one row to `aircraft_data`. Scalar fields map to
//! columns; every time series is stored as a JSON array:
//!
//! - `location`: `[{"lat": .., "long": .., "timestamp": ..}, ..]`
//! - other series: `[{"value": .., "timestamp": ..}, ..]`
//!
//! The same aircraft may be archived many times, once per visit.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use crate::aircraft::AircraftRecord;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS aircraft_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key INTEGER NOT NULL,
    icao TEXT NOT NULL,
    tail_number TEXT,
    callsign TEXT,
    first_seen INTEGER NOT NULL,
    last_seen INTEGER NOT NULL,
    msg_count INTEGER NOT NULL,
    emergency INTEGER,
    location TEXT NOT NULL,
    altitude TEXT NOT NULL,
    ground_speed TEXT NOT NULL,
    heading_track TEXT NOT NULL,
    vertical_rate TEXT NOT NULL,
    squawk_code TEXT NOT NULL
)";

const CREATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_aircraft_data_icao ON aircraft_data (icao)";

/// Archive of completed aircraft visits.
///
/// All access goes through one connection behind a mutex.
pub struct Archive {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Archive {
    /// Open (or create) `directory/file_name`, creating the directory first.
    pub fn open(directory: &Path, file_name: &str) -> Result<Self, ArchiveError> {
        std::fs::create_dir_all(directory)?;
        let path = directory.join(file_name);
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn, Some(path))
    }

    /// A throwaway archive that lives only as long as this value.
    pub fn open_in_memory() -> Result<Self, ArchiveError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, ArchiveError> {
        conn.execute(CREATE_TABLE, [])?;
        conn.execute(CREATE_INDEX, [])?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// File backing the archive, `None` when in memory.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one record inside its own transaction.
    pub fn insert(&self, record: &AircraftRecord) -> Result<(), ArchiveError> {
        let location = serde_json::to_string(&record.coordinates)?;
        let altitude = serde_json::to_string(&record.altitude)?;
        let ground_speed = serde_json::to_string(&record.ground_speed)?;
        let heading_track = serde_json::to_string(&record.heading_track)?;
        let vertical_rate = serde_json::to_string(&record.vertical_rate)?;
        let squawk_code = serde_json::to_string(&record.squawk)?;
        let msg_count = i64::try_from(record.msg_count).unwrap_or(i64::MAX);

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO aircraft_data (
                key, icao, tail_number, callsign, first_seen, last_seen, msg_count,
                emergency, location, altitude, ground_speed, heading_track,
                vertical_rate, squawk_code
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                record.key,
                record.icao,
                record.tail_number,
                record.callsign,
                record.first_seen,
                record.last_seen,
                msg_count,
                record.emergency,
                location,
                altitude,
                ground_speed,
                heading_track,
                vertical_rate,
                squawk_code,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Check that the database answers.
    pub fn ping(&self) -> Result<(), ArchiveError> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Number of archived visits.
    pub fn count(&self) -> Result<u64, ArchiveError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM aircraft_data", [], |row| {
            row.get(0)
        })?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Most recently archived visit of `icao`, if any.
    pub fn latest(&self, icao: &str) -> Result<Option<AircraftRecord>, ArchiveError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT key, icao, tail_number, callsign, first_seen, last_seen, msg_count,
                        emergency, location, altitude, ground_speed, heading_track,
                        vertical_rate, squawk_code
                 FROM aircraft_data WHERE icao = ?1 ORDER BY id DESC LIMIT 1",
                [icao],
                |row| {
                    Ok(ArchivedRow {
                        key: row.get(0)?,
                        icao: row.get(1)?,
                        tail_number: row.get(2)?,
                        callsign: row.get(3)?,
                        first_seen: row.get(4)?,
                        last_seen: row.get(5)?,
                        msg_count: row.get(6)?,
                        emergency: row.get(7)?,
                        location: row.get(8)?,
                        altitude: row.get(9)?,
                        ground_speed: row.get(10)?,
                        heading_track: row.get(11)?,
                        vertical_rate: row.get(12)?,
                        squawk_code: row.get(13)?,
                    })
                },
            )
            .optional()?;
        row.map(ArchivedRow::into_record).transpose()
    }
}

/// Raw column values, before the JSON series are decoded.
struct ArchivedRow {
    key: i64,
    icao: String,
    tail_number: Option<String>,
    callsign: Option<String>,
    first_seen: i64,
    last_seen: i64,
    msg_count: i64,
    emergency: Option<i32>,
    location: String,
    altitude: String,
    ground_speed: String,
    heading_track: String,
    vertical_rate: String,
    squawk_code: String,
}

impl ArchivedRow {
    fn into_record(self) -> Result<AircraftRecord, ArchiveError> {
        Ok(AircraftRecord {
            key: self.key,
            icao: self.icao,
            tail_number: self.tail_number,
            callsign: self.callsign,
            first_seen: self.first_seen,
            last_seen: self.last_seen,
            msg_count: u64::try_from(self.msg_count).unwrap_or_default(),
            coordinates: serde_json::from_str(&self.location)?,
            altitude: serde_json::from_str(&self.altitude)?,
            ground_speed: serde_json::from_str(&self.ground_speed)?,
            vertical_rate: serde_json::from_str(&self.vertical_rate)?,
            heading_track: serde_json::from_str(&self.heading_track)?,
            squawk: serde_json::from_str(&self.squawk_code)?,
            emergency: self.emergency,
        })
    }
}

/// Errors from the archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("failed to prepare archive directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to encode series: {0}")]
    Json(#[from] serde_json::Error),
}
