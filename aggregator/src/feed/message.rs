//! SBS-1 ("BaseStation") line parsing.
//!
//! # Format
//!
//! One message per line, 22 comma-separated fields:
//!
//! | index | field                  | index | field            |
//! |-------|------------------------|-------|------------------|
//! | 0     | message type (`MSG`)   | 11    | altitude (ft)    |
//! | 1     | transmission type      | 12    | ground speed (kt)|
//! | 2     | session id             | 13    | track (deg)      |
//! | 3     | aircraft id            | 14    | latitude         |
//! | 4     | ICAO address (hex)     | 15    | longitude        |
//! | 5     | flight id              | 16    | vertical rate    |
//! | 6, 7  | generated date, time   | 17    | squawk           |
//! | 8, 9  | logged date, time      | 18    | squawk changed   |
//! | 10    | callsign               | 19    | emergency        |
//! |       |                        | 20, 21| ident, on ground |
//!
//! Empty fields mean "not reported in this message" and parse to `None`.

use std::str::FromStr;

use time::macros::format_description;
use time::{Date, PrimitiveDateTime, Time};

use crate::storage::Key;

/// Number of fields in a well-formed line.
pub const FIELD_COUNT: usize = 22;

const MESSAGE_TYPE: usize = 0;
const TRANSMISSION_TYPE: usize = 1;
const ICAO: usize = 4;
const GENERATED_DATE: usize = 6;
const LOGGED_DATE: usize = 8;
const CALLSIGN: usize = 10;
const ALTITUDE: usize = 11;
const GROUND_SPEED: usize = 12;
const TRACK: usize = 13;
const LATITUDE: usize = 14;
const LONGITUDE: usize = 15;
const VERTICAL_RATE: usize = 16;
const SQUAWK: usize = 17;
const SQUAWK_CHANGE: usize = 18;
const EMERGENCY: usize = 19;
const IDENT: usize = 20;
const ON_GROUND: usize = 21;

/// A parsed transmission message.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedMessage {
    /// ICAO address as sent, upper-cased.
    pub icao: String,
    /// Storage key derived from the ICAO address. Never zero.
    pub key: Key,
    pub transmission_type: Option<u8>,
    /// When the receiver generated the message, UTC milliseconds.
    pub generated_at: Option<i64>,
    /// When the message was logged, UTC milliseconds.
    pub logged_at: Option<i64>,
    /// Flight number, whitespace trimmed.
    pub callsign: Option<String>,
    pub altitude: Option<f32>,
    pub ground_speed: Option<f32>,
    pub track: Option<i32>,
    pub latitude: Option<f32>,
    pub longitude: Option<f32>,
    pub vertical_rate: Option<f32>,
    pub squawk: Option<i32>,
    pub squawk_change: Option<i32>,
    pub emergency: Option<i32>,
    pub ident: Option<i32>,
    pub on_ground: Option<i32>,
}

impl FeedMessage {
    /// Parse a single line, with or without its line terminator.
    pub fn parse(line: &str) -> Result<Self, FeedError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = line.split(',').collect();

        if fields[MESSAGE_TYPE] != "MSG" {
            return Err(FeedError::UnsupportedMessageType(
                fields[MESSAGE_TYPE].to_owned(),
            ));
        }
        if fields.len() < FIELD_COUNT {
            return Err(FeedError::MissingFields {
                found: fields.len(),
            });
        }

        let icao = fields[ICAO].trim().to_ascii_uppercase();
        let key = icao_to_key(&icao)?;
        let callsign = Some(fields[CALLSIGN].trim())
            .filter(|callsign| !callsign.is_empty())
            .map(str::to_owned);

        Ok(Self {
            icao,
            key,
            transmission_type: optional(&fields, TRANSMISSION_TYPE)?,
            generated_at: timestamp(&fields, GENERATED_DATE)?,
            logged_at: timestamp(&fields, LOGGED_DATE)?,
            callsign,
            altitude: optional_float(&fields, ALTITUDE)?,
            ground_speed: optional_float(&fields, GROUND_SPEED)?,
            track: optional(&fields, TRACK)?,
            latitude: optional_float(&fields, LATITUDE)?,
            longitude: optional_float(&fields, LONGITUDE)?,
            vertical_rate: optional_float(&fields, VERTICAL_RATE)?,
            squawk: optional(&fields, SQUAWK)?,
            squawk_change: optional(&fields, SQUAWK_CHANGE)?,
            emergency: optional(&fields, EMERGENCY)?,
            ident: optional(&fields, IDENT)?,
            on_ground: optional(&fields, ON_GROUND)?,
        })
    }

    /// Latitude and longitude when both are reported.
    #[must_use]
    pub const fn position(&self) -> Option<(f32, f32)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(long)) => Some((lat, long)),
            _ => None,
        }
    }
}

impl FromStr for FeedMessage {
    type Err = FeedError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        Self::parse(line)
    }
}

/// Map a 24-bit ICAO hex address onto the storage key space.
///
/// The all-zero address is not a valid aircraft and would collide with the
/// sentinel key.
pub fn icao_to_key(icao: &str) -> Result<Key, FeedError> {
    let valid = (1..=6).contains(&icao.len()) && icao.bytes().all(|b| b.is_ascii_hexdigit());
    if !valid {
        return Err(FeedError::InvalidIcao(icao.to_owned()));
    }
    match Key::from_str_radix(icao, 16) {
        Ok(key) if key != 0 => Ok(key),
        _ => Err(FeedError::InvalidIcao(icao.to_owned())),
    }
}

fn optional<T: FromStr>(fields: &[&str], index: usize) -> Result<Option<T>, FeedError> {
    let raw = fields[index].trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|_| FeedError::invalid_field(index, raw))
}

fn optional_float(fields: &[&str], index: usize) -> Result<Option<f32>, FeedError> {
    match optional::<f32>(fields, index)? {
        Some(value) if !value.is_finite() => Err(FeedError::invalid_field(index, fields[index])),
        value => Ok(value),
    }
}

/// Combine the date field at `index` and the time field after it.
fn timestamp(fields: &[&str], index: usize) -> Result<Option<i64>, FeedError> {
    let date_raw = fields[index].trim();
    let time_raw = fields[index + 1].trim();
    if date_raw.is_empty() && time_raw.is_empty() {
        return Ok(None);
    }

    let date = Date::parse(date_raw, format_description!("[year]/[month]/[day]"))
        .map_err(|_| FeedError::invalid_field(index, date_raw))?;
    let time = Time::parse(
        time_raw,
        format_description!("[hour]:[minute]:[second].[subsecond]"),
    )
    .map_err(|_| FeedError::invalid_field(index + 1, time_raw))?;

    let millis = PrimitiveDateTime::new(date, time)
        .assume_utc()
        .unix_timestamp_nanos()
        / 1_000_000;
    i64::try_from(millis)
        .map(Some)
        .map_err(|_| FeedError::invalid_field(index, date_raw))
}

/// Errors produced while parsing a feed line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("unsupported message type {0:?}")]
    UnsupportedMessageType(String),
    #[error("expected 22 fields, found {found}")]
    MissingFields { found: usize },
    #[error("field {index} has invalid value {value:?}")]
    InvalidField { index: usize, value: String },
    #[error("invalid ICAO address {0:?}")]
    InvalidIcao(String),
}

impl FeedError {
    fn invalid_field(index: usize, value: &str) -> Self {
        Self::InvalidField {
            index,
            value: value.to_owned(),
        }
    }
}
