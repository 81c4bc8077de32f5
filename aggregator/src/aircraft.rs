//! Per-aircraft aggregate built up from feed messages.
//!
//! A record keeps a time series for each tracked value. A new sample is
//! appended only when the value changes, so a steady cruise at 37 000 ft
//! stays a single altitude sample no matter how many messages report it.
//!
//! # Change detection
//!
//! - Floating-point series (altitude, ground speed, vertical rate): the
//!   relative difference `|a − b| / (|a| + |b|)` must reach 1%.
//! - Integer series (track, squawk): any difference.
//! - Position: either coordinate differs at all.

use serde::{Deserialize, Serialize};

use crate::feed::FeedMessage;
use crate::storage::Key;

/// Smallest relative difference between two float samples that counts as a
/// change.
pub const RELATIVE_CHANGE_THRESHOLD: f64 = 0.01;

/// A position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f32,
    pub long: f32,
    /// UTC milliseconds.
    pub timestamp: i64,
}

/// One timestamped value in a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample<T> {
    pub value: T,
    /// UTC milliseconds.
    pub timestamp: i64,
}

/// Everything aggregated about one aircraft while it is in range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AircraftRecord {
    pub key: Key,
    pub icao: String,
    pub tail_number: Option<String>,
    pub callsign: Option<String>,
    pub first_seen: i64,
    pub last_seen: i64,
    pub msg_count: u64,
    pub coordinates: Vec<Coordinate>,
    pub altitude: Vec<Sample<f32>>,
    pub ground_speed: Vec<Sample<f32>>,
    pub vertical_rate: Vec<Sample<f32>>,
    pub heading_track: Vec<Sample<i32>>,
    pub squawk: Vec<Sample<i32>>,
    pub emergency: Option<i32>,
}

impl AircraftRecord {
    /// An empty record first seen at `now`.
    #[must_use]
    pub const fn new(key: Key, icao: String, tail_number: Option<String>, now: i64) -> Self {
        Self {
            key,
            icao,
            tail_number,
            callsign: None,
            first_seen: now,
            last_seen: now,
            msg_count: 0,
            coordinates: Vec::new(),
            altitude: Vec::new(),
            ground_speed: Vec::new(),
            vertical_rate: Vec::new(),
            heading_track: Vec::new(),
            squawk: Vec::new(),
            emergency: None,
        }
    }

    /// A record created from the first message heard from an aircraft.
    #[must_use]
    pub fn from_message(message: &FeedMessage, tail_number: Option<String>, now: i64) -> Self {
        let mut record = Self::new(message.key, message.icao.clone(), tail_number, now);
        record.observe(message, now);
        record
    }

    /// Fold one message into the record.
    pub fn observe(&mut self, message: &FeedMessage, now: i64) {
        self.last_seen = self.last_seen.max(now);
        self.msg_count += 1;

        if let Some(callsign) = &message.callsign {
            self.callsign = Some(callsign.clone());
        }
        if message.emergency.is_some() {
            self.emergency = message.emergency;
        }

        if let Some((lat, long)) = message.position() {
            #[allow(clippy::float_cmp)] // any movement at all is recorded
            let moved = self
                .coordinates
                .last()
                .is_none_or(|last| last.lat != lat || last.long != long);
            if moved {
                self.coordinates.push(Coordinate {
                    lat,
                    long,
                    timestamp: now,
                });
            }
        }

        push_float(&mut self.altitude, message.altitude, now);
        push_float(&mut self.ground_speed, message.ground_speed, now);
        push_float(&mut self.vertical_rate, message.vertical_rate, now);
        push_exact(&mut self.heading_track, message.track, now);
        push_exact(&mut self.squawk, message.squawk, now);
    }

    /// Whether nothing has been heard for at least `stale_after_ms`.
    #[must_use]
    pub const fn is_stale(&self, now: i64, stale_after_ms: i64) -> bool {
        now.saturating_sub(self.last_seen) >= stale_after_ms
    }

    /// Most recent altitude, if any was reported.
    #[must_use]
    pub fn current_altitude(&self) -> Option<f32> {
        self.altitude.last().map(|sample| sample.value)
    }

    /// Most recent position, if any was reported.
    #[must_use]
    pub fn current_position(&self) -> Option<Coordinate> {
        self.coordinates.last().copied()
    }
}

/// Whether two float readings differ by at least the relative threshold.
#[must_use]
pub fn float_changed(previous: f32, current: f32) -> bool {
    let (a, b) = (f64::from(previous), f64::from(current));
    let scale = a.abs() + b.abs();
    if scale == 0.0 {
        return false;
    }
    (a - b).abs() / scale >= RELATIVE_CHANGE_THRESHOLD
}

fn push_float(series: &mut Vec<Sample<f32>>, value: Option<f32>, now: i64) {
    let Some(value) = value else { return };
    if series
        .last()
        .is_none_or(|last| float_changed(last.value, value))
    {
        series.push(Sample {
            value,
            timestamp: now,
        });
    }
}

fn push_exact(series: &mut Vec<Sample<i32>>, value: Option<i32>, now: i64) {
    let Some(value) = value else { return };
    if series.last().is_none_or(|last| last.value != value) {
        series.push(Sample {
            value,
            timestamp: now,
        });
    }
}
