//! Seeded generator of SBS-1 feed lines.
//!
//! Produces a mix of well-formed transmission lines for a fixed pool of
//! aircraft and deliberately broken ones, each tagged with how it was
//! broken so the parser's verdict can be checked.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::feed::{FIELD_COUNT, FeedError};

/// Ways a generated line can be broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformationType {
    /// A record type other than `MSG`.
    WrongMessageType,
    /// Fewer than the required number of fields.
    TruncatedFields,
    /// Altitude that is not a number.
    BadAltitude,
    /// Latitude that parses to NaN.
    NanLatitude,
    /// ICAO address with non-hex characters.
    NonHexIcao,
    /// ICAO address of all zeroes.
    ZeroIcao,
    /// ICAO address longer than 24 bits.
    OversizedIcao,
    /// Generated date that is not a date.
    BadDate,
}

impl MalformationType {
    pub const ALL: [Self; 8] = [
        Self::WrongMessageType,
        Self::TruncatedFields,
        Self::BadAltitude,
        Self::NanLatitude,
        Self::NonHexIcao,
        Self::ZeroIcao,
        Self::OversizedIcao,
        Self::BadDate,
    ];

    /// Whether `error` is what the parser should report for this breakage.
    #[must_use]
    pub const fn matches(self, error: &FeedError) -> bool {
        match self {
            Self::WrongMessageType => matches!(error, FeedError::UnsupportedMessageType(_)),
            Self::TruncatedFields => matches!(error, FeedError::MissingFields { .. }),
            Self::BadAltitude => matches!(error, FeedError::InvalidField { index: 11, .. }),
            Self::NanLatitude => matches!(error, FeedError::InvalidField { index: 14, .. }),
            Self::NonHexIcao | Self::ZeroIcao | Self::OversizedIcao => {
                matches!(error, FeedError::InvalidIcao(_))
            }
            Self::BadDate => matches!(error, FeedError::InvalidField { index: 6, .. }),
        }
    }
}

/// Configuration for line generation.
#[derive(Debug, Clone)]
pub struct LineGenConfig {
    /// Number of distinct aircraft in the pool.
    pub aircraft_pool_size: usize,
    /// Probability of emitting a broken line (0.0 - 1.0).
    pub malformed_rate: f64,
}

impl Default for LineGenConfig {
    fn default() -> Self {
        Self {
            aircraft_pool_size: 12,
            malformed_rate: 0.1,
        }
    }
}

/// One generated line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedLine {
    pub line: String,
    /// ICAO address of the aircraft the line is about.
    pub icao: String,
    /// `None` for a well-formed line.
    pub malformation: Option<MalformationType>,
}

/// Deterministic stream of feed lines.
pub struct LineGenerator {
    rng: StdRng,
    config: LineGenConfig,
    aircraft: Vec<String>,
}

impl LineGenerator {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, LineGenConfig::default())
    }

    #[must_use]
    pub fn with_config(seed: u64, config: LineGenConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let aircraft = (0..config.aircraft_pool_size.max(1))
            .map(|_| format!("{:06X}", rng.random_range(1..=0x00FF_FFFF_u32)))
            .collect();
        Self {
            rng,
            config,
            aircraft,
        }
    }

    /// ICAO addresses of the aircraft pool.
    #[must_use]
    pub fn aircraft(&self) -> &[String] {
        &self.aircraft
    }

    pub fn next_line(&mut self) -> GeneratedLine {
        let index = self.rng.random_range(0..self.aircraft.len());
        let icao = self.aircraft[index].clone();
        let mut fields = self.well_formed_fields(&icao);

        let malformation = if self.rng.random::<f64>() < self.config.malformed_rate {
            let kind = MalformationType::ALL[self.rng.random_range(0..MalformationType::ALL.len())];
            Self::break_fields(&mut fields, kind);
            Some(kind)
        } else {
            None
        };

        GeneratedLine {
            line: fields.join(","),
            icao,
            malformation,
        }
    }

    fn well_formed_fields(&mut self, icao: &str) -> Vec<String> {
        let mut fields = vec![String::new(); FIELD_COUNT];
        let transmission_type = self.rng.random_range(1..=8_u8);
        let second = self.rng.random_range(0..60_u32);
        let millis = self.rng.random_range(0..1000_u32);

        fields[0] = "MSG".to_owned();
        fields[1] = transmission_type.to_string();
        fields[2] = "1".to_owned();
        fields[3] = "1".to_owned();
        fields[4] = icao.to_owned();
        fields[5] = "1".to_owned();
        fields[6] = "2024/01/15".to_owned();
        fields[7] = format!("12:00:{second:02}.{millis:03}");
        fields[8] = fields[6].clone();
        fields[9] = fields[7].clone();

        match transmission_type {
            1 => fields[10] = format!("TST{:04} ", self.rng.random_range(0..10_000_u32)),
            3 => {
                fields[11] = self.rng.random_range(1_000..45_000_u32).to_string();
                fields[14] = format!("{:.5}", self.rng.random_range(-90.0..90.0_f64));
                fields[15] = format!("{:.5}", self.rng.random_range(-180.0..180.0_f64));
            }
            4 => {
                fields[12] = format!("{:.1}", self.rng.random_range(80.0..600.0_f64));
                fields[13] = self.rng.random_range(0..360_u32).to_string();
                fields[16] = self.rng.random_range(-3_000..3_000_i32).to_string();
            }
            6 => fields[17] = self.rng.random_range(0..7_777_u32).to_string(),
            _ => {}
        }
        fields
    }

    fn break_fields(fields: &mut Vec<String>, kind: MalformationType) {
        match kind {
            MalformationType::WrongMessageType => fields[0] = "SEL".to_owned(),
            MalformationType::TruncatedFields => fields.truncate(FIELD_COUNT / 2),
            MalformationType::BadAltitude => fields[11] = "FL350".to_owned(),
            MalformationType::NanLatitude => fields[14] = "NaN".to_owned(),
            MalformationType::NonHexIcao => fields[4] = "XYZ123".to_owned(),
            MalformationType::ZeroIcao => fields[4] = "000000".to_owned(),
            MalformationType::OversizedIcao => fields[4] = "1ABCDEF".to_owned(),
            MalformationType::BadDate => fields[6] = "15-01-2024".to_owned(),
        }
    }
}

impl Iterator for LineGenerator {
    type Item = GeneratedLine;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_line())
    }
}
