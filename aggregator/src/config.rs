//! Aggregator configuration.
//!
//! Loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `ADSB_FEED_HOST`: SBS-1 feed host (required)
//! - `ADSB_FEED_PORT`: SBS-1 feed port (default: `30003`)
//! - `ADSB_LOOKUP_ADDR`: `host:port` of the tail number service (required)
//! - `ADSB_DATABASE_DIRECTORY`: archive directory (default: `./data`)
//! - `ADSB_DATABASE_FILENAME`: archive file name (default: `dump1090reader.db`)
//! - `ADSB_STALE_AFTER_MS`: silence before an aircraft is evicted (default: `10000`)
//! - `ADSB_SWEEP_INTERVAL_MS`: time between eviction sweeps (default: `5000`)
//! - `ADSB_READ_TIMEOUT_MS`: feed read timeout (default: `5000`)
//! - `ADSB_LOOKUP_TIMEOUT_MS`: tail number lookup timeout (default: `2000`)
//! - `ADSB_STORAGE_BACKEND`: `btree` or `map` (default: `btree`)
//! - `ADSB_STORAGE_DEGREE`: B-tree degree, at least 2 (default: `2`)
//! - `ADSB_QUEUE_CAPACITY`: writer queue depth (default: `1024`)
//! - `ADSB_STATUS_PORT`: port for the status API on 127.0.0.1 (unset: disabled)
//!
//! # Invariants
//!
//! - `feed_host` and `lookup_addr` are never empty
//! - every duration is nonzero
//! - `storage_degree >= 2`

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which keyed container holds the live aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    BTree,
    Map,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "btree" => Ok(Self::BTree),
            "map" => Ok(Self::Map),
            other => Err(format!("'{other}' is not a storage backend (expected btree or map)")),
        }
    }
}

/// Aggregator configuration.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub feed_host: String,
    pub feed_port: u16,
    pub lookup_addr: String,
    /// Directory holding the archive database. Created on start-up.
    pub database_directory: PathBuf,
    pub database_filename: String,
    pub stale_after: Duration,
    pub sweep_interval: Duration,
    pub read_timeout: Duration,
    pub lookup_timeout: Duration,
    pub storage_backend: StorageBackend,
    pub storage_degree: usize,
    pub queue_capacity: usize,
    pub status_port: Option<u16>,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// An environment variable has an invalid value.
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
}

impl AggregatorConfig {
    pub const DEFAULT_FEED_PORT: u16 = 30003;
    pub const DEFAULT_DATABASE_DIRECTORY: &'static str = "./data";
    pub const DEFAULT_DATABASE_FILENAME: &'static str = "dump1090reader.db";
    pub const DEFAULT_STALE_AFTER_MS: u64 = 10_000;
    pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 5_000;
    pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5_000;
    pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 2_000;
    pub const DEFAULT_STORAGE_DEGREE: usize = 2;
    pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration from any variable source.
    ///
    /// Empty values count as unset.
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(get);

        let storage_degree = vars.parsed("ADSB_STORAGE_DEGREE", Self::DEFAULT_STORAGE_DEGREE)?;
        if storage_degree < 2 {
            return Err(ConfigError::InvalidValue {
                name: "ADSB_STORAGE_DEGREE".to_string(),
                message: format!("{storage_degree} is below the minimum degree of 2"),
            });
        }

        Ok(Self {
            feed_host: vars.required("ADSB_FEED_HOST")?,
            feed_port: vars.parsed("ADSB_FEED_PORT", Self::DEFAULT_FEED_PORT)?,
            lookup_addr: vars.required("ADSB_LOOKUP_ADDR")?,
            database_directory: vars
                .optional("ADSB_DATABASE_DIRECTORY")
                .map_or_else(|| PathBuf::from(Self::DEFAULT_DATABASE_DIRECTORY), PathBuf::from),
            database_filename: vars
                .optional("ADSB_DATABASE_FILENAME")
                .unwrap_or_else(|| Self::DEFAULT_DATABASE_FILENAME.to_string()),
            stale_after: vars.millis("ADSB_STALE_AFTER_MS", Self::DEFAULT_STALE_AFTER_MS)?,
            sweep_interval: vars.millis("ADSB_SWEEP_INTERVAL_MS", Self::DEFAULT_SWEEP_INTERVAL_MS)?,
            read_timeout: vars.millis("ADSB_READ_TIMEOUT_MS", Self::DEFAULT_READ_TIMEOUT_MS)?,
            lookup_timeout: vars.millis("ADSB_LOOKUP_TIMEOUT_MS", Self::DEFAULT_LOOKUP_TIMEOUT_MS)?,
            storage_backend: vars.parsed("ADSB_STORAGE_BACKEND", StorageBackend::BTree)?,
            storage_degree,
            queue_capacity: vars.parsed("ADSB_QUEUE_CAPACITY", Self::DEFAULT_QUEUE_CAPACITY)?,
            status_port: vars
                .optional("ADSB_STATUS_PORT")
                .map(|value| parse("ADSB_STATUS_PORT", &value))
                .transpose()?,
        })
    }
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|value| !value.is_empty())
    }

    fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.optional(name)
            .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
    }

    fn parsed<T: FromStr>(&self, name: &str, default: T) -> Result<T, ConfigError>
    where
        T::Err: std::fmt::Display,
    {
        self.optional(name)
            .map_or(Ok(default), |value| parse(name, &value))
    }

    fn millis(&self, name: &str, default: u64) -> Result<Duration, ConfigError> {
        let ms: u64 = self.parsed(name, default)?;
        if ms == 0 {
            return Err(ConfigError::InvalidValue {
                name: name.to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(Duration::from_millis(ms))
    }
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        message: format!("'{value}': {e}"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<AggregatorConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AggregatorConfig::from_vars(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("ADSB_FEED_HOST", "radar.local"),
        ("ADSB_LOOKUP_ADDR", "lookup.local:8080"),
    ];

    #[test]
    fn test_default_values() {
        let config = load(&REQUIRED).expect("valid config");
        assert_eq!(config.feed_host, "radar.local");
        assert_eq!(config.feed_port, 30003);
        assert_eq!(config.lookup_addr, "lookup.local:8080");
        assert_eq!(config.database_directory, PathBuf::from("./data"));
        assert_eq!(config.database_filename, "dump1090reader.db");
        assert_eq!(config.stale_after, Duration::from_secs(10));
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
        assert_eq!(config.read_timeout, Duration::from_secs(5));
        assert_eq!(config.lookup_timeout, Duration::from_secs(2));
        assert_eq!(config.storage_backend, StorageBackend::BTree);
        assert_eq!(config.storage_degree, 2);
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.status_port, None);
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("ADSB_FEED_PORT", "40000"),
            ("ADSB_STORAGE_BACKEND", "MAP"),
            ("ADSB_STORAGE_DEGREE", "8"),
            ("ADSB_STALE_AFTER_MS", "60000"),
            ("ADSB_STATUS_PORT", "8081"),
            ("ADSB_DATABASE_DIRECTORY", "/var/lib/adsb"),
        ]);
        let config = load(&pairs).expect("valid config");
        assert_eq!(config.feed_port, 40000);
        assert_eq!(config.storage_backend, StorageBackend::Map);
        assert_eq!(config.storage_degree, 8);
        assert_eq!(config.stale_after, Duration::from_secs(60));
        assert_eq!(config.status_port, Some(8081));
        assert_eq!(config.database_directory, PathBuf::from("/var/lib/adsb"));
    }

    #[test]
    fn test_missing_required() {
        assert_eq!(
            load(&[("ADSB_LOOKUP_ADDR", "x:1")]).err(),
            Some(ConfigError::MissingEnvVar("ADSB_FEED_HOST".to_string()))
        );
        assert_eq!(
            load(&[("ADSB_FEED_HOST", ""), ("ADSB_LOOKUP_ADDR", "x:1")]).err(),
            Some(ConfigError::MissingEnvVar("ADSB_FEED_HOST".to_string()))
        );
        assert_eq!(
            load(&[("ADSB_FEED_HOST", "radar")]).err(),
            Some(ConfigError::MissingEnvVar("ADSB_LOOKUP_ADDR".to_string()))
        );
    }

    #[test]
    fn test_invalid_values() {
        for (name, value) in [
            ("ADSB_FEED_PORT", "70000"),
            ("ADSB_STORAGE_DEGREE", "1"),
            ("ADSB_STORAGE_BACKEND", "skiplist"),
            ("ADSB_SWEEP_INTERVAL_MS", "0"),
            ("ADSB_READ_TIMEOUT_MS", "soon"),
        ] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push((name, value));
            match load(&pairs) {
                Err(ConfigError::InvalidValue { name: reported, .. }) => assert_eq!(reported, name),
                other => panic!("expected {name} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::MissingEnvVar("TEST_VAR".to_string());
        assert_eq!(
            error.to_string(),
            "missing required environment variable: TEST_VAR"
        );
        let error = ConfigError::InvalidValue {
            name: "TEST_VAR".to_string(),
            message: "bad value".to_string(),
        };
        assert_eq!(error.to_string(), "invalid value for TEST_VAR: bad value");
    }
}
