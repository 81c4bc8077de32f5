//! Seeded generator of storage operations.
//!
//! Keys are drawn from a small symmetric range so inserts, deletes and
//! searches keep colliding, which exercises upserts, misses, borrows and
//! merges far more often than uniformly random 64-bit keys would.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::storage::{Key, SENTINEL_KEY};

/// Configuration for operation generation.
#[derive(Debug, Clone)]
pub struct OpGenConfig {
    /// Keys are drawn from `-key_range..=key_range`.
    pub key_range: Key,
    /// Probability of a delete (0.0 - 1.0).
    pub delete_rate: f64,
    /// Probability of a search (0.0 - 1.0).
    pub search_rate: f64,
    /// Probability of forcing the sentinel key.
    pub sentinel_rate: f64,
}

impl Default for OpGenConfig {
    fn default() -> Self {
        Self {
            key_range: 64,
            delete_rate: 0.35,
            search_rate: 0.15,
            sentinel_rate: 0.02,
        }
    }
}

/// One storage call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert(Key, u64),
    Delete(Key),
    Search(Key),
}

impl Operation {
    #[must_use]
    pub const fn key(&self) -> Key {
        match self {
            Self::Insert(key, _) | Self::Delete(key) | Self::Search(key) => *key,
        }
    }
}

/// Deterministic stream of operations.
pub struct OperationGenerator {
    rng: StdRng,
    config: OpGenConfig,
    next_value: u64,
}

impl OperationGenerator {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, OpGenConfig::default())
    }

    #[must_use]
    pub fn with_config(seed: u64, config: OpGenConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
            next_value: 1,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &OpGenConfig {
        &self.config
    }

    pub fn next_operation(&mut self) -> Operation {
        let key = self.next_key();
        let roll = self.rng.random::<f64>();

        if roll < self.config.delete_rate {
            Operation::Delete(key)
        } else if roll < self.config.delete_rate + self.config.search_rate {
            Operation::Search(key)
        } else {
            let value = self.next_value;
            self.next_value += 1;
            Operation::Insert(key, value)
        }
    }

    fn next_key(&mut self) -> Key {
        if self.rng.random::<f64>() < self.config.sentinel_rate {
            return SENTINEL_KEY;
        }
        let range = self.config.key_range.max(1);
        loop {
            let key = self.rng.random_range(-range..=range);
            if key != SENTINEL_KEY {
                return key;
            }
        }
    }
}

impl Iterator for OperationGenerator {
    type Item = Operation;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_operation())
    }
}
