//! Main simulator harness for deterministic simulation testing.
//!
//! Two runs are offered:
//!
//! - [`Simulator::run`] replays a seeded operation stream against the
//!   B-tree, the hash-map backend and a `std` ordered map, comparing every
//!   outcome and checking the tree's structure as it goes.
//! - [`Simulator::run_feed`] pushes seeded feed lines through the parser
//!   and folds the accepted ones into a B-tree of aircraft records, the
//!   same way the writer task does.

use std::collections::{BTreeMap, HashMap};

use crate::aircraft::AircraftRecord;
use crate::feed::FeedMessage;
use crate::storage::{
    BTreeStorage, DEFAULT_DEGREE, InvariantViolation, Key, KeyedStorage, ManualClock, MapStorage,
    SENTINEL_KEY, StorageError, TimeSource,
};

use super::line_gen::{LineGenConfig, LineGenerator};
use super::op_gen::{OpGenConfig, Operation, OperationGenerator};

/// Configuration for the simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Degree of the tree under test.
    pub degree: usize,
    pub op_config: OpGenConfig,
    pub line_config: LineGenConfig,
    /// Run the full structural check every this many steps; 0 checks only at
    /// the end.
    pub validate_every: u64,
    /// Milliseconds the clock advances per feed line.
    pub time_advance_ms: i64,
}

impl SimulatorConfig {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            degree: DEFAULT_DEGREE,
            op_config: OpGenConfig::default(),
            line_config: LineGenConfig::default(),
            validate_every: 1,
            time_advance_ms: 250,
        }
    }

    #[must_use]
    pub const fn with_degree(mut self, degree: usize) -> Self {
        self.degree = degree;
        self
    }

    #[must_use]
    pub const fn with_key_range(mut self, key_range: Key) -> Self {
        self.op_config.key_range = key_range;
        self
    }

    #[must_use]
    pub const fn with_malformed_rate(mut self, rate: f64) -> Self {
        self.line_config.malformed_rate = rate;
        self
    }

    #[must_use]
    pub const fn with_validate_every(mut self, steps: u64) -> Self {
        self.validate_every = steps;
        self
    }
}

/// A disagreement found during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// A backend answered differently from the reference model.
    Divergence {
        step: u64,
        backend: &'static str,
        operation: Operation,
        expected: String,
        actual: String,
    },
    /// The tree broke a structural invariant.
    Structure {
        step: u64,
        violation: InvariantViolation,
    },
    /// Live contents differ from the reference after the run.
    Contents { backend: &'static str },
    /// The parser's verdict on a generated line was not the expected one.
    Parse { step: u64, line: String, detail: String },
    /// An aggregate's message count does not match the lines accepted.
    MessageCount { icao: String, expected: u64, actual: u64 },
}

/// Results from a simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    pub seed: u64,
    /// Operations or lines processed.
    pub steps: u64,
    /// Steps the storage or parser accepted.
    pub successful_operations: u64,
    /// Steps rejected with an expected error.
    pub rejected_operations: u64,
    pub violations: Vec<Violation>,
    /// Entries live at the end of the run.
    pub final_len: usize,
}

impl SimulationResult {
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Outcome of one storage call in a comparable form.
type Outcome = Result<Option<u64>, StorageError>;

/// The main simulator harness.
pub struct Simulator {
    config: SimulatorConfig,
}

impl Simulator {
    #[must_use]
    pub const fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    /// Replay `operations` seeded operations against every backend.
    ///
    /// # Errors
    ///
    /// `InvalidDegree` when the configured degree is below 2.
    pub fn run(&self, operations: u64) -> Result<SimulationResult, StorageError> {
        let tree = BTreeStorage::<u64>::new(self.config.degree)?;
        let map = MapStorage::<u64>::new();
        let mut reference = BTreeMap::new();
        let mut generator =
            OperationGenerator::with_config(self.config.seed, self.config.op_config.clone());

        let mut result = self.empty_result();
        for step in 1..=operations {
            let operation = generator.next_operation();
            let expected = apply_reference(&mut reference, operation);
            let tree_outcome = apply(&tree, operation);
            let map_outcome = apply(&map, operation);

            for (backend, actual) in [("btree", &tree_outcome), ("map", &map_outcome)] {
                if *actual != expected {
                    result.violations.push(Violation::Divergence {
                        step,
                        backend,
                        operation,
                        expected: format!("{expected:?}"),
                        actual: format!("{actual:?}"),
                    });
                }
            }

            if expected.is_ok() {
                result.successful_operations += 1;
            } else {
                result.rejected_operations += 1;
            }

            if self.should_validate(step) {
                if let Err(violation) = tree.validate() {
                    tracing::warn!(seed = self.config.seed, step, %violation, "tree invariant broken");
                    result.violations.push(Violation::Structure { step, violation });
                }
            }
            result.steps = step;
        }

        if let Err(violation) = tree.validate() {
            result.violations.push(Violation::Structure {
                step: operations,
                violation,
            });
        }
        for (backend, live) in [("btree", contents(&tree)), ("map", contents(&map))] {
            if live != reference {
                result.violations.push(Violation::Contents { backend });
            }
        }
        result.final_len = tree.len();
        Ok(result)
    }

    /// Parse `lines` seeded feed lines and aggregate the accepted ones.
    ///
    /// # Errors
    ///
    /// `InvalidDegree` when the configured degree is below 2.
    pub fn run_feed(&self, lines: u64) -> Result<SimulationResult, StorageError> {
        let storage = BTreeStorage::<AircraftRecord>::new(self.config.degree)?;
        let clock = ManualClock::default_start();
        let mut generator =
            LineGenerator::with_config(self.config.seed, self.config.line_config.clone());
        let mut accepted: HashMap<String, u64> = HashMap::new();

        let mut result = self.empty_result();
        for step in 1..=lines {
            clock.advance(self.config.time_advance_ms);
            let generated = generator.next_line();

            match (FeedMessage::parse(&generated.line), generated.malformation) {
                (Ok(message), None) => {
                    fold(&storage, &message, clock.now_ms())?;
                    *accepted.entry(message.icao).or_default() += 1;
                    result.successful_operations += 1;
                }
                (Err(error), Some(kind)) if kind.matches(&error) => {
                    result.rejected_operations += 1;
                }
                (outcome, malformation) => result.violations.push(Violation::Parse {
                    step,
                    line: generated.line,
                    detail: format!("expected {malformation:?}, got {outcome:?}"),
                }),
            }

            if self.should_validate(step) {
                if let Err(violation) = storage.validate() {
                    result.violations.push(Violation::Structure { step, violation });
                }
            }
            result.steps = step;
        }

        let mut counted = 0;
        storage.traverse(&mut |entry| {
            counted += 1;
            let expected = accepted.get(&entry.value.icao).copied().unwrap_or_default();
            if entry.value.msg_count != expected {
                result.violations.push(Violation::MessageCount {
                    icao: entry.value.icao.clone(),
                    expected,
                    actual: entry.value.msg_count,
                });
            }
        });
        if counted != accepted.len() {
            result.violations.push(Violation::Contents { backend: "btree" });
        }
        result.final_len = counted;
        Ok(result)
    }

    const fn should_validate(&self, step: u64) -> bool {
        self.config.validate_every != 0 && step % self.config.validate_every == 0
    }

    const fn empty_result(&self) -> SimulationResult {
        SimulationResult {
            seed: self.config.seed,
            steps: 0,
            successful_operations: 0,
            rejected_operations: 0,
            violations: Vec::new(),
            final_len: 0,
        }
    }
}

fn apply(storage: &dyn KeyedStorage<u64>, operation: Operation) -> Outcome {
    match operation {
        Operation::Insert(key, value) => storage.insert(key, value),
        Operation::Delete(key) => storage.delete(key).map(Some),
        Operation::Search(key) => storage.search(key).map(Some),
    }
}

/// What a correct container answers, computed on a `std` ordered map.
fn apply_reference(reference: &mut BTreeMap<Key, u64>, operation: Operation) -> Outcome {
    match operation {
        Operation::Insert(SENTINEL_KEY, _) | Operation::Search(SENTINEL_KEY) => {
            Err(StorageError::InvalidKey)
        }
        Operation::Delete(_) if reference.is_empty() => Err(StorageError::UninitializedStorage),
        Operation::Delete(SENTINEL_KEY) => Err(StorageError::InvalidKey),
        Operation::Insert(key, value) => Ok(reference.insert(key, value)),
        Operation::Search(key) => reference
            .get(&key)
            .copied()
            .map(Some)
            .ok_or(StorageError::NotFound(key)),
        Operation::Delete(key) => reference
            .remove(&key)
            .map(Some)
            .ok_or(StorageError::KeyNotFound(key)),
    }
}

fn contents(storage: &dyn KeyedStorage<u64>) -> BTreeMap<Key, u64> {
    let mut contents = BTreeMap::new();
    // Neither backend fails a traversal.
    let _ = storage.traverse(&mut |entry| {
        contents.insert(entry.key, entry.value);
    });
    contents
}

/// Create-or-update, as the writer task does it.
fn fold(
    storage: &BTreeStorage<AircraftRecord>,
    message: &FeedMessage,
    now: i64,
) -> Result<(), StorageError> {
    let record = match storage.search(message.key) {
        Ok(mut record) => {
            record.observe(message, now);
            record
        }
        Err(StorageError::NotFound(_)) => AircraftRecord::from_message(message, None, now),
        Err(e) => return Err(e),
    };
    storage.insert(message.key, record)?;
    Ok(())
}
