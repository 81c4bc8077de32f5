//! Deterministic simulation testing.
//!
//! Seeded generators drive the storage backends and the feed parser with
//! long randomized workloads, and every answer is checked against a
//! reference model:
//! - storage operations are replayed on a `std` ordered map
//! - generated feed lines carry the breakage they were given
//! - the tree's structure is validated after each step
//!
//! Given the same seed, a run is identical, so a failing seed reproduces.
//!
//! # Usage
//!
//! ```
//! use aggregator::simulation::{Simulator, SimulatorConfig};
//!
//! let config = SimulatorConfig::new(12345).with_degree(3);
//! let result = Simulator::new(config).run(1000).expect("valid degree");
//!
//! assert!(result.passed(), "{:?}", result.violations);
//! ```

mod line_gen;
mod op_gen;
mod simulator;

pub use line_gen::{GeneratedLine, LineGenConfig, LineGenerator, MalformationType};
pub use op_gen::{OpGenConfig, Operation, OperationGenerator};
pub use simulator::{SimulationResult, Simulator, SimulatorConfig, Violation};
