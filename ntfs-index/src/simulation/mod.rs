//! Deterministic simulation testing for sorted indexes.
//!
//! Drives a [`SortedIndex`](crate::storage::SortedIndex) with seeded random
//! operations and compares it against a `BTreeMap` model after every step:
//! - Reproducible random operation generation
//! - Invariant checking after each operation
//! - Image round trips and byte-flip corruption of saved images
//!
//! Given the same seed, execution is identical.
//!
//! # Usage
//!
//! ```ignore
//! use simulation::{Simulator, SimulatorConfig};
//!
//! let config = SimulatorConfig::new(12345).with_resident_limit(256);
//!
//! let mut sim = Simulator::new(config);
//! let result = sim.run(1000);
//!
//! assert!(result.passed());
//! ```

mod invariants;
mod op_gen;
mod simulator;

pub use invariants::{InvariantChecker, InvariantViolation};
pub use op_gen::{Operation, OperationGenConfig, OperationGenerator};
pub use simulator::{SimulationResult, Simulator, SimulatorConfig};
