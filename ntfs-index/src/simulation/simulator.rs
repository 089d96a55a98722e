//! Main simulator harness for deterministic simulation testing.
//!
//! Applies generated operations to a [`SortedIndex`] and to a `BTreeMap`
//! model side by side, comparing every result and checking invariants after
//! each step.

use std::collections::BTreeMap;

use crate::storage::{IndexError, MAX_ENTRY_SIZE, RESIDENT_LIMIT, SortedIndex};

use super::{
    InvariantChecker, InvariantViolation, Operation, OperationGenConfig, OperationGenerator,
};

/// Configuration for the simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Operation generation configuration.
    pub operation_config: OperationGenConfig,
    /// Resident limit of the index under test.
    pub resident_limit: usize,
}

impl SimulatorConfig {
    /// Create a new simulator config with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            operation_config: OperationGenConfig::default(),
            resident_limit: RESIDENT_LIMIT,
        }
    }

    /// Set the operation configuration.
    #[must_use]
    pub const fn with_operation_config(mut self, config: OperationGenConfig) -> Self {
        self.operation_config = config;
        self
    }

    /// Set the resident limit of the index under test.
    #[must_use]
    pub const fn with_resident_limit(mut self, limit: usize) -> Self {
        self.resident_limit = limit;
        self
    }
}

/// Results from a simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The seed used for this simulation.
    pub seed: u64,
    /// Number of operations applied.
    pub operations_processed: usize,
    /// Number of corrupted images that were rejected on load or on access.
    pub corruptions_detected: u64,
    /// Whether the index was promoted to paged storage during the run.
    pub promoted: bool,
    /// Entries in the index at the end of the run.
    pub final_len: usize,
    /// Invariant violations detected.
    pub invariant_violations: Vec<InvariantViolation>,
}

impl SimulationResult {
    /// Check if the simulation passed (no invariant violations).
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.invariant_violations.is_empty()
    }
}

/// The main simulator harness.
pub struct Simulator {
    config: SimulatorConfig,
    generator: OperationGenerator,
    checker: InvariantChecker,
    index: SortedIndex,
    model: BTreeMap<Vec<u8>, Vec<u8>>,
    operations_processed: usize,
    corruptions_detected: u64,
}

impl Simulator {
    /// Create a new simulator with the given configuration.
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        let generator = OperationGenerator::with_config(config.seed, config.operation_config.clone());
        let index = SortedIndex::with_resident_limit(config.resident_limit);

        Self {
            config,
            generator,
            checker: InvariantChecker::new(),
            index,
            model: BTreeMap::new(),
            operations_processed: 0,
            corruptions_detected: 0,
        }
    }

    /// Run the simulation for a given number of operations.
    pub fn run(&mut self, operation_count: usize) -> SimulationResult {
        for _ in 0..operation_count {
            let operation = self.generator.next_operation();
            let operation_index = self.operations_processed;
            self.apply(operation, operation_index);
            self.operations_processed += 1;

            self.checker
                .check_index(&self.index, &self.model, operation_index);
        }

        SimulationResult {
            seed: self.config.seed,
            operations_processed: self.operations_processed,
            corruptions_detected: self.corruptions_detected,
            promoted: self.checker.saw_promotion(),
            final_len: self.model.len(),
            invariant_violations: self.checker.violations().to_vec(),
        }
    }

    /// The index under test.
    #[must_use]
    pub const fn index(&self) -> &SortedIndex {
        &self.index
    }

    fn apply(&mut self, operation: Operation, operation_index: usize) {
        match operation {
            Operation::Upsert { key, value } => {
                let result = self.index.upsert(&key, &value);
                let too_large = key.len() + value.len() > MAX_ENTRY_SIZE;
                match result {
                    Ok(()) if !too_large => {
                        self.model.insert(key, value);
                    }
                    Err(IndexError::EntryTooLarge { .. }) if too_large => {}
                    other => self.checker.add_violation(
                        operation_index,
                        "Unexpected upsert result",
                        format!("{other:?} for {} byte entry", key.len() + value.len()),
                    ),
                }
            }
            Operation::Delete { key } => {
                let expected = self.model.remove(&key).is_some();
                match self.index.delete(&key) {
                    Ok(removed) if removed == expected => {}
                    other => self.checker.add_violation(
                        operation_index,
                        "Unexpected delete result",
                        format!("{other:?}, model had entry: {expected}"),
                    ),
                }
            }
            Operation::Search { key } => {
                let expected = self.model.get(&key).cloned();
                match self.index.search(&key) {
                    Ok(found) if found == expected => {}
                    other => self.checker.add_violation(
                        operation_index,
                        "Unexpected search result",
                        format!("{other:?}, model: {expected:?}"),
                    ),
                }
            }
            Operation::Reload => self.reload(operation_index),
            Operation::Corrupt { position, bit } => self.load_corrupted(position, bit),
        }
    }

    /// Serialize the index, load it back and require a byte-exact image.
    fn reload(&mut self, operation_index: usize) {
        let image = self.index.to_bytes();
        match SortedIndex::from_bytes(&image) {
            Ok(restored) if restored.to_bytes() == image => {
                self.checker
                    .check_index(&restored, &self.model, operation_index);
            }
            Ok(_) => self.checker.add_violation(
                operation_index,
                "Reloaded image differs",
                String::new(),
            ),
            Err(e) => self.checker.add_violation(
                operation_index,
                "Reloading a valid image failed",
                e.to_string(),
            ),
        }
    }

    /// Load a copy of the image with one bit flipped and touch every entry.
    ///
    /// Damage must surface as an error or go unnoticed; it must never panic.
    /// The index under test is left untouched.
    fn load_corrupted(&mut self, position: u64, bit: u8) {
        let mut image = self.index.to_bytes();
        #[allow(clippy::cast_possible_truncation)]
        let offset = (position % image.len() as u64) as usize;
        image[offset] ^= 1 << bit;

        let detected = match SortedIndex::from_bytes(&image) {
            Err(_) => true,
            Ok(damaged) => {
                let scan_failed = damaged.iter().any(|entry| entry.is_err());
                let search_failed = self
                    .model
                    .keys()
                    .next()
                    .is_some_and(|key| damaged.search(key).is_err());
                scan_failed || search_failed
            }
        };

        if detected {
            self.corruptions_detected += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_passed(result: &SimulationResult) {
        assert!(
            result.passed(),
            "seed {} failed: {:?}",
            result.seed,
            result.invariant_violations
        );
    }

    #[test]
    fn test_simulator_resident_only() {
        let config = SimulatorConfig::new(12345)
            .with_resident_limit(usize::MAX)
            .with_operation_config(OperationGenConfig {
                corrupt_rate: 0.0,
                ..OperationGenConfig::default()
            });
        let mut sim = Simulator::new(config);
        let result = sim.run(500);

        assert_passed(&result);
        assert!(!result.promoted);
        assert!(sim.index().is_resident());
        assert!(result.final_len > 0);
    }

    #[test]
    fn test_simulator_promotes_small_limit() {
        let mut sim = Simulator::new(SimulatorConfig::new(42).with_resident_limit(256));
        let result = sim.run(1000);

        assert_passed(&result);
        assert!(result.promoted);
        assert!(!sim.index().is_resident());
    }

    #[test]
    fn test_simulator_multi_level_tree() {
        // Large entries and many keys force internal pages
        let operation_config = OperationGenConfig {
            key_pool_size: 600,
            max_key_len: 200,
            max_value_len: 300,
            delete_rate: 0.1,
            ..OperationGenConfig::default()
        };
        let config = SimulatorConfig::new(7).with_operation_config(operation_config);
        let mut sim = Simulator::new(config);
        let result = sim.run(800);

        assert_passed(&result);
        assert!(result.promoted);
    }

    #[test]
    fn test_simulator_many_seeds() {
        for seed in 0..20 {
            let config = SimulatorConfig::new(seed).with_resident_limit(512);
            let mut sim = Simulator::new(config);
            assert_passed(&sim.run(300));
        }
    }

    #[test]
    fn test_simulator_is_deterministic() {
        let run = |seed| {
            let mut sim = Simulator::new(SimulatorConfig::new(seed).with_resident_limit(128));
            let result = sim.run(400);
            (result.final_len, result.corruptions_detected, sim.index().to_bytes())
        };

        assert_eq!(run(99), run(99));
    }

    #[test]
    fn test_simulator_detects_page_corruption() {
        let operation_config = OperationGenConfig {
            corrupt_rate: 0.3,
            reload_rate: 0.0,
            ..OperationGenConfig::default()
        };
        let config = SimulatorConfig::new(2024)
            .with_resident_limit(64)
            .with_operation_config(operation_config);
        let mut sim = Simulator::new(config);
        let result = sim.run(600);

        assert_passed(&result);
        assert!(result.corruptions_detected > 0);
    }
}
