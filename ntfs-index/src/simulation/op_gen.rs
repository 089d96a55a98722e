//! Operation generator for deterministic simulation testing.
//!
//! Produces reproducible sequences of index operations. Keys are drawn from a
//! fixed pool so that upserts replace and deletes hit existing entries.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Configuration for operation generation.
#[derive(Debug, Clone)]
pub struct OperationGenConfig {
    /// Number of distinct keys operations draw from.
    pub key_pool_size: usize,
    /// Maximum key length in bytes (minimum is 1).
    pub max_key_len: usize,
    /// Maximum value length in bytes (minimum is 0).
    pub max_value_len: usize,
    /// Probability of a delete.
    pub delete_rate: f64,
    /// Probability of a search.
    pub search_rate: f64,
    /// Probability of an image round trip.
    pub reload_rate: f64,
    /// Probability of loading a corrupted copy of the image.
    pub corrupt_rate: f64,
}

impl Default for OperationGenConfig {
    fn default() -> Self {
        Self {
            key_pool_size: 200,
            max_key_len: 24,
            max_value_len: 40,
            delete_rate: 0.25,
            search_rate: 0.2,
            reload_rate: 0.02,
            corrupt_rate: 0.02,
        }
    }
}

/// One step of a simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Upsert { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
    Search { key: Vec<u8> },
    /// Serialize the index and load it back.
    Reload,
    /// Flip one bit of the serialized image and load the damaged copy.
    Corrupt { position: u64, bit: u8 },
}

/// Generator for random operations.
pub struct OperationGenerator {
    rng: StdRng,
    config: OperationGenConfig,
    key_pool: Vec<Vec<u8>>,
}

impl OperationGenerator {
    /// Create a generator with the default configuration.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, OperationGenConfig::default())
    }

    /// Create a generator with a custom configuration.
    #[must_use]
    pub fn with_config(seed: u64, config: OperationGenConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let key_pool = (0..config.key_pool_size)
            .map(|_| {
                let len = rng.random_range(1..=config.max_key_len);
                let mut key = vec![0u8; len];
                rng.fill(key.as_mut_slice());
                key
            })
            .collect();

        Self {
            rng,
            config,
            key_pool,
        }
    }

    /// Generate the next operation.
    pub fn next_operation(&mut self) -> Operation {
        let roll = self.rng.random::<f64>();
        let mut threshold = self.config.corrupt_rate;
        if roll < threshold {
            return Operation::Corrupt {
                position: self.rng.random(),
                bit: self.rng.random_range(0..8),
            };
        }
        threshold += self.config.reload_rate;
        if roll < threshold {
            return Operation::Reload;
        }
        threshold += self.config.delete_rate;
        if roll < threshold {
            return Operation::Delete {
                key: self.random_key(),
            };
        }
        threshold += self.config.search_rate;
        if roll < threshold {
            return Operation::Search {
                key: self.random_key(),
            };
        }

        Operation::Upsert {
            key: self.random_key(),
            value: self.random_value(),
        }
    }

    fn random_key(&mut self) -> Vec<u8> {
        let index = self.rng.random_range(0..self.key_pool.len());
        self.key_pool[index].clone()
    }

    fn random_value(&mut self) -> Vec<u8> {
        let len = self.rng.random_range(0..=self.config.max_value_len);
        let mut value = vec![0u8; len];
        self.rng.fill(value.as_mut_slice());
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_operations() {
        let mut a = OperationGenerator::new(7);
        let mut b = OperationGenerator::new(7);

        for _ in 0..100 {
            assert_eq!(a.next_operation(), b.next_operation());
        }
    }

    #[test]
    fn test_operations_respect_limits() {
        let config = OperationGenConfig {
            key_pool_size: 5,
            max_key_len: 3,
            max_value_len: 2,
            ..OperationGenConfig::default()
        };
        let mut generator = OperationGenerator::with_config(99, config);

        for _ in 0..500 {
            match generator.next_operation() {
                Operation::Upsert { key, value } => {
                    assert!((1..=3).contains(&key.len()));
                    assert!(value.len() <= 2);
                }
                Operation::Delete { key } | Operation::Search { key } => {
                    assert!((1..=3).contains(&key.len()));
                }
                Operation::Reload => {}
                Operation::Corrupt { bit, .. } => assert!(bit < 8),
            }
        }
    }
}
