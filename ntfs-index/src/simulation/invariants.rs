//! Invariant checking for deterministic simulation testing.
//!
//! After every operation the index under test is compared against a
//! `BTreeMap` holding the entries it should contain.

use std::collections::BTreeMap;

use crate::storage::SortedIndex;

/// A detected invariant violation.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    /// Description of the violation.
    pub description: String,
    /// Operation index where it was detected.
    pub operation_index: usize,
    /// Additional context.
    pub context: String,
}

/// Checker for sorted index invariants.
#[derive(Debug, Default)]
pub struct InvariantChecker {
    violations: Vec<InvariantViolation>,
    /// Set once the index has left resident storage.
    promoted: bool,
}

impl InvariantChecker {
    /// Create a new checker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all detected violations.
    #[must_use]
    pub fn violations(&self) -> &[InvariantViolation] {
        &self.violations
    }

    /// Check if any violations were detected.
    #[must_use]
    pub const fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Whether the index was seen in paged storage.
    #[must_use]
    pub const fn saw_promotion(&self) -> bool {
        self.promoted
    }

    /// Add a violation.
    pub fn add_violation(&mut self, operation_index: usize, description: &str, context: String) {
        self.violations.push(InvariantViolation {
            description: description.to_string(),
            operation_index,
            context,
        });
    }

    /// Check the full index against the model.
    pub fn check_index(
        &mut self,
        index: &SortedIndex,
        model: &BTreeMap<Vec<u8>, Vec<u8>>,
        operation_index: usize,
    ) {
        self.check_tier(index, operation_index);
        self.check_scan(index, model, operation_index);

        match index.len() {
            Ok(len) if len == model.len() => {}
            Ok(len) => self.add_violation(
                operation_index,
                "Entry count does not match model",
                format!("index={len}, model={}", model.len()),
            ),
            Err(e) => self.add_violation(operation_index, "Counting entries failed", e.to_string()),
        }
    }

    /// An index never returns to resident storage once promoted.
    fn check_tier(&mut self, index: &SortedIndex, operation_index: usize) {
        if index.is_resident() {
            if self.promoted {
                self.add_violation(
                    operation_index,
                    "Index returned to resident storage",
                    String::new(),
                );
            }
        } else {
            self.promoted = true;
        }
    }

    /// Iteration yields exactly the model's entries in strictly ascending
    /// key order.
    fn check_scan(
        &mut self,
        index: &SortedIndex,
        model: &BTreeMap<Vec<u8>, Vec<u8>>,
        operation_index: usize,
    ) {
        let mut expected = model.iter();
        let mut previous: Option<Vec<u8>> = None;

        for entry in index.iter() {
            let (key, value) = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.add_violation(operation_index, "Scan failed", e.to_string());
                    return;
                }
            };

            if previous.as_ref().is_some_and(|p| *p >= key) {
                self.add_violation(
                    operation_index,
                    "Keys not strictly ascending",
                    format!("{previous:?} then {key:?}"),
                );
                return;
            }

            match expected.next() {
                Some((k, v)) if *k == key && *v == value => {}
                other => {
                    self.add_violation(
                        operation_index,
                        "Scan does not match model",
                        format!("index={key:?}, model={other:?}"),
                    );
                    return;
                }
            }
            previous = Some(key);
        }

        if let Some((k, _)) = expected.next() {
            self.add_violation(
                operation_index,
                "Scan ended before model",
                format!("missing {k:?}"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_index_passes() {
        let mut index = SortedIndex::new();
        let mut model = BTreeMap::new();
        for key in [b"b".to_vec(), b"a".to_vec()] {
            index.upsert(&key, b"v").expect("upsert");
            model.insert(key, b"v".to_vec());
        }

        let mut checker = InvariantChecker::new();
        checker.check_index(&index, &model, 0);
        assert!(!checker.has_violations(), "{:?}", checker.violations());
    }

    #[test]
    fn test_detects_missing_and_extra_entries() {
        let mut index = SortedIndex::new();
        index.upsert(b"a", b"").expect("upsert");

        let mut model = BTreeMap::new();
        model.insert(b"a".to_vec(), Vec::new());
        model.insert(b"b".to_vec(), Vec::new());

        let mut checker = InvariantChecker::new();
        checker.check_index(&index, &model, 3);

        let descriptions: Vec<&str> = checker
            .violations()
            .iter()
            .map(|v| v.description.as_str())
            .collect();
        assert_eq!(
            descriptions,
            vec!["Scan ended before model", "Entry count does not match model"]
        );
        assert!(checker.violations().iter().all(|v| v.operation_index == 3));
    }

    #[test]
    fn test_detects_stale_value() {
        let mut index = SortedIndex::new();
        index.upsert(b"a", b"old").expect("upsert");

        let mut model = BTreeMap::new();
        model.insert(b"a".to_vec(), b"new".to_vec());

        let mut checker = InvariantChecker::new();
        checker.check_index(&index, &model, 0);
        assert_eq!(checker.violations().len(), 1);
    }
}
