//! Resident index root.
//!
//! Small indexes keep every entry inline in the index attribute as one sorted
//! entry list:
//!
//! ```text
//! +-----------------+--------------------------------------------------+
//! | Entry count     | Entries: [key_len u16][value_len u16][key][value] |
//! | (4 bytes)       | (variable)                                       |
//! +-----------------+--------------------------------------------------+
//! ```

#![allow(clippy::cast_possible_truncation)]

use crate::storage::index::node::{self, IndexEntry, Key};
use crate::types::MalformedRecord;
use crate::types::bytes;

/// Size of the entry count prefix.
const COUNT_SIZE: usize = 4;

/// The decoded entries of a resident index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResidentRoot {
    /// Entries in sorted order by key.
    pub entries: Vec<IndexEntry>,
}

impl ResidentRoot {
    /// Decode a resident root. The whole buffer must be consumed.
    pub fn decode(buffer: &[u8]) -> Result<Self, MalformedRecord> {
        let count = bytes::read_u32_le(buffer, 0)? as usize;
        let entries = node::read_entries(buffer, COUNT_SIZE, count)?;

        if COUNT_SIZE + node::entries_len(&entries) != buffer.len() {
            return Err(MalformedRecord::InvalidHeader("resident root length"));
        }
        Ok(Self { entries })
    }

    /// Encode the root into a new buffer.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; self.encoded_len()];
        bytes::write_u32_le(&mut buffer, 0, self.entries.len() as u32);
        node::write_entries(&mut buffer, COUNT_SIZE, &self.entries);
        buffer
    }

    /// Serialized size of the root.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        COUNT_SIZE + node::entries_len(&self.entries)
    }

    fn find_index(&self, key: &[u8]) -> Result<usize, usize> {
        self.entries.binary_search_by(|e| e.key.as_slice().cmp(key))
    }

    /// Get a value by key.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.find_index(key)
            .ok()
            .map(|i| self.entries[i].value.as_slice())
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, key: Key, value: Vec<u8>) {
        match self.find_index(&key) {
            Ok(i) => self.entries[i].value = value,
            Err(i) => self.entries.insert(i, IndexEntry { key, value }),
        }
    }

    /// Remove an entry, returning whether it was present.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        self.find_index(key)
            .map(|i| self.entries.remove(i))
            .is_ok()
    }

    /// Drop every entry ordered before `start_key`.
    pub fn skip_before(&mut self, start_key: &[u8]) {
        let start = self.find_index(start_key).unwrap_or_else(|i| i);
        self.entries = self.entries.split_off(start);
    }
}
