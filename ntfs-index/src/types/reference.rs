//! File references.
//!
//! A file reference names a record in the master file table. It packs the
//! 48-bit record number together with a 16-bit sequence number that is bumped
//! every time the record slot is reused, so a stale reference to a recycled
//! slot never compares equal to the new occupant.

use std::fmt;

use crate::types::bytes;
use crate::types::codec::{MalformedRecord, RecordCodec};

/// Mask selecting the record number bits of a packed reference.
const RECORD_NUMBER_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

/// Bit offset of the sequence number in a packed reference.
const SEQUENCE_SHIFT: u32 = 48;

/// A packed (record number, sequence number) pair.
///
/// # Invariants
///
/// - The record number fits in 48 bits.
/// - Two references are equal only if both fields match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FileReference(u64);

impl FileReference {
    /// Reference to the master file table itself (record 0, sequence 0).
    pub const MFT: Self = Self(0);

    /// Create a reference from its parts.
    ///
    /// Record numbers wider than 48 bits are truncated to 48 bits.
    #[must_use]
    #[allow(clippy::cast_lossless)] // u64::from is not const
    pub const fn new(record_number: u64, sequence_number: u16) -> Self {
        Self((record_number & RECORD_NUMBER_MASK) | ((sequence_number as u64) << SEQUENCE_SHIFT))
    }

    /// Rebuild a reference from its packed on-disk value.
    #[must_use]
    pub const fn unpack(value: u64) -> Self {
        Self(value)
    }

    /// The packed on-disk value.
    #[must_use]
    pub const fn pack(self) -> u64 {
        self.0
    }

    /// Index of the record in the master file table.
    #[must_use]
    pub const fn record_number(self) -> u64 {
        self.0 & RECORD_NUMBER_MASK
    }

    /// Reuse counter of the record slot.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // the shift leaves exactly 16 bits
    pub const fn sequence_number(self) -> u16 {
        (self.0 >> SEQUENCE_SHIFT) as u16
    }

    /// Whether this is the all-zero reference.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for FileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.record_number(), self.sequence_number())
    }
}

impl From<u64> for FileReference {
    fn from(value: u64) -> Self {
        Self::unpack(value)
    }
}

impl From<FileReference> for u64 {
    fn from(reference: FileReference) -> Self {
        reference.pack()
    }
}

impl RecordCodec for FileReference {
    const SIZE: usize = 8;

    fn read_from(buffer: &[u8], offset: usize) -> Result<Self, MalformedRecord> {
        bytes::read_u64_le(buffer, offset).map(Self::unpack)
    }

    fn write_to(&self, buffer: &mut [u8], offset: usize) {
        bytes::write_u64_le(buffer, offset, self.pack());
    }
}
