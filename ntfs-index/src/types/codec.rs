//! Fixed-size binary record codec.
//!
//! Every key and value stored in a sorted index implements [`RecordCodec`].
//! The index itself only ever sees the serialized bytes; the codec is what
//! turns them back into typed records.
//!
//! # Example
//!
//! ```
//! use ntfs_index::types::{MalformedRecord, RecordCodec, bytes};
//!
//! #[derive(Debug, PartialEq, Eq)]
//! struct Extent {
//!     start: u32,
//!     length: u32,
//! }
//!
//! impl RecordCodec for Extent {
//!     const SIZE: usize = 8;
//!
//!     fn read_from(buffer: &[u8], offset: usize) -> Result<Self, MalformedRecord> {
//!         Ok(Self {
//!             start: bytes::read_u32_le(buffer, offset)?,
//!             length: bytes::read_u32_le(buffer, offset + 4)?,
//!         })
//!     }
//!
//!     fn write_to(&self, buffer: &mut [u8], offset: usize) {
//!         bytes::write_u32_le(buffer, offset, self.start);
//!         bytes::write_u32_le(buffer, offset + 4, self.length);
//!     }
//! }
//!
//! let extent = Extent { start: 7, length: 3 };
//! let encoded = extent.to_bytes();
//! assert_eq!(encoded, [7, 0, 0, 0, 3, 0, 0, 0]);
//! assert_eq!(Extent::from_bytes(&encoded), Ok(extent));
//! ```

use std::fmt;

use crate::types::bytes;

/// A record type with a fixed-size little-endian binary form.
///
/// # Contract
///
/// - `read_from` consumes exactly `SIZE` bytes at `offset` and fails with
///   [`MalformedRecord`] when fewer are available.
/// - `write_to` writes exactly `SIZE` bytes at `offset`; the caller
///   guarantees the buffer is large enough.
/// - Neither method has side effects beyond the returned value or the
///   written bytes.
pub trait RecordCodec: Sized {
    /// Serialized length in bytes. Zero is valid and means "no payload".
    const SIZE: usize;

    /// Serialized length of this record.
    #[must_use]
    fn size(&self) -> usize {
        Self::SIZE
    }

    /// Decode a record from `buffer` starting at `offset`.
    fn read_from(buffer: &[u8], offset: usize) -> Result<Self, MalformedRecord>;

    /// Encode this record into `buffer` starting at `offset`.
    fn write_to(&self, buffer: &mut [u8], offset: usize);

    /// Encode into a freshly allocated buffer of exactly `size()` bytes.
    #[must_use]
    fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; self.size()];
        self.write_to(&mut buffer, 0);
        buffer
    }

    /// Decode from the start of `bytes`.
    fn from_bytes(bytes: &[u8]) -> Result<Self, MalformedRecord> {
        Self::read_from(bytes, 0)
    }
}

impl RecordCodec for () {
    const SIZE: usize = 0;

    fn read_from(buffer: &[u8], offset: usize) -> Result<Self, MalformedRecord> {
        bytes::read_bytes(buffer, offset, 0).map(|_| ())
    }

    fn write_to(&self, _buffer: &mut [u8], _offset: usize) {}
}

impl RecordCodec for u32 {
    const SIZE: usize = 4;

    fn read_from(buffer: &[u8], offset: usize) -> Result<Self, MalformedRecord> {
        bytes::read_u32_le(buffer, offset)
    }

    fn write_to(&self, buffer: &mut [u8], offset: usize) {
        bytes::write_u32_le(buffer, offset, *self);
    }
}

impl RecordCodec for u64 {
    const SIZE: usize = 8;

    fn read_from(buffer: &[u8], offset: usize) -> Result<Self, MalformedRecord> {
        bytes::read_u64_le(buffer, offset)
    }

    fn write_to(&self, buffer: &mut [u8], offset: usize) {
        bytes::write_u64_le(buffer, offset, *self);
    }
}

impl<const N: usize> RecordCodec for [u8; N] {
    const SIZE: usize = N;

    fn read_from(buffer: &[u8], offset: usize) -> Result<Self, MalformedRecord> {
        bytes::read_array(buffer, offset)
    }

    fn write_to(&self, buffer: &mut [u8], offset: usize) {
        bytes::write_bytes(buffer, offset, self);
    }
}

/// Backing bytes that cannot be decoded.
///
/// Always indicates on-disk corruption (or a caller handing in the wrong
/// buffer). It is never recovered from locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedRecord {
    /// Fewer bytes were available than the record needs.
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    /// A structure header could not be parsed.
    InvalidHeader(&'static str),
    /// Unknown page type byte.
    InvalidPageType(u8),
    /// Unknown signature at the start of a structure.
    InvalidSignature(u32),
    /// Page checksum does not match its contents.
    ChecksumMismatch { expected: u32, actual: u32 },
    /// Decoded keys are not in strictly ascending order.
    UnsortedKeys { position: usize },
    /// A node points at a page the allocation does not contain.
    DanglingPage(u64),
}

impl fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated {
                offset,
                needed,
                available,
            } => write!(
                f,
                "truncated record: need {needed} bytes at offset {offset}, {available} available"
            ),
            Self::InvalidHeader(what) => write!(f, "invalid {what} header"),
            Self::InvalidPageType(v) => write!(f, "invalid page type: 0x{v:02x}"),
            Self::InvalidSignature(v) => write!(f, "invalid signature: 0x{v:08x}"),
            Self::ChecksumMismatch { expected, actual } => {
                write!(f, "checksum mismatch: expected {expected}, got {actual}")
            }
            Self::UnsortedKeys { position } => {
                write!(f, "keys out of order at entry {position}")
            }
            Self::DanglingPage(page) => write!(f, "reference to missing page {page}"),
        }
    }
}

impl std::error::Error for MalformedRecord {}
