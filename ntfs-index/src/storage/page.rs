//! Index page types and constants.
//!
//! Once an index outgrows its resident root it is stored in fixed-size
//! index pages. Every page starts with a small header carrying the page type
//! and a CRC32 over the page contents.

use crate::types::MalformedRecord;
use crate::types::bytes;

/// Page size in bytes (4KB, one index block).
pub const PAGE_SIZE: usize = 4096;

/// A page identifier within an index allocation (1-based).
pub type PageId = u64;

/// Sentinel for "no page" in parent and sibling links.
pub const NO_PAGE: PageId = 0;

/// Page type identifiers stored in page headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageType {
    /// Index node holding separator keys and child links
    Internal = 0x01,
    /// Index node holding entries
    Leaf = 0x02,
}

impl TryFrom<u8> for PageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Internal),
            0x02 => Ok(Self::Leaf),
            _ => Err(value),
        }
    }
}

/// Common page header present at the start of every index page.
///
/// Layout:
/// - `page_type`: 1 byte
/// - `flags`: 1 byte
/// - `checksum`: 4 bytes (CRC32)
/// - `reserved`: 2 bytes
///
/// Total: 8 bytes
#[derive(Debug, Copy, Clone)]
pub struct PageHeader {
    pub page_type: PageType,
    pub flags: u8,
    pub checksum: u32,
}

impl PageHeader {
    /// Size of the page header in bytes.
    pub const SIZE: usize = 8;

    /// Serialize the header to bytes.
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = self.page_type as u8;
        buf[1] = self.flags;
        buf[2..6].copy_from_slice(&self.checksum.to_le_bytes());
        // bytes 6-7 reserved
        buf
    }

    /// Deserialize a header from bytes.
    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Result<Self, MalformedRecord> {
        let page_type = PageType::try_from(bytes[0]).map_err(MalformedRecord::InvalidPageType)?;
        let flags = bytes[1];
        let checksum = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);

        Ok(Self {
            page_type,
            flags,
            checksum,
        })
    }
}

/// A raw page buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
    data: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    /// Create a new zeroed page.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Box::new([0u8; PAGE_SIZE]),
        }
    }

    /// Create a page from a slice of exactly `PAGE_SIZE` bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, MalformedRecord> {
        let mut page = Self::new();
        page.data
            .copy_from_slice(bytes::read_bytes(bytes, 0, PAGE_SIZE)?);
        Ok(page)
    }

    /// Get the raw page data.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    /// Get mutable access to the raw page data.
    pub fn as_bytes_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }

    /// Parse the page header.
    pub fn header(&self) -> Result<PageHeader, MalformedRecord> {
        PageHeader::from_bytes(bytes::read_array(self.data.as_slice(), 0)?)
    }

    /// Read bytes at a specific offset.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<&[u8], MalformedRecord> {
        bytes::read_bytes(self.data.as_slice(), offset, len)
    }

    /// Write bytes at a specific offset.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Read a u16 (little-endian) at the given offset.
    pub fn read_u16(&self, offset: usize) -> Result<u16, MalformedRecord> {
        bytes::read_u16_le(self.data.as_slice(), offset)
    }

    /// Write a u16 (little-endian) at the given offset.
    pub fn write_u16(&mut self, offset: usize, value: u16) {
        bytes::write_u16_le(self.data.as_mut_slice(), offset, value);
    }

    /// Read a u64 (little-endian) at the given offset.
    pub fn read_u64(&self, offset: usize) -> Result<u64, MalformedRecord> {
        bytes::read_u64_le(self.data.as_slice(), offset)
    }

    /// Write a u64 (little-endian) at the given offset.
    pub fn write_u64(&mut self, offset: usize, value: u64) {
        bytes::write_u64_le(self.data.as_mut_slice(), offset, value);
    }

    /// Compute CRC32 checksum of the page data (excluding the checksum field itself).
    /// Assumes checksum is stored at bytes 2-5 of the header.
    #[must_use]
    pub fn compute_checksum(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.data[0..2]); // page_type + flags
        hasher.update(&[0u8; 4]); // zero out checksum field
        hasher.update(&self.data[6..]); // rest of page
        hasher.finalize()
    }

    /// Store the current checksum in the header.
    pub fn seal(&mut self) {
        let checksum = self.compute_checksum();
        self.data[2..6].copy_from_slice(&checksum.to_le_bytes());
    }

    /// Check the stored checksum against the page contents.
    pub fn verify(&self) -> Result<(), MalformedRecord> {
        let expected = self.header()?.checksum;
        let actual = self.compute_checksum();
        if expected == actual {
            Ok(())
        } else {
            Err(MalformedRecord::ChecksumMismatch { expected, actual })
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("first_16_bytes", &&self.data[..16])
            .finish_non_exhaustive()
    }
}
