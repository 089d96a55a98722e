//! Owning records.
//!
//! Every index lives inside a metadata record, stored as a named attribute.
//! Catalogs never own their index: they borrow the record, fetch the index
//! by name for each operation, and ask the record to persist after every
//! mutation.
//!
//! # Record image
//!
//! ```text
//! +--------+-----------+------------+-----------------------------+-------+
//! | "FILE" | Reference | Attr count | Per attribute:              | CRC32 |
//! | (4)    | (8)       | (4)        |  name len (u16), name,      | (4)   |
//! |        |           |            |  image len (u32), image     |       |
//! +--------+-----------+------------+-----------------------------+-------+
//! ```
//!
//! Attributes are stored in ascending name order. The CRC covers everything
//! before it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::storage::index::{IndexError, SortedIndex};
use crate::types::bytes;
use crate::types::{FileReference, MalformedRecord, RecordCodec};

/// Signature at the start of a record image.
const RECORD_SIGNATURE: [u8; 4] = *b"FILE";

/// Signature, reference and attribute count.
const RECORD_HEADER_SIZE: usize = 16;

/// Trailing checksum.
const CHECKSUM_SIZE: usize = 4;

/// A metadata record that holds named indexes and persists them on request.
pub trait OwningRecord {
    /// The named index, if the record has one.
    fn index(&self, name: &str) -> Option<&SortedIndex>;

    /// The named index, creating an empty one if the record has none.
    fn index_mut(&mut self, name: &str) -> &mut SortedIndex;

    /// Persist the record's current attribute set.
    ///
    /// Safe to call when nothing changed.
    fn update_record(&mut self) -> Result<(), RecordError>;
}

/// An in-memory file record with its persisted image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    reference: FileReference,
    indexes: BTreeMap<String, SortedIndex>,
    updates: u64,
    persisted: Vec<u8>,
}

impl FileRecord {
    /// Create a record with no attributes that has never been persisted.
    #[must_use]
    pub const fn new(reference: FileReference) -> Self {
        Self {
            reference,
            indexes: BTreeMap::new(),
            updates: 0,
            persisted: Vec::new(),
        }
    }

    /// The reference naming this record.
    #[must_use]
    pub const fn reference(&self) -> FileReference {
        self.reference
    }

    /// Number of times `update_record` has persisted this record.
    #[must_use]
    pub const fn updates(&self) -> u64 {
        self.updates
    }

    /// The image written by the last `update_record`, or the image the
    /// record was loaded from.
    #[must_use]
    pub fn persisted_image(&self) -> &[u8] {
        &self.persisted
    }

    /// Names of the index attributes, in ascending order.
    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(String::as_str)
    }

    /// Whether any index changed since the record was last persisted.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.indexes.values().any(SortedIndex::is_modified)
    }

    /// Serialize the record into its image.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordError> {
        let count = u32::try_from(self.indexes.len())
            .map_err(|_| RecordError::TooManyAttributes(self.indexes.len()))?;

        let mut out = Vec::with_capacity(RECORD_HEADER_SIZE + CHECKSUM_SIZE);
        out.extend_from_slice(&RECORD_SIGNATURE);
        out.extend_from_slice(&self.reference.to_bytes());
        out.extend_from_slice(&count.to_le_bytes());

        for (name, index) in &self.indexes {
            let name_len = u16::try_from(name.len())
                .map_err(|_| RecordError::InvalidAttributeName(name.clone()))?;
            let image = index.to_bytes();
            let image_len = u32::try_from(image.len()).map_err(|_| {
                RecordError::AttributeTooLarge {
                    name: name.clone(),
                    size: image.len(),
                }
            })?;

            out.extend_from_slice(&name_len.to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(&image_len.to_le_bytes());
            out.extend_from_slice(&image);
        }

        let checksum = crc32fast::hash(&out);
        out.extend_from_slice(&checksum.to_le_bytes());
        Ok(out)
    }

    /// Load a record from its image.
    pub fn from_bytes(image: &[u8]) -> Result<Self, RecordError> {
        if image.len() < RECORD_HEADER_SIZE + CHECKSUM_SIZE {
            return Err(MalformedRecord::Truncated {
                offset: 0,
                needed: RECORD_HEADER_SIZE + CHECKSUM_SIZE,
                available: image.len(),
            }
            .into());
        }

        let body_len = image.len() - CHECKSUM_SIZE;
        let (body, trailer) = image.split_at(body_len);
        let expected = bytes::read_u32_le(trailer, 0)?;
        let actual = crc32fast::hash(body);
        if expected != actual {
            return Err(MalformedRecord::ChecksumMismatch { expected, actual }.into());
        }

        let signature: [u8; 4] = bytes::read_array(body, 0)?;
        if signature != RECORD_SIGNATURE {
            return Err(MalformedRecord::InvalidSignature(u32::from_le_bytes(signature)).into());
        }

        let reference = FileReference::read_from(body, 4)?;
        let count = bytes::read_u32_le(body, 12)?;

        let mut indexes = BTreeMap::new();
        let mut offset = RECORD_HEADER_SIZE;
        for position in 0..count as usize {
            let name_len = bytes::read_u16_le(body, offset)? as usize;
            offset += 2;
            let name = std::str::from_utf8(bytes::read_bytes(body, offset, name_len)?)
                .map_err(|_| MalformedRecord::InvalidHeader("attribute name"))?
                .to_owned();
            offset += name_len;

            let image_len = bytes::read_u32_le(body, offset)? as usize;
            offset += 4;
            let index = SortedIndex::from_bytes(bytes::read_bytes(body, offset, image_len)?)?;
            offset += image_len;

            // Names must be strictly ascending so the image re-serializes
            // byte for byte
            if indexes.last_key_value().is_some_and(|(last, _)| *last >= name) {
                return Err(MalformedRecord::UnsortedKeys { position }.into());
            }
            indexes.insert(name, index);
        }

        if offset != body.len() {
            return Err(MalformedRecord::InvalidHeader("record length").into());
        }

        Ok(Self {
            reference,
            indexes,
            updates: 0,
            persisted: image.to_vec(),
        })
    }

    /// Write the current record image to `path`.
    pub fn save(&self, path: &Path) -> Result<(), RecordError> {
        let image = self.to_bytes()?;
        std::fs::write(path, &image).map_err(RecordError::Io)?;
        tracing::debug!(
            reference = %self.reference,
            bytes = image.len(),
            path = %path.display(),
            "saved record"
        );
        Ok(())
    }

    /// Read a record image from `path`.
    pub fn load(path: &Path) -> Result<Self, RecordError> {
        let image = std::fs::read(path).map_err(RecordError::Io)?;
        let record = Self::from_bytes(&image).inspect_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "failed to load record");
        })?;
        tracing::debug!(
            reference = %record.reference,
            attributes = record.indexes.len(),
            path = %path.display(),
            "loaded record"
        );
        Ok(record)
    }
}

impl OwningRecord for FileRecord {
    fn index(&self, name: &str) -> Option<&SortedIndex> {
        self.indexes.get(name)
    }

    fn index_mut(&mut self, name: &str) -> &mut SortedIndex {
        self.indexes.entry(name.to_owned()).or_default()
    }

    fn update_record(&mut self) -> Result<(), RecordError> {
        self.persisted = self.to_bytes()?;
        for index in self.indexes.values_mut() {
            index.clear_modified();
        }
        self.updates += 1;
        tracing::trace!(
            reference = %self.reference,
            updates = self.updates,
            bytes = self.persisted.len(),
            "record updated"
        );
        Ok(())
    }
}

/// Errors from owning record operations.
#[derive(Debug)]
pub enum RecordError {
    /// The record image is corrupt or truncated.
    Malformed(MalformedRecord),
    /// An index operation failed for a reason other than corruption.
    Index(IndexError),
    /// I/O error reading or writing the image.
    Io(std::io::Error),
    /// Attribute name too long to store.
    InvalidAttributeName(String),
    /// Attribute image too large to store.
    AttributeTooLarge { name: String, size: usize },
    /// More attributes than the image can count.
    TooManyAttributes(usize),
}

impl RecordError {
    /// Whether this error indicates on-disk corruption.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "malformed record: {e}"),
            Self::Index(e) => write!(f, "index error: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::InvalidAttributeName(name) => {
                write!(f, "attribute name too long: {} bytes", name.len())
            }
            Self::AttributeTooLarge { name, size } => {
                write!(f, "attribute {name} too large: {size} bytes")
            }
            Self::TooManyAttributes(count) => write!(f, "too many attributes: {count}"),
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Malformed(e) => Some(e),
            Self::Index(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::InvalidAttributeName(_)
            | Self::AttributeTooLarge { .. }
            | Self::TooManyAttributes(_) => None,
        }
    }
}

impl From<MalformedRecord> for RecordError {
    fn from(e: MalformedRecord) -> Self {
        Self::Malformed(e)
    }
}

impl From<IndexError> for RecordError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::MalformedRecord(e) => Self::Malformed(e),
            other @ IndexError::EntryTooLarge { .. } => Self::Index(other),
        }
    }
}
