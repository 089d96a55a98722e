//! Sorted index core.
//!
//! A [`SortedIndex`] is an ordered set of unique (key bytes, value bytes)
//! entries. Keys compare byte-wise; inserting an existing key replaces its
//! value. Every catalog in the volume (reparse points, object ids, security
//! descriptors) sits on top of one of these.
//!
//! # Storage tiers
//!
//! - Resident: the entries are kept inline as one encoded entry list. This is
//!   how every index starts.
//! - Paged: once the encoded entry list would exceed the resident limit, the
//!   entries move into a B-tree of checksummed index pages. An index never
//!   moves back.
//!
//! Both tiers keep their bytes as the only copy of the data; each operation
//! decodes what it needs, so corruption surfaces as
//! [`MalformedRecord`] on the operation that touches it.
//!
//! # Attribute image
//!
//! ```text
//! +-----------+--------+----------+--------------------------------------+
//! | "INDX"    | Flags  | Reserved | Resident: root len (u32) + root      |
//! | (4 bytes) | (1)    | (3)      | Paged: root page (u64), page count   |
//! |           |        |          |        (u32), pages                  |
//! +-----------+--------+----------+--------------------------------------+
//! ```

mod allocation;
mod node;
mod root;
mod tree;

use std::fmt;

pub use allocation::IndexAllocation;
pub use node::{IndexEntry, Key, MAX_ENTRY_SIZE};
pub use tree::{IndexTree, TreeCursor};

use crate::storage::page::PAGE_SIZE;
use crate::types::MalformedRecord;
use crate::types::bytes;
use root::ResidentRoot;

/// Largest encoded resident root before the index is promoted to pages.
pub const RESIDENT_LIMIT: usize = 1024;

/// Signature at the start of an index attribute image.
const IMAGE_SIGNATURE: [u8; 4] = *b"INDX";

/// Image flag: entries live in index pages.
const FLAG_LARGE_INDEX: u8 = 0x01;

/// Size of the fixed image header (signature, flags, reserved).
const IMAGE_HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Storage {
    /// Encoded [`ResidentRoot`].
    Resident(Vec<u8>),
    Paged(IndexTree),
}

/// An ordered collection of unique serialized entries.
///
/// # Invariants
///
/// - At most one entry per key.
/// - Iteration yields keys in strictly ascending byte-wise order.
/// - `to_bytes` followed by `from_bytes` reproduces the index exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedIndex {
    storage: Storage,
    resident_limit: usize,
    modified: bool,
}

impl SortedIndex {
    /// Create an empty resident index.
    #[must_use]
    pub fn new() -> Self {
        Self::with_resident_limit(RESIDENT_LIMIT)
    }

    /// Create an empty index that is promoted to pages once its resident
    /// root would exceed `resident_limit` bytes.
    #[must_use]
    pub fn with_resident_limit(resident_limit: usize) -> Self {
        Self {
            storage: Storage::Resident(ResidentRoot::default().encode()),
            resident_limit,
            modified: false,
        }
    }

    /// Whether the entries are still stored inline.
    #[must_use]
    pub const fn is_resident(&self) -> bool {
        matches!(self.storage, Storage::Resident(_))
    }

    /// Whether an entry was added, replaced or removed since the last
    /// `clear_modified`.
    #[must_use]
    pub const fn is_modified(&self) -> bool {
        self.modified
    }

    /// Reset the modified flag, typically after the owner has persisted.
    pub const fn clear_modified(&mut self) {
        self.modified = false;
    }

    /// Look up the value stored under `key`.
    pub fn search(&self, key: &[u8]) -> Result<Option<Vec<u8>>, IndexError> {
        match &self.storage {
            Storage::Resident(root) => {
                let root = ResidentRoot::decode(root)?;
                Ok(root.get(key).map(<[u8]>::to_vec))
            }
            Storage::Paged(tree) => Ok(tree.get(key)?),
        }
    }

    /// Insert an entry, replacing the value of an existing entry with the
    /// same key.
    pub fn upsert(&mut self, key: &[u8], value: &[u8]) -> Result<(), IndexError> {
        let size = key.len() + value.len();
        if size > MAX_ENTRY_SIZE {
            return Err(IndexError::EntryTooLarge {
                size,
                max: MAX_ENTRY_SIZE,
            });
        }

        match &mut self.storage {
            Storage::Resident(encoded) => {
                let mut root = ResidentRoot::decode(encoded)?;
                root.insert(key.to_vec(), value.to_vec());

                if root.encoded_len() > self.resident_limit {
                    tracing::debug!(
                        entries = root.entries.len(),
                        limit = self.resident_limit,
                        "promoting index to paged storage"
                    );
                    self.storage = Storage::Paged(IndexTree::from_entries(root.entries)?);
                } else {
                    *encoded = root.encode();
                }
            }
            Storage::Paged(tree) => {
                tree.insert(key.to_vec(), value.to_vec())?;
            }
        }

        self.modified = true;
        Ok(())
    }

    /// Remove the entry stored under `key`, returning whether one existed.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool, IndexError> {
        let removed = match &mut self.storage {
            Storage::Resident(encoded) => {
                let mut root = ResidentRoot::decode(encoded)?;
                let removed = root.remove(key);
                if removed {
                    *encoded = root.encode();
                }
                removed
            }
            Storage::Paged(tree) => tree.remove(key)?.is_some(),
        };

        self.modified |= removed;
        Ok(removed)
    }

    /// Iterate over all entries in ascending key order.
    ///
    /// Each call starts a fresh scan of the current contents.
    #[must_use]
    pub fn iter(&self) -> IndexIter<'_> {
        let inner = match &self.storage {
            Storage::Resident(encoded) => ResidentRoot::decode(encoded)
                .map(|root| IterInner::Entries(root.entries.into_iter())),
            Storage::Paged(tree) => tree.cursor().map(IterInner::Tree),
        };
        IndexIter::new(inner)
    }

    /// Iterate over entries whose key is `>= start_key`, in ascending order.
    #[must_use]
    pub fn iter_from(&self, start_key: &[u8]) -> IndexIter<'_> {
        let inner = match &self.storage {
            Storage::Resident(encoded) => ResidentRoot::decode(encoded).map(|mut root| {
                root.skip_before(start_key);
                IterInner::Entries(root.entries.into_iter())
            }),
            Storage::Paged(tree) => tree.iter_from(start_key).map(IterInner::Tree),
        };
        IndexIter::new(inner)
    }

    /// Count the entries.
    pub fn len(&self) -> Result<usize, IndexError> {
        match &self.storage {
            Storage::Resident(encoded) => Ok(ResidentRoot::decode(encoded)?.entries.len()),
            Storage::Paged(tree) => Ok(tree.count()?),
        }
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> Result<bool, IndexError> {
        self.iter().next().transpose().map(|first| first.is_none())
    }

    /// Serialize the index into its attribute image.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(IMAGE_HEADER_SIZE + 12);
        out.extend_from_slice(&IMAGE_SIGNATURE);

        match &self.storage {
            Storage::Resident(encoded) => {
                out.extend_from_slice(&[0, 0, 0, 0]);
                out.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
                out.extend_from_slice(encoded);
            }
            Storage::Paged(tree) => {
                out.extend_from_slice(&[FLAG_LARGE_INDEX, 0, 0, 0]);
                out.extend_from_slice(&tree.root_page().to_le_bytes());
                let allocation = tree.allocation();
                out.extend_from_slice(&(allocation.page_count() as u32).to_le_bytes());
                out.reserve(allocation.encoded_len());
                allocation.write_to(&mut out);
            }
        }

        out
    }

    /// Load an index from its attribute image.
    ///
    /// Only the framing is checked here; entries and pages are validated
    /// as operations reach them.
    pub fn from_bytes(image: &[u8]) -> Result<Self, IndexError> {
        Self::parse_image(image).map_err(|e| {
            tracing::warn!(error = %e, "rejecting malformed index image");
            IndexError::from(e)
        })
    }

    fn parse_image(image: &[u8]) -> Result<Self, MalformedRecord> {
        let signature: [u8; 4] = bytes::read_array(image, 0)?;
        if signature != IMAGE_SIGNATURE {
            return Err(MalformedRecord::InvalidSignature(u32::from_le_bytes(
                signature,
            )));
        }

        let flags = bytes::read_bytes(image, 4, 1)?[0];
        let (storage, end) = match flags {
            0 => {
                let len = bytes::read_u32_le(image, IMAGE_HEADER_SIZE)? as usize;
                let start = IMAGE_HEADER_SIZE + 4;
                let root = bytes::read_bytes(image, start, len)?.to_vec();
                (Storage::Resident(root), start + len)
            }
            FLAG_LARGE_INDEX => {
                let root_page = bytes::read_u64_le(image, IMAGE_HEADER_SIZE)?;
                let page_count = bytes::read_u32_le(image, IMAGE_HEADER_SIZE + 8)? as usize;
                let start = IMAGE_HEADER_SIZE + 12;
                let pages = image.get(start..).unwrap_or_default();
                let allocation = IndexAllocation::read_from(pages, page_count)?;
                let end = start + page_count * PAGE_SIZE;
                (
                    Storage::Paged(IndexTree::from_parts(allocation, root_page)),
                    end,
                )
            }
            _ => return Err(MalformedRecord::InvalidHeader("index flags")),
        };

        if end != image.len() {
            return Err(MalformedRecord::InvalidHeader("index image length"));
        }

        Ok(Self {
            storage,
            resident_limit: RESIDENT_LIMIT,
            modified: false,
        })
    }
}

impl Default for SortedIndex {
    fn default() -> Self {
        Self::new()
    }
}

enum IterInner<'a> {
    Entries(std::vec::IntoIter<IndexEntry>),
    Tree(TreeCursor<'a>),
    Failed(Option<IndexError>),
}

/// Iterator over the entries of a [`SortedIndex`].
///
/// Yields `Err` at most once, then stops.
pub struct IndexIter<'a> {
    inner: IterInner<'a>,
}

impl<'a> IndexIter<'a> {
    fn new(inner: Result<IterInner<'a>, MalformedRecord>) -> Self {
        let inner = inner.unwrap_or_else(|e| IterInner::Failed(Some(e.into())));
        Self { inner }
    }
}

impl Iterator for IndexIter<'_> {
    type Item = Result<(Key, Vec<u8>), IndexError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            IterInner::Entries(entries) => entries.next().map(|e| Ok((e.key, e.value))),
            IterInner::Tree(cursor) => cursor.next().map(|r| r.map_err(IndexError::from)),
            IterInner::Failed(error) => error.take().map(Err),
        }
    }
}

/// Errors from sorted index operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// The backing bytes are corrupt or truncated.
    MalformedRecord(MalformedRecord),
    /// Key plus value exceed what one index page can hold.
    EntryTooLarge { size: usize, max: usize },
}

impl IndexError {
    /// Whether this error indicates on-disk corruption.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedRecord(_))
    }
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedRecord(e) => write!(f, "malformed index: {e}"),
            Self::EntryTooLarge { size, max } => {
                write!(f, "index entry too large: {size} bytes (max {max})")
            }
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MalformedRecord(e) => Some(e),
            Self::EntryTooLarge { .. } => None,
        }
    }
}

impl From<MalformedRecord> for IndexError {
    fn from(e: MalformedRecord) -> Self {
        Self::MalformedRecord(e)
    }
}
