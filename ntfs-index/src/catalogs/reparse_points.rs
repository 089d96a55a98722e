//! Reparse point catalog.
//!
//! The volume keeps one `$R` index listing every file that carries a reparse
//! point, keyed by reparse tag and then by file. Entries carry no data; their
//! presence is the record.
//!
//! # Key layout
//!
//! ```text
//! +-----------+-----------------------+
//! | Tag (u32) | File reference (u64)  |
//! | (4 bytes) | (8 bytes)             |
//! +-----------+-----------------------+
//! ```
//!
//! Entries sort by the little-endian bytes of the key, so all files with the
//! same tag are adjacent.

use std::fmt;
use std::io::Write;

use crate::storage::{
    IndexError, IndexView, OwningRecord, RecordError, SortedIndex, TypedEntries,
};
use crate::types::bytes;
use crate::types::{FileReference, MalformedRecord, RecordCodec};

/// Name of the index attribute holding the catalog.
pub const INDEX_NAME: &str = "$R";

/// A (reparse tag, file) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReparseKey {
    pub tag: u32,
    pub file: FileReference,
}

impl ReparseKey {
    #[must_use]
    pub const fn new(tag: u32, file: FileReference) -> Self {
        Self { tag, file }
    }
}

impl RecordCodec for ReparseKey {
    const SIZE: usize = 12;

    fn read_from(buffer: &[u8], offset: usize) -> Result<Self, MalformedRecord> {
        Ok(Self {
            tag: bytes::read_u32_le(buffer, offset)?,
            file: FileReference::read_from(buffer, offset + 4)?,
        })
    }

    fn write_to(&self, buffer: &mut [u8], offset: usize) {
        bytes::write_u32_le(buffer, offset, self.tag);
        self.file.write_to(buffer, offset + 4);
    }
}

impl fmt::Display for ReparseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}:{}", self.tag, self.file)
    }
}

/// The empty value stored with every reparse key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ReparseData;

impl RecordCodec for ReparseData {
    const SIZE: usize = 0;

    fn read_from(buffer: &[u8], offset: usize) -> Result<Self, MalformedRecord> {
        bytes::read_bytes(buffer, offset, 0).map(|_| Self)
    }

    fn write_to(&self, _buffer: &mut [u8], _offset: usize) {}
}

impl fmt::Display for ReparseData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<no data>")
    }
}

/// The reparse point registry of a volume, attached to its owning record.
pub struct ReparsePoints<'a, R: OwningRecord> {
    record: &'a mut R,
}

impl<'a, R: OwningRecord> ReparsePoints<'a, R> {
    /// Attach to `record`, creating an empty `$R` index if it has none.
    pub fn new(record: &'a mut R) -> Self {
        record.index_mut(INDEX_NAME);
        Self { record }
    }

    fn view(&self) -> Result<IndexView<&SortedIndex, ReparseKey, ReparseData>, CatalogError> {
        self.record
            .index(INDEX_NAME)
            .map(IndexView::new)
            .ok_or(CatalogError::MissingIndex(INDEX_NAME))
    }

    fn view_mut(&mut self) -> IndexView<&mut SortedIndex, ReparseKey, ReparseData> {
        IndexView::new(self.record.index_mut(INDEX_NAME))
    }

    /// Register `file` as carrying a reparse point with `tag`.
    ///
    /// Adding a pair that is already present leaves the index unchanged.
    /// The record is asked to persist either way.
    pub fn add(&mut self, tag: u32, file: FileReference) -> Result<(), CatalogError> {
        self.view_mut().set(&ReparseKey::new(tag, file), &ReparseData)?;
        self.record.update_record()?;
        tracing::debug!(tag = format_args!("{tag:x}"), %file, "added reparse point");
        Ok(())
    }

    /// Unregister the (`tag`, `file`) pair, returning whether it was present.
    ///
    /// The record is asked to persist even when nothing was removed.
    pub fn remove(&mut self, tag: u32, file: FileReference) -> Result<bool, CatalogError> {
        let removed = self.view_mut().remove(&ReparseKey::new(tag, file))?;
        self.record.update_record()?;
        tracing::debug!(
            tag = format_args!("{tag:x}"),
            %file,
            removed,
            "removed reparse point"
        );
        Ok(removed)
    }

    /// Whether the (`tag`, `file`) pair is registered.
    pub fn contains(&self, tag: u32, file: FileReference) -> Result<bool, CatalogError> {
        Ok(self.view()?.contains(&ReparseKey::new(tag, file))?)
    }

    /// All registered pairs in index order.
    pub fn entries(&self) -> Result<TypedEntries<'_, ReparseKey, ReparseData>, CatalogError> {
        Ok(self.view()?.into_entries())
    }

    /// Every file registered under `tag`, in index order.
    pub fn owners_of(&self, tag: u32) -> Result<Vec<FileReference>, CatalogError> {
        let start = ReparseKey::new(tag, FileReference::MFT);
        let view = self.view()?;
        let mut owners = Vec::new();
        for entry in view.entries_from(&start) {
            let (key, ReparseData) = entry?;
            if key.tag != tag {
                break;
            }
            owners.push(key.file);
        }
        Ok(owners)
    }

    /// Write a human-readable listing of the catalog to `writer`.
    ///
    /// Every line starts with `indent`.
    pub fn dump(&self, writer: &mut impl Write, indent: &str) -> Result<(), CatalogError> {
        writeln!(writer, "{indent}REPARSE POINT INDEX")?;
        for entry in self.entries()? {
            let (key, ReparseData) = entry?;
            writeln!(writer, "{indent}  REPARSE POINT INDEX ENTRY")?;
            writeln!(writer, "{indent}            Tag: {:x}", key.tag)?;
            writeln!(writer, "{indent}  MFT Reference: {}", key.file)?;
        }
        Ok(())
    }
}

/// Errors from catalog operations.
#[derive(Debug)]
pub enum CatalogError {
    /// The backing index failed.
    Index(IndexError),
    /// The owning record failed to persist.
    Record(RecordError),
    /// The owning record has no index with this name.
    MissingIndex(&'static str),
    /// Writing a dump failed.
    Io(std::io::Error),
}

impl CatalogError {
    /// Whether this error indicates on-disk corruption.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        match self {
            Self::Index(e) => e.is_malformed(),
            Self::Record(e) => e.is_malformed(),
            Self::MissingIndex(_) | Self::Io(_) => false,
        }
    }
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(e) => write!(f, "index error: {e}"),
            Self::Record(e) => write!(f, "record error: {e}"),
            Self::MissingIndex(name) => write!(f, "record has no {name} index"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Index(e) => Some(e),
            Self::Record(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::MissingIndex(_) => None,
        }
    }
}

impl From<IndexError> for CatalogError {
    fn from(e: IndexError) -> Self {
        Self::Index(e)
    }
}

impl From<RecordError> for CatalogError {
    fn from(e: RecordError) -> Self {
        Self::Record(e)
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
