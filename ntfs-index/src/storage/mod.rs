//! Index storage.
//!
//! A sorted index is persisted as a named attribute of its owning record.
//! Small indexes stay resident in the attribute; larger ones spill into a
//! B-tree of 4KB checksummed index pages.
//!
//! # Layers
//!
//! - [`SortedIndex`]: ordered byte-keyed entries, resident or paged.
//! - [`IndexView`]: typed keys and values over a [`SortedIndex`].
//! - [`OwningRecord`] / [`FileRecord`]: holds named indexes and persists them.
//!
//! # Usage
//!
//! ```
//! use ntfs_index::storage::{FileRecord, IndexView, OwningRecord};
//! use ntfs_index::types::FileReference;
//!
//! let mut record = FileRecord::new(FileReference::new(24, 1));
//!
//! let mut view = IndexView::<_, u32, FileReference>::new(record.index_mut("$O"));
//! view.set(&1, &FileReference::new(42, 3))?;
//! assert_eq!(view.get(&1)?, Some(FileReference::new(42, 3)));
//!
//! record.update_record()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod index;
mod page;
mod record;
mod view;

pub use index::{IndexError, IndexIter, MAX_ENTRY_SIZE, RESIDENT_LIMIT, SortedIndex};
pub use page::{NO_PAGE, PAGE_SIZE, Page, PageHeader, PageId, PageType};
pub use record::{FileRecord, OwningRecord, RecordError};
pub use view::{IndexView, TypedEntries};
