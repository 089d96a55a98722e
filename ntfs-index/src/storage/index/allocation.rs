//! Page storage for a non-resident index.
//!
//! An allocation is the ordered run of index pages backing one index. Page ids
//! are 1-based so that 0 can mean "no page" in node links. Pages are sealed
//! with a checksum when written and verified when read.

use crate::storage::page::{NO_PAGE, PAGE_SIZE, Page, PageId};
use crate::types::MalformedRecord;

/// The pages of one non-resident index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexAllocation {
    pages: Vec<Page>,
}

impl IndexAllocation {
    /// Create an empty allocation.
    #[must_use]
    pub const fn new() -> Self {
        Self { pages: Vec::new() }
    }

    /// Number of pages in use.
    #[must_use]
    pub const fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Allocate a new zeroed page and return its id.
    pub fn allocate_page(&mut self) -> PageId {
        self.pages.push(Page::new());
        self.pages.len() as PageId
    }

    /// Read a page, verifying its checksum.
    pub fn read_page(&self, page_id: PageId) -> Result<&Page, MalformedRecord> {
        let page = self.slot(page_id).ok_or(MalformedRecord::DanglingPage(page_id))?;
        page.verify()?;
        Ok(page)
    }

    /// Store a page, sealing it with a fresh checksum.
    ///
    /// # Panics
    /// Panics if `page_id` was not returned by `allocate_page`.
    pub fn write_page(&mut self, page_id: PageId, mut page: Page) {
        assert!(
            page_id != NO_PAGE && self.slot(page_id).is_some(),
            "write to unallocated page {page_id}"
        );
        page.seal();
        #[allow(clippy::cast_possible_truncation)] // bounds checked above
        let index = (page_id - 1) as usize;
        self.pages[index] = page;
    }

    /// Serialized size of the allocation.
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        self.pages.len() * PAGE_SIZE
    }

    /// Append every page, in id order, to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        for page in &self.pages {
            out.extend_from_slice(page.as_bytes());
        }
    }

    /// Rebuild an allocation from `page_count` consecutive pages.
    ///
    /// Checksums are not verified here; they are checked as pages are read.
    pub fn read_from(bytes: &[u8], page_count: usize) -> Result<Self, MalformedRecord> {
        let needed = page_count.saturating_mul(PAGE_SIZE);
        if bytes.len() < needed {
            return Err(MalformedRecord::Truncated {
                offset: 0,
                needed,
                available: bytes.len(),
            });
        }

        let pages = bytes[..needed]
            .chunks_exact(PAGE_SIZE)
            .map(Page::from_slice)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { pages })
    }

    fn slot(&self, page_id: PageId) -> Option<&Page> {
        let index = usize::try_from(page_id.checked_sub(1)?).ok()?;
        self.pages.get(index)
    }
}
