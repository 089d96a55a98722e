//! Index node types and serialization.
//!
//! A paged index uses two node types, one per page:
//! - Internal nodes: store separator keys and child page pointers
//! - Leaf nodes: store key-value entries, doubly-linked for range scans
//!
//! Keys and values are opaque byte strings. Keys compare byte-wise, which is
//! the order entries are stored and enumerated in.

#![allow(clippy::cast_possible_truncation)]

use crate::storage::page::{NO_PAGE, PAGE_SIZE, Page, PageHeader, PageId, PageType};
use crate::types::MalformedRecord;
use crate::types::bytes;

/// A serialized index key.
pub type Key = Vec<u8>;

/// Node header layout (after page header):
/// - `key_count`: 2 bytes
/// - `parent_page`: 8 bytes
/// - `prev_leaf`: 8 bytes (only for leaf nodes, 0 if none)
/// - `next_leaf`: 8 bytes (only for leaf nodes, 0 if none)
///
/// Total: 26 bytes
const NODE_HEADER_SIZE: usize = 26;

/// Offset where node data starts (after page header + node header).
const DATA_OFFSET: usize = PageHeader::SIZE + NODE_HEADER_SIZE;

/// Available space for node data.
pub const DATA_SPACE: usize = PAGE_SIZE - DATA_OFFSET;

/// Per-entry overhead: `key_len` (2 bytes) + `value_len` (2 bytes).
pub const ENTRY_OVERHEAD: usize = 4;

/// Per-separator overhead in an internal node: `key_len` (2 bytes) + child pointer (8 bytes).
const SEPARATOR_OVERHEAD: usize = 2 + 8;

/// Largest key plus value accepted by the index.
///
/// Bounded so that any node split leaves both halves within one page.
pub const MAX_ENTRY_SIZE: usize = 1024;

/// A key-value entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: Key,
    pub value: Vec<u8>,
}

impl IndexEntry {
    /// Serialized size of this entry including its length prefix.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        ENTRY_OVERHEAD + self.key.len() + self.value.len()
    }
}

/// Serialized size of a list of entries.
#[must_use]
pub fn entries_len(entries: &[IndexEntry]) -> usize {
    entries.iter().map(IndexEntry::encoded_len).sum()
}

/// Write `entries` into `buffer` at `offset`, returning the end offset.
///
/// The caller guarantees the buffer has room for `entries_len(entries)` bytes.
pub fn write_entries(buffer: &mut [u8], mut offset: usize, entries: &[IndexEntry]) -> usize {
    for entry in entries {
        bytes::write_u16_le(buffer, offset, entry.key.len() as u16);
        bytes::write_u16_le(buffer, offset + 2, entry.value.len() as u16);
        offset += ENTRY_OVERHEAD;

        bytes::write_bytes(buffer, offset, &entry.key);
        offset += entry.key.len();

        bytes::write_bytes(buffer, offset, &entry.value);
        offset += entry.value.len();
    }
    offset
}

/// Read `count` entries from `buffer` at `offset`.
///
/// Fails if the buffer is truncated or the keys are not strictly ascending.
pub fn read_entries(
    buffer: &[u8],
    mut offset: usize,
    count: usize,
) -> Result<Vec<IndexEntry>, MalformedRecord> {
    let mut entries: Vec<IndexEntry> = Vec::with_capacity(count.min(DATA_SPACE / ENTRY_OVERHEAD));

    for position in 0..count {
        let key_len = bytes::read_u16_le(buffer, offset)? as usize;
        let value_len = bytes::read_u16_le(buffer, offset + 2)? as usize;
        offset += ENTRY_OVERHEAD;

        let key = bytes::read_bytes(buffer, offset, key_len)?.to_vec();
        offset += key_len;

        let value = bytes::read_bytes(buffer, offset, value_len)?.to_vec();
        offset += value_len;

        if entries.last().is_some_and(|prev| prev.key >= key) {
            return Err(MalformedRecord::UnsortedKeys { position });
        }
        entries.push(IndexEntry { key, value });
    }

    Ok(entries)
}

/// Header information for an index node.
#[derive(Debug, Clone, Copy)]
pub struct NodeHeader {
    pub node_type: PageType,
    pub key_count: u16,
    pub parent_page: PageId,
    pub prev_leaf: PageId,
    pub next_leaf: PageId,
}

impl NodeHeader {
    const fn empty(node_type: PageType, parent_page: PageId) -> Self {
        Self {
            node_type,
            key_count: 0,
            parent_page,
            prev_leaf: NO_PAGE,
            next_leaf: NO_PAGE,
        }
    }

    /// Read a node header from a page.
    pub fn from_page(page: &Page) -> Result<Self, MalformedRecord> {
        let node_type = page.header()?.page_type;
        let offset = PageHeader::SIZE;

        Ok(Self {
            node_type,
            key_count: page.read_u16(offset)?,
            parent_page: page.read_u64(offset + 2)?,
            prev_leaf: page.read_u64(offset + 10)?,
            next_leaf: page.read_u64(offset + 18)?,
        })
    }

    /// Write a node header (and the page header) to a page.
    ///
    /// The checksum is left zero; it is filled in when the page is stored.
    pub fn write_to_page(&self, page: &mut Page) {
        let page_header = PageHeader {
            page_type: self.node_type,
            flags: 0,
            checksum: 0,
        };
        page.write_bytes(0, &page_header.to_bytes());

        let offset = PageHeader::SIZE;
        page.write_u16(offset, self.key_count);
        page.write_u64(offset + 2, self.parent_page);
        page.write_u64(offset + 10, self.prev_leaf);
        page.write_u64(offset + 18, self.next_leaf);
    }
}

/// An internal (non-leaf) index node.
///
/// Stores N keys and N+1 child pointers.
/// `Child[i]` contains keys < `Key[i]`
/// `Child[i+1]` contains keys >= `Key[i]`
#[derive(Debug)]
pub struct InternalNode {
    pub header: NodeHeader,
    /// Keys in sorted order.
    pub keys: Vec<Key>,
    /// Child page pointers. `children.len()` == `keys.len()` + 1
    pub children: Vec<PageId>,
}

impl InternalNode {
    /// Create an internal node with initial children.
    #[must_use]
    pub fn with_children(
        parent_page: PageId,
        left_child: PageId,
        key: Key,
        right_child: PageId,
    ) -> Self {
        Self {
            header: NodeHeader::empty(PageType::Internal, parent_page),
            keys: vec![key],
            children: vec![left_child, right_child],
        }
    }

    /// Read an internal node from a page.
    pub fn from_page(page: &Page) -> Result<Self, MalformedRecord> {
        let header = NodeHeader::from_page(page)?;
        if header.node_type != PageType::Internal {
            return Err(MalformedRecord::InvalidHeader("internal node"));
        }

        let key_count = header.key_count as usize;
        let mut keys: Vec<Key> = Vec::with_capacity(key_count);
        let mut children = Vec::with_capacity(key_count + 1);

        let mut offset = DATA_OFFSET;

        // Read first child pointer
        children.push(page.read_u64(offset)?);
        offset += 8;

        // Read key-child pairs
        for position in 0..key_count {
            let key_len = page.read_u16(offset)? as usize;
            offset += 2;

            let key = page.read_bytes(offset, key_len)?.to_vec();
            offset += key_len;

            if keys.last().is_some_and(|prev| *prev >= key) {
                return Err(MalformedRecord::UnsortedKeys { position });
            }
            keys.push(key);

            children.push(page.read_u64(offset)?);
            offset += 8;
        }

        Ok(Self {
            header,
            keys,
            children,
        })
    }

    /// Write an internal node to a page.
    pub fn write_to_page(&self, page: &mut Page) {
        let mut header = self.header;
        header.key_count = self.keys.len() as u16;
        header.write_to_page(page);

        let mut offset = DATA_OFFSET;

        // Write first child pointer
        page.write_u64(offset, self.children[0]);
        offset += 8;

        // Write key-child pairs
        for (key, &child) in self.keys.iter().zip(&self.children[1..]) {
            page.write_u16(offset, key.len() as u16);
            offset += 2;

            page.write_bytes(offset, key);
            offset += key.len();

            page.write_u64(offset, child);
            offset += 8;
        }
    }

    /// Serialized size of the node data.
    #[must_use]
    pub fn data_size(&self) -> usize {
        8 + self
            .keys
            .iter()
            .map(|k| SEPARATOR_OVERHEAD + k.len())
            .sum::<usize>()
    }

    /// Check if the node data fits in one page.
    #[must_use]
    pub fn fits(&self) -> bool {
        self.data_size() <= DATA_SPACE
    }

    /// Find the child index for a given key.
    #[must_use]
    pub fn find_child_index(&self, key: &[u8]) -> usize {
        // Binary search for the first key >= target
        match self.keys.binary_search_by(|k| k.as_slice().cmp(key)) {
            Ok(i) => i + 1, // Exact match, go right
            Err(i) => i,    // Insert position
        }
    }

    /// Insert a key and right child at the appropriate position.
    pub fn insert(&mut self, key: Key, right_child: PageId) {
        let idx = self.find_child_index(&key);
        self.keys.insert(idx, key);
        self.children.insert(idx + 1, right_child);
    }

    /// Split the node, returning the median key and the new right node.
    ///
    /// The median is chosen by serialized size so both halves fit in a page.
    #[must_use]
    pub fn split(&mut self) -> (Key, Self) {
        let half = self.data_size() / 2;
        let mut running = 8;
        let mut mid = self.keys.len() - 1;
        for (i, key) in self.keys.iter().enumerate() {
            running += SEPARATOR_OVERHEAD + key.len();
            if running >= half {
                mid = i;
                break;
            }
        }

        // Right node gets keys and children after median
        let right_keys: Vec<Key> = self.keys.drain(mid + 1..).collect();
        let right_children: Vec<PageId> = self.children.drain(mid + 1..).collect();

        // Remove median key from left node
        let median_key = self.keys.pop().unwrap_or_default();

        let right_node = Self {
            header: NodeHeader {
                key_count: right_keys.len() as u16,
                ..NodeHeader::empty(PageType::Internal, self.header.parent_page)
            },
            keys: right_keys,
            children: right_children,
        };

        (median_key, right_node)
    }
}

/// A leaf index node.
///
/// Stores key-value entries and links to sibling leaves.
#[derive(Debug)]
pub struct LeafNode {
    pub header: NodeHeader,
    /// Entries in sorted order by key.
    pub entries: Vec<IndexEntry>,
}

impl LeafNode {
    /// Create a new empty leaf node.
    #[must_use]
    pub const fn new(parent_page: PageId) -> Self {
        Self {
            header: NodeHeader::empty(PageType::Leaf, parent_page),
            entries: Vec::new(),
        }
    }

    /// Check if the node data fits in one page.
    #[must_use]
    pub fn fits(&self) -> bool {
        entries_len(&self.entries) <= DATA_SPACE
    }

    /// Read a leaf node from a page.
    pub fn from_page(page: &Page) -> Result<Self, MalformedRecord> {
        let header = NodeHeader::from_page(page)?;
        if header.node_type != PageType::Leaf {
            return Err(MalformedRecord::InvalidHeader("leaf node"));
        }

        let entries = read_entries(page.as_bytes(), DATA_OFFSET, header.key_count as usize)?;
        Ok(Self { header, entries })
    }

    /// Write a leaf node to a page.
    pub fn write_to_page(&self, page: &mut Page) {
        let mut header = self.header;
        header.key_count = self.entries.len() as u16;
        header.write_to_page(page);

        write_entries(page.as_bytes_mut(), DATA_OFFSET, &self.entries);
    }

    /// Find the index where a key should be inserted (or exists).
    pub fn find_index(&self, key: &[u8]) -> Result<usize, usize> {
        self.entries.binary_search_by(|e| e.key.as_slice().cmp(key))
    }

    /// Get a value by key.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.find_index(key)
            .ok()
            .map(|i| self.entries[i].value.as_slice())
    }

    /// Insert or update an entry.
    ///
    /// Returns the old value if updating, None if inserting.
    pub fn insert(&mut self, key: Key, value: Vec<u8>) -> Option<Vec<u8>> {
        match self.find_index(&key) {
            Ok(i) => Some(std::mem::replace(&mut self.entries[i].value, value)),
            Err(i) => {
                self.entries.insert(i, IndexEntry { key, value });
                None
            }
        }
    }

    /// Remove an entry by key.
    ///
    /// Returns the removed value if found.
    pub fn remove(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        self.find_index(key)
            .ok()
            .map(|i| self.entries.remove(i).value)
    }

    /// Split the node, returning the split key and the new right node.
    ///
    /// The split point is chosen by serialized size; the node must hold at
    /// least two entries.
    #[must_use]
    pub fn split(&mut self) -> (Key, Self) {
        let half = entries_len(&self.entries) / 2;
        let mut running = 0;
        let mut mid = 1;
        for (i, entry) in self.entries.iter().enumerate() {
            running += entry.encoded_len();
            if running >= half {
                mid = i + 1;
                break;
            }
        }
        mid = mid.clamp(1, self.entries.len() - 1);

        // Right node gets entries from mid onwards
        let right_entries: Vec<IndexEntry> = self.entries.drain(mid..).collect();
        let split_key = right_entries[0].key.clone();

        let right_node = Self {
            header: NodeHeader {
                key_count: right_entries.len() as u16,
                next_leaf: self.header.next_leaf,
                ..NodeHeader::empty(PageType::Leaf, self.header.parent_page)
            },
            entries: right_entries,
        };

        (split_key, right_node)
    }
}
