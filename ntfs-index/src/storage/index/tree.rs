//! B-tree over index pages.
//!
//! This is the non-resident form of a sorted index: entries live in leaf
//! pages, internal pages route lookups by separator key, and leaves are
//! chained in key order for scans.
//!
//! Keys are compared byte-wise. Entries larger than `MAX_ENTRY_SIZE` must be
//! rejected by the caller before they reach the tree.

use crate::storage::index::allocation::IndexAllocation;
use crate::storage::index::node::{IndexEntry, InternalNode, Key, LeafNode, NodeHeader};
use crate::storage::page::{NO_PAGE, Page, PageId, PageType};
use crate::types::MalformedRecord;

/// Deepest tree a lookup will descend before treating the links as corrupt.
const MAX_TREE_DEPTH: usize = 32;

/// A B-tree backed by its own index allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTree {
    allocation: IndexAllocation,
    root_page: PageId,
}

impl IndexTree {
    /// Create a new empty tree with a leaf root.
    #[must_use]
    pub fn new() -> Self {
        let mut allocation = IndexAllocation::new();
        let root_page = allocation.allocate_page();
        let mut tree = Self {
            allocation,
            root_page,
        };
        tree.write_leaf(root_page, &LeafNode::new(NO_PAGE));
        tree
    }

    /// Build a tree holding `entries`.
    pub fn from_entries(entries: Vec<IndexEntry>) -> Result<Self, MalformedRecord> {
        let mut tree = Self::new();
        for entry in entries {
            tree.insert(entry.key, entry.value)?;
        }
        Ok(tree)
    }

    /// Reattach a tree to previously stored pages.
    #[must_use]
    pub const fn from_parts(allocation: IndexAllocation, root_page: PageId) -> Self {
        Self {
            allocation,
            root_page,
        }
    }

    /// Get the root page ID.
    #[must_use]
    pub const fn root_page(&self) -> PageId {
        self.root_page
    }

    /// The pages backing this tree.
    #[must_use]
    pub const fn allocation(&self) -> &IndexAllocation {
        &self.allocation
    }

    /// Look up a value by key.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, MalformedRecord> {
        let leaf_page_id = self.find_leaf(key)?;
        let leaf = LeafNode::from_page(self.allocation.read_page(leaf_page_id)?)?;
        Ok(leaf.get(key).map(<[u8]>::to_vec))
    }

    /// Insert or update a key-value pair.
    ///
    /// Returns the old value if updating, None if inserting.
    pub fn insert(&mut self, key: Key, value: Vec<u8>) -> Result<Option<Vec<u8>>, MalformedRecord> {
        let leaf_page_id = self.find_leaf(&key)?;
        let mut leaf = LeafNode::from_page(self.allocation.read_page(leaf_page_id)?)?;

        // Insert into the leaf first (it may overflow temporarily)
        let old_value = leaf.insert(key, value);

        if leaf.fits() {
            self.write_leaf(leaf_page_id, &leaf);
            return Ok(old_value);
        }

        // A split touches several pages; a read failure part way through
        // must not leave half-linked pages behind
        let snapshot = (self.allocation.clone(), self.root_page);
        if let Err(e) = self.split_leaf(leaf_page_id, leaf) {
            (self.allocation, self.root_page) = snapshot;
            return Err(e);
        }

        Ok(old_value)
    }

    /// Remove a key-value pair.
    ///
    /// Returns the removed value if found.
    pub fn remove(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, MalformedRecord> {
        let leaf_page_id = self.find_leaf(key)?;
        let mut leaf = LeafNode::from_page(self.allocation.read_page(leaf_page_id)?)?;

        let removed = leaf.remove(key);
        if removed.is_some() {
            // Underfull leaves are left in place; scans skip empty leaves
            self.write_leaf(leaf_page_id, &leaf);
        }

        Ok(removed)
    }

    /// Find the leaf page that should contain the given key.
    fn find_leaf(&self, key: &[u8]) -> Result<PageId, MalformedRecord> {
        self.descend(|node| node.children[node.find_child_index(key)])
    }

    /// Walk from the root to a leaf, choosing the child with `pick`.
    fn descend(&self, pick: impl Fn(&InternalNode) -> PageId) -> Result<PageId, MalformedRecord> {
        let mut current_page_id = self.root_page;

        for _ in 0..MAX_TREE_DEPTH {
            let page = self.allocation.read_page(current_page_id)?;
            match NodeHeader::from_page(page)?.node_type {
                PageType::Leaf => return Ok(current_page_id),
                PageType::Internal => {
                    let node = InternalNode::from_page(page)?;
                    current_page_id = pick(&node);
                }
            }
        }

        Err(MalformedRecord::InvalidHeader("index tree depth"))
    }

    /// Split an overfull leaf and propagate the new separator upwards.
    fn split_leaf(&mut self, leaf_page_id: PageId, mut leaf: LeafNode) -> Result<(), MalformedRecord> {
        let (split_key, mut right_leaf) = leaf.split();

        let right_page_id = self.allocation.allocate_page();

        // Update sibling pointers
        right_leaf.header.prev_leaf = leaf_page_id;
        leaf.header.next_leaf = right_page_id;

        self.write_leaf(leaf_page_id, &leaf);
        self.write_leaf(right_page_id, &right_leaf);

        // Update next leaf's prev pointer if it exists
        if right_leaf.header.next_leaf != NO_PAGE {
            let next_page_id = right_leaf.header.next_leaf;
            let mut next_leaf = LeafNode::from_page(self.allocation.read_page(next_page_id)?)?;
            next_leaf.header.prev_leaf = right_page_id;
            self.write_leaf(next_page_id, &next_leaf);
        }

        self.insert_into_parent(
            leaf_page_id,
            split_key,
            right_page_id,
            leaf.header.parent_page,
        )
    }

    /// Insert a new key into a parent node after a child split.
    fn insert_into_parent(
        &mut self,
        left_child: PageId,
        key: Key,
        right_child: PageId,
        parent_page_id: PageId,
    ) -> Result<(), MalformedRecord> {
        if parent_page_id == NO_PAGE {
            // No parent - need to create a new root
            return self.create_new_root(left_child, key, right_child);
        }

        let mut parent = InternalNode::from_page(self.allocation.read_page(parent_page_id)?)?;
        parent.insert(key, right_child);
        self.update_parent_pointer(right_child, parent_page_id)?;

        if parent.fits() {
            self.write_internal(parent_page_id, &parent);
            return Ok(());
        }

        let (median_key, right_parent) = parent.split();
        let right_parent_page_id = self.allocation.allocate_page();

        self.write_internal(parent_page_id, &parent);
        self.write_internal(right_parent_page_id, &right_parent);

        // Children moved to the right node get a new parent
        for &child_id in &right_parent.children {
            self.update_parent_pointer(child_id, right_parent_page_id)?;
        }

        // Recursively insert into grandparent
        self.insert_into_parent(
            parent_page_id,
            median_key,
            right_parent_page_id,
            parent.header.parent_page,
        )
    }

    /// Create a new root node after the old root splits.
    fn create_new_root(
        &mut self,
        left_child: PageId,
        key: Key,
        right_child: PageId,
    ) -> Result<(), MalformedRecord> {
        let new_root = InternalNode::with_children(NO_PAGE, left_child, key, right_child);
        let new_root_page_id = self.allocation.allocate_page();
        self.write_internal(new_root_page_id, &new_root);

        self.update_parent_pointer(left_child, new_root_page_id)?;
        self.update_parent_pointer(right_child, new_root_page_id)?;

        self.root_page = new_root_page_id;
        Ok(())
    }

    /// Update a node's parent pointer.
    fn update_parent_pointer(
        &mut self,
        page_id: PageId,
        new_parent: PageId,
    ) -> Result<(), MalformedRecord> {
        let page = self.allocation.read_page(page_id)?;

        match NodeHeader::from_page(page)?.node_type {
            PageType::Leaf => {
                let mut node = LeafNode::from_page(page)?;
                node.header.parent_page = new_parent;
                self.write_leaf(page_id, &node);
            }
            PageType::Internal => {
                let mut node = InternalNode::from_page(page)?;
                node.header.parent_page = new_parent;
                self.write_internal(page_id, &node);
            }
        }

        Ok(())
    }

    fn write_leaf(&mut self, page_id: PageId, node: &LeafNode) {
        let mut page = Page::new();
        node.write_to_page(&mut page);
        self.allocation.write_page(page_id, page);
    }

    fn write_internal(&mut self, page_id: PageId, node: &InternalNode) {
        let mut page = Page::new();
        node.write_to_page(&mut page);
        self.allocation.write_page(page_id, page);
    }

    /// Create a cursor over all entries in key order.
    pub fn cursor(&self) -> Result<TreeCursor<'_>, MalformedRecord> {
        let leftmost = self.descend(|node| node.children[0])?;
        Ok(TreeCursor::at_leaf(&self.allocation, leftmost))
    }

    /// Create a cursor starting from the first key `>= start_key`.
    pub fn iter_from(&self, start_key: &[u8]) -> Result<TreeCursor<'_>, MalformedRecord> {
        let leaf_page_id = self.find_leaf(start_key)?;
        let mut leaf = LeafNode::from_page(self.allocation.read_page(leaf_page_id)?)?;

        let start_index = leaf.find_index(start_key).unwrap_or_else(|i| i);
        leaf.entries = leaf.entries.split_off(start_index);

        let mut cursor = TreeCursor::at_leaf(&self.allocation, leaf_page_id);
        cursor.load(leaf);
        Ok(cursor)
    }

    /// Count the total number of entries in the tree.
    pub fn count(&self) -> Result<usize, MalformedRecord> {
        self.cursor()?.try_fold(0, |n, entry| entry.map(|_| n + 1))
    }
}

impl Default for IndexTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over tree entries in ascending key order.
///
/// Stops after the first error.
pub struct TreeCursor<'a> {
    allocation: &'a IndexAllocation,
    current_page_id: PageId,
    next_page_id: PageId,
    current_entries: Option<std::vec::IntoIter<IndexEntry>>,
    leaves_visited: usize,
    done: bool,
}

impl<'a> TreeCursor<'a> {
    const fn at_leaf(allocation: &'a IndexAllocation, page_id: PageId) -> Self {
        Self {
            allocation,
            current_page_id: page_id,
            next_page_id: NO_PAGE,
            current_entries: None,
            leaves_visited: 0,
            done: false,
        }
    }

    fn load(&mut self, leaf: LeafNode) {
        self.leaves_visited += 1;
        self.next_page_id = leaf.header.next_leaf;
        self.current_entries = Some(leaf.entries.into_iter());
    }

    fn fail(&mut self, error: MalformedRecord) -> Option<Result<(Key, Vec<u8>), MalformedRecord>> {
        self.done = true;
        Some(Err(error))
    }
}

impl Iterator for TreeCursor<'_> {
    type Item = Result<(Key, Vec<u8>), MalformedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            if self.current_entries.is_none() {
                if self.current_page_id == NO_PAGE {
                    self.done = true;
                    return None;
                }
                // A well-formed chain visits each page at most once
                if self.leaves_visited >= self.allocation.page_count() {
                    return self.fail(MalformedRecord::InvalidHeader("leaf chain"));
                }

                let leaf = self
                    .allocation
                    .read_page(self.current_page_id)
                    .and_then(LeafNode::from_page);
                match leaf {
                    Ok(leaf) => self.load(leaf),
                    Err(e) => return self.fail(e),
                }
            }

            if let Some(entry) = self.current_entries.as_mut().and_then(Iterator::next) {
                return Some(Ok((entry.key, entry.value)));
            }

            // Move to next leaf
            self.current_page_id = self.next_page_id;
            self.current_entries = None;
        }
    }
}
