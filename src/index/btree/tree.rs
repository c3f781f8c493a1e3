use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::common::types::{PageId, Rid, INVALID_PAGE_ID};
use crate::index::btree::error::BTreeError;
use crate::index::btree::iterator::BPlusTreeIter;
use crate::index::btree::node::BTreeNode;
use crate::index::btree::serialization::{
    deserialize_node, read_root_page_id, write_root_page_id,
};
use crate::storage::buffer::BufferPoolManager;

/// Disk-resident B+ tree over the buffer pool. Each node occupies one page;
/// a dedicated header page carries the root page id so concurrent descents
/// can latch their way in from a stable anchor.
///
/// Concurrency follows latch crabbing: a descent releases ancestor latches
/// as soon as the current node is proven safe for the operation at hand.
pub struct BPlusTree<K> {
    name: String,
    pub(crate) bpm: Arc<BufferPoolManager>,
    pub(crate) header_page_id: PageId,
    pub(crate) leaf_max_size: usize,
    pub(crate) internal_max_size: usize,
    _phantom: PhantomData<K>,
}

impl<K> BPlusTree<K>
where
    K: Clone + Ord + Serialize + DeserializeOwned,
{
    /// Create a new, empty tree. Allocates the header page and stores the
    /// invalid page id as its root.
    pub fn new(
        name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self, BTreeError> {
        assert!(leaf_max_size >= 2 && internal_max_size >= 3);
        let mut header = bpm.new_page_write()?;
        let header_page_id = header.page_id();
        write_root_page_id(header.page_mut(), INVALID_PAGE_ID);
        drop(header);
        Ok(Self {
            name: name.into(),
            bpm,
            header_page_id,
            leaf_max_size,
            internal_max_size,
            _phantom: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    /// Empty iff the header holds no root page id.
    pub fn is_empty(&self) -> Result<bool, BTreeError> {
        Ok(self.root_page_id()? == INVALID_PAGE_ID)
    }

    pub fn root_page_id(&self) -> Result<PageId, BTreeError> {
        let header = self.bpm.fetch_page_read(self.header_page_id)?;
        Ok(read_root_page_id(header.page()))
    }

    /// Point lookup under read-latch crabbing.
    pub fn get_value(&self, key: &K) -> Result<Option<Rid>, BTreeError> {
        let header = self.bpm.fetch_page_read(self.header_page_id)?;
        let root_id = read_root_page_id(header.page());
        if root_id == INVALID_PAGE_ID {
            return Ok(None);
        }
        let mut guard = self.bpm.fetch_page_read(root_id)?;
        drop(header);
        loop {
            let node: BTreeNode<K> = deserialize_node(guard.page())?;
            if node.is_leaf {
                return Ok(node.leaf_lookup(key));
            }
            let child = node.children[node.child_index(key)];
            // child latched before the parent guard is replaced (crab step)
            guard = self.bpm.fetch_page_read(child)?;
        }
    }

    /// Iterator positioned at the smallest key.
    pub fn iter(&self) -> Result<BPlusTreeIter<K>, BTreeError> {
        let header = self.bpm.fetch_page_read(self.header_page_id)?;
        let root_id = read_root_page_id(header.page());
        if root_id == INVALID_PAGE_ID {
            return Ok(BPlusTreeIter::end(self.bpm.clone()));
        }
        let mut guard = self.bpm.fetch_page_read(root_id)?;
        drop(header);
        loop {
            let node: BTreeNode<K> = deserialize_node(guard.page())?;
            if node.is_leaf {
                return Ok(BPlusTreeIter::new(self.bpm.clone(), guard.page_id(), 0));
            }
            let child = node.children[0];
            guard = self.bpm.fetch_page_read(child)?;
        }
    }

    /// Iterator positioned at the first key >= `key`.
    pub fn iter_from(&self, key: &K) -> Result<BPlusTreeIter<K>, BTreeError> {
        let header = self.bpm.fetch_page_read(self.header_page_id)?;
        let root_id = read_root_page_id(header.page());
        if root_id == INVALID_PAGE_ID {
            return Ok(BPlusTreeIter::end(self.bpm.clone()));
        }
        let mut guard = self.bpm.fetch_page_read(root_id)?;
        drop(header);
        loop {
            let node: BTreeNode<K> = deserialize_node(guard.page())?;
            if node.is_leaf {
                let idx = node.leaf_lower_bound(key);
                if idx < node.keys.len() {
                    return Ok(BPlusTreeIter::new(self.bpm.clone(), guard.page_id(), idx));
                }
                // past the last key of this leaf: resume at the next one
                return Ok(BPlusTreeIter::new(self.bpm.clone(), node.next_leaf, 0));
            }
            let child = node.children[node.child_index(key)];
            guard = self.bpm.fetch_page_read(child)?;
        }
    }

    pub(crate) fn insert_safe(&self, node: &BTreeNode<K>) -> bool {
        let max = if node.is_leaf {
            self.leaf_max_size
        } else {
            self.internal_max_size
        };
        node.size() < max
    }

    pub(crate) fn max_size_of(&self, node: &BTreeNode<K>) -> usize {
        if node.is_leaf {
            self.leaf_max_size
        } else {
            self.internal_max_size
        }
    }

    pub(crate) fn min_size_of(&self, node: &BTreeNode<K>) -> usize {
        if node.is_leaf {
            self.leaf_max_size / 2
        } else {
            (self.internal_max_size + 1) / 2
        }
    }

    /// Minimum size below which a node must rebalance; the root is exempt
    /// down to a single entry (leaf) or two children (internal).
    pub(crate) fn delete_min_of(&self, node: &BTreeNode<K>, is_root: bool) -> usize {
        if is_root {
            if node.is_leaf {
                1
            } else {
                2
            }
        } else {
            self.min_size_of(node)
        }
    }
}

impl<K> BPlusTree<K>
where
    K: Clone + Ord + Serialize + DeserializeOwned + std::fmt::Debug,
{
    /// Render the tree structure for tests and debugging.
    pub fn to_pretty_string(&self) -> Result<String, BTreeError> {
        let root_id = self.root_page_id()?;
        if root_id == INVALID_PAGE_ID {
            return Ok("()".to_string());
        }
        let mut out = String::new();
        self.render(root_id, 0, &mut out)?;
        Ok(out)
    }

    fn render(&self, page_id: PageId, depth: usize, out: &mut String) -> Result<(), BTreeError> {
        let guard = self.bpm.fetch_page_basic(page_id)?;
        let node: BTreeNode<K> = {
            let page = guard.page_ptr().read();
            deserialize_node(&page)?
        };
        drop(guard);
        for _ in 0..depth {
            out.push_str("  ");
        }
        if node.is_leaf {
            out.push_str(&format!("Leaf p{} {:?} -> p{}\n", page_id, node.keys, node.next_leaf));
        } else {
            out.push_str(&format!("Internal p{} {:?}\n", page_id, node.keys));
            for child in &node.children {
                self.render(*child, depth + 1, out)?;
            }
        }
        Ok(())
    }
}
