use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::common::types::{PageId, Rid, INVALID_PAGE_ID};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::BTreeNode;
use crate::index::btree::serialization::deserialize_node;
use crate::storage::buffer::BufferPoolManager;

/// Forward iterator over a tree's leaves: (leaf page id, slot, pool handle).
///
/// Only pin-only guards are taken, and none are held between calls, so
/// iteration under concurrent mutation is not strictly serialisable; a
/// concurrent split or merge may skip or repeat entries.
pub struct BPlusTreeIter<K> {
    bpm: Arc<BufferPoolManager>,
    page_id: PageId,
    idx: usize,
    _phantom: PhantomData<K>,
}

impl<K> BPlusTreeIter<K>
where
    K: Clone + Ord + DeserializeOwned,
{
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, page_id: PageId, idx: usize) -> Self {
        Self {
            bpm,
            page_id,
            idx,
            _phantom: PhantomData,
        }
    }

    pub(crate) fn end(bpm: Arc<BufferPoolManager>) -> Self {
        Self::new(bpm, INVALID_PAGE_ID, 0)
    }

    pub fn is_end(&self) -> bool {
        self.page_id == INVALID_PAGE_ID
    }

    /// Yield the next (key, rid) pair, or None once past the last leaf.
    pub fn next_entry(&mut self) -> Result<Option<(K, Rid)>, BTreeError> {
        loop {
            if self.page_id == INVALID_PAGE_ID {
                return Ok(None);
            }
            let guard = self.bpm.fetch_page_basic(self.page_id)?;
            let node: BTreeNode<K> = {
                let page = guard.page_ptr().read();
                deserialize_node(&page)?
            };
            if self.idx < node.keys.len() {
                let entry = (node.keys[self.idx].clone(), node.values[self.idx]);
                self.idx += 1;
                if self.idx >= node.keys.len() {
                    self.page_id = node.next_leaf;
                    self.idx = 0;
                }
                return Ok(Some(entry));
            }
            // exhausted (or empty) leaf: follow the sibling chain
            self.page_id = node.next_leaf;
            self.idx = 0;
        }
    }
}
