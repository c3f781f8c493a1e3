use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::BTreeNode;
use crate::index::btree::serialization::{
    deserialize_node, read_root_page_id, serialize_node, write_root_page_id,
};
use crate::index::btree::tree::BPlusTree;
use crate::storage::buffer::WritePageGuard;

impl<K> BPlusTree<K>
where
    K: Clone + Ord + Serialize + DeserializeOwned,
{
    /// Insert a key/value pair. Returns Ok(false) when the key is already
    /// present (duplicates are refused).
    ///
    /// Descent holds write latches top-down; once a node is proven safe
    /// (it cannot split) every ancestor latch, including the header's, is
    /// released. The retained chain is then walked back up, splitting
    /// overfull nodes and pushing separators into their parents.
    pub fn insert(&self, key: K, rid: Rid) -> Result<bool, BTreeError> {
        let mut header = self.bpm.fetch_page_write(self.header_page_id)?;
        let mut root_id = read_root_page_id(header.page());
        if root_id == INVALID_PAGE_ID {
            let mut root_guard = self.bpm.new_page_write()?;
            root_id = root_guard.page_id();
            let root: BTreeNode<K> = BTreeNode::new_leaf();
            serialize_node(&root, root_guard.page_mut())?;
            write_root_page_id(header.page_mut(), root_id);
        }

        let mut header_guard = Some(header);
        let mut write_set: Vec<WritePageGuard> = Vec::new();
        let mut cur = root_id;
        loop {
            let guard = self.bpm.fetch_page_write(cur)?;
            let node: BTreeNode<K> = deserialize_node(guard.page())?;
            if self.insert_safe(&node) {
                header_guard = None;
                write_set.clear();
            }
            let next = if node.is_leaf {
                None
            } else {
                Some(node.children[node.child_index(&key)])
            };
            write_set.push(guard);
            match next {
                Some(child) => cur = child,
                None => break,
            }
        }

        let leaf_idx = write_set.len() - 1;
        let mut leaf: BTreeNode<K> = deserialize_node(write_set[leaf_idx].page())?;
        if !leaf.leaf_insert(key, rid) {
            return Ok(false);
        }
        serialize_node(&leaf, write_set[leaf_idx].page_mut())?;

        // Walk back up, splitting while the current node is overfull.
        let mut i = leaf_idx;
        loop {
            let mut node: BTreeNode<K> = deserialize_node(write_set[i].page())?;
            if node.size() <= self.max_size_of(&node) {
                break;
            }
            let cur_id = write_set[i].page_id();
            let mut right_guard = self.bpm.new_page_write()?;
            let right_id = right_guard.page_id();

            let separator: K;
            let right: BTreeNode<K>;
            if node.is_leaf {
                let m = node.keys.len();
                let split_at = m - m / 2;
                let mut new_leaf = BTreeNode::new_leaf();
                new_leaf.keys = node.keys.split_off(split_at);
                new_leaf.values = node.values.split_off(split_at);
                new_leaf.next_leaf = node.next_leaf;
                node.next_leaf = right_id;
                separator = new_leaf.keys[0].clone();
                right = new_leaf;
            } else {
                let m = node.children.len();
                let keep = m - m / 2;
                let mut new_internal = BTreeNode::new_internal();
                new_internal.children = node.children.split_off(keep);
                let mut tail = node.keys.split_off(keep - 1);
                separator = tail.remove(0);
                new_internal.keys = tail;
                right = new_internal;
            }
            serialize_node(&node, write_set[i].page_mut())?;
            serialize_node(&right, right_guard.page_mut())?;
            drop(right_guard);

            if i == 0 {
                // the root itself split: grow the tree by one level
                let Some(mut header) = header_guard.take() else {
                    unreachable!("root split while the header latch was released")
                };
                let mut new_root: BTreeNode<K> = BTreeNode::new_internal();
                new_root.keys.push(separator);
                new_root.children.push(cur_id);
                new_root.children.push(right_id);
                let mut root_guard = self.bpm.new_page_write()?;
                serialize_node(&new_root, root_guard.page_mut())?;
                write_root_page_id(header.page_mut(), root_guard.page_id());
                break;
            }

            let parent_idx = i - 1;
            let mut parent: BTreeNode<K> = deserialize_node(write_set[parent_idx].page())?;
            let pos = parent
                .children
                .iter()
                .position(|&c| c == cur_id)
                .ok_or(BTreeError::InvalidPageFormat)?;
            parent.keys.insert(pos, separator);
            parent.children.insert(pos + 1, right_id);
            serialize_node(&parent, write_set[parent_idx].page_mut())?;
            i = parent_idx;
        }

        Ok(true)
    }
}
