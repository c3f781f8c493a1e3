use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::common::types::INVALID_PAGE_ID;
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
    /// Remove a key. Removing an absent key is a no-op.
    ///
    /// Same crabbing discipline as insert, with "safe" meaning the node can
    /// lose an entry without underflowing. On the way back up, an underfull
    /// node first tries to borrow from its left sibling, then its right;
    /// failing both it merges into the left (or absorbs the right when it is
    /// the leftmost child), removing the separator from the parent.
    pub fn remove(&self, key: &K) -> Result<(), BTreeError> {
        let header = self.bpm.fetch_page_write(self.header_page_id)?;
        let root_id = read_root_page_id(header.page());
        if root_id == INVALID_PAGE_ID {
            return Ok(());
        }

        let mut header_guard = Some(header);
        let mut write_set: Vec<WritePageGuard> = Vec::new();
        let mut cur = root_id;
        let mut descending_root = true;
        loop {
            let guard = self.bpm.fetch_page_write(cur)?;
            let node: BTreeNode<K> = deserialize_node(guard.page())?;
            if node.size() > self.delete_min_of(&node, descending_root) {
                header_guard = None;
                write_set.clear();
            }
            let next = if node.is_leaf {
                None
            } else {
                Some(node.children[node.child_index(key)])
            };
            write_set.push(guard);
            descending_root = false;
            match next {
                Some(child) => cur = child,
                None => break,
            }
        }

        let leaf_idx = write_set.len() - 1;
        let mut leaf: BTreeNode<K> = deserialize_node(write_set[leaf_idx].page())?;
        if !leaf.leaf_remove(key) {
            return Ok(());
        }
        serialize_node(&leaf, write_set[leaf_idx].page_mut())?;

        // Walk back up while nodes underflow.
        let mut i = leaf_idx;
        loop {
            let mut node: BTreeNode<K> = deserialize_node(write_set[i].page())?;
            let at_root = write_set[i].page_id() == root_id;

            if at_root {
                if !node.is_leaf && node.size() == 1 {
                    // the root has a single child left: shrink the tree
                    let Some(mut header) = header_guard.take() else {
                        unreachable!("root collapse while the header latch was released")
                    };
                    write_root_page_id(header.page_mut(), node.children[0]);
                    let old_root = write_set[0].page_id();
                    write_set[0].drop_guard();
                    self.bpm.delete_page(old_root)?;
                }
                break;
            }
            if node.size() >= self.min_size_of(&node) {
                break;
            }

            let parent_idx = i - 1;
            let mut parent: BTreeNode<K> = deserialize_node(write_set[parent_idx].page())?;
            let cur_id = write_set[i].page_id();
            let pos = parent
                .children
                .iter()
                .position(|&c| c == cur_id)
                .ok_or(BTreeError::InvalidPageFormat)?;

            let mut rebalanced = false;

            // redistribute from the left sibling
            if pos > 0 {
                let mut sib_guard = self.bpm.fetch_page_write(parent.children[pos - 1])?;
                let mut sib: BTreeNode<K> = deserialize_node(sib_guard.page())?;
                if sib.size() > self.min_size_of(&sib) {
                    if node.is_leaf {
                        let k = sib.keys.pop().ok_or(BTreeError::InvalidPageFormat)?;
                        let v = sib.values.pop().ok_or(BTreeError::InvalidPageFormat)?;
                        parent.keys[pos - 1] = k.clone();
                        node.keys.insert(0, k);
                        node.values.insert(0, v);
                    } else {
                        let child = sib.children.pop().ok_or(BTreeError::InvalidPageFormat)?;
                        let rotated = sib.keys.pop().ok_or(BTreeError::InvalidPageFormat)?;
                        node.keys.insert(0, parent.keys[pos - 1].clone());
                        node.children.insert(0, child);
                        parent.keys[pos - 1] = rotated;
                    }
                    serialize_node(&sib, sib_guard.page_mut())?;
                    rebalanced = true;
                }
            }

            // then the right sibling
            if !rebalanced && pos + 1 < parent.children.len() {
                let mut sib_guard = self.bpm.fetch_page_write(parent.children[pos + 1])?;
                let mut sib: BTreeNode<K> = deserialize_node(sib_guard.page())?;
                if sib.size() > self.min_size_of(&sib) {
                    if node.is_leaf {
                        node.keys.push(sib.keys.remove(0));
                        node.values.push(sib.values.remove(0));
                        parent.keys[pos] = sib.keys[0].clone();
                    } else {
                        node.children.push(sib.children.remove(0));
                        node.keys.push(parent.keys[pos].clone());
                        parent.keys[pos] = sib.keys.remove(0);
                    }
                    serialize_node(&sib, sib_guard.page_mut())?;
                    rebalanced = true;
                }
            }

            if rebalanced {
                serialize_node(&node, write_set[i].page_mut())?;
                serialize_node(&parent, write_set[parent_idx].page_mut())?;
                break;
            }

            // neither sibling can spare an entry: merge
            if pos > 0 {
                // fold this node into its left sibling and drop its page
                let left_id = parent.children[pos - 1];
                let mut left_guard = self.bpm.fetch_page_write(left_id)?;
                let mut left: BTreeNode<K> = deserialize_node(left_guard.page())?;
                if node.is_leaf {
                    left.keys.append(&mut node.keys);
                    left.values.append(&mut node.values);
                    left.next_leaf = node.next_leaf;
                } else {
                    left.keys.push(parent.keys[pos - 1].clone());
                    left.keys.append(&mut node.keys);
                    left.children.append(&mut node.children);
                }
                parent.keys.remove(pos - 1);
                parent.children.remove(pos);
                serialize_node(&left, left_guard.page_mut())?;
                serialize_node(&parent, write_set[parent_idx].page_mut())?;
                drop(left_guard);
                write_set[i].drop_guard();
                self.bpm.delete_page(cur_id)?;
            } else {
                // leftmost child: absorb the right sibling instead
                let right_id = parent.children[1];
                let mut right_guard = self.bpm.fetch_page_write(right_id)?;
                let mut sib: BTreeNode<K> = deserialize_node(right_guard.page())?;
                if node.is_leaf {
                    node.keys.append(&mut sib.keys);
                    node.values.append(&mut sib.values);
                    node.next_leaf = sib.next_leaf;
                } else {
                    node.keys.push(parent.keys[0].clone());
                    node.keys.append(&mut sib.keys);
                    node.children.append(&mut sib.children);
                }
                parent.keys.remove(0);
                parent.children.remove(1);
                serialize_node(&node, write_set[i].page_mut())?;
                serialize_node(&parent, write_set[parent_idx].page_mut())?;
                right_guard.drop_guard();
                self.bpm.delete_page(right_id)?;
            }

            i = parent_idx;
        }

        Ok(())
    }
}
