use serde::{Deserialize, Serialize};

use crate::common::types::{PageId, Rid, INVALID_PAGE_ID};

/// B+Tree node model.
/// - Leaf nodes pair each key with a record ID and chain to the next leaf.
/// - Internal nodes hold n child page IDs separated by n-1 keys:
///   `children[i]` covers keys below `keys[i]`, `children[i+1]` keys at or
///   above it.
#[derive(Debug, Serialize, Deserialize)]
pub struct BTreeNode<K> {
    pub is_leaf: bool,
    pub keys: Vec<K>,
    pub values: Vec<Rid>,       // leaf only
    pub children: Vec<PageId>,  // internal only
    pub next_leaf: PageId,      // leaf only, INVALID_PAGE_ID terminates the chain
}

impl<K: Clone + Ord> BTreeNode<K> {
    pub fn new_leaf() -> Self {
        Self {
            is_leaf: true,
            keys: Vec::new(),
            values: Vec::new(),
            children: Vec::new(),
            next_leaf: INVALID_PAGE_ID,
        }
    }

    pub fn new_internal() -> Self {
        Self {
            is_leaf: false,
            keys: Vec::new(),
            values: Vec::new(),
            children: Vec::new(),
            next_leaf: INVALID_PAGE_ID,
        }
    }

    /// Node size in the B+ tree sense: entries for a leaf, fanout for an
    /// internal node.
    pub fn size(&self) -> usize {
        if self.is_leaf {
            self.keys.len()
        } else {
            self.children.len()
        }
    }

    /// Exact-match lookup in a leaf
    pub fn leaf_lookup(&self, key: &K) -> Option<Rid> {
        debug_assert!(self.is_leaf);
        match self.keys.binary_search(key) {
            Ok(pos) => Some(self.values[pos]),
            Err(_) => None,
        }
    }

    /// First slot whose key is >= the probe (the leaf lower bound)
    pub fn leaf_lower_bound(&self, key: &K) -> usize {
        debug_assert!(self.is_leaf);
        match self.keys.binary_search(key) {
            Ok(pos) | Err(pos) => pos,
        }
    }

    /// Which child subtree covers the key
    pub fn child_index(&self, key: &K) -> usize {
        debug_assert!(!self.is_leaf);
        match self.keys.binary_search(key) {
            Ok(pos) => pos + 1, // equal to a separator goes right
            Err(pos) => pos,
        }
    }

    /// Insert into a leaf, keeping keys sorted. Returns false on duplicate.
    pub fn leaf_insert(&mut self, key: K, rid: Rid) -> bool {
        debug_assert!(self.is_leaf);
        match self.keys.binary_search(&key) {
            Ok(_) => false,
            Err(pos) => {
                self.keys.insert(pos, key);
                self.values.insert(pos, rid);
                true
            }
        }
    }

    /// Remove a key from a leaf. Returns false when absent.
    pub fn leaf_remove(&mut self, key: &K) -> bool {
        debug_assert!(self.is_leaf);
        match self.keys.binary_search(key) {
            Ok(pos) => {
                self.keys.remove(pos);
                self.values.remove(pos);
                true
            }
            Err(_) => false,
        }
    }
}
