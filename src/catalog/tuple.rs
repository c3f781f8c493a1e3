use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::catalog::value::Value;
use crate::common::types::{Rid, TxnId, INVALID_PAGE_ID, INVALID_TXN_ID};

/// Row payload plus the identifier of the slot it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    pub values: Vec<Value>,
    pub rid: Rid,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            rid: Rid::new(INVALID_PAGE_ID, 0),
        }
    }

    pub fn with_rid(values: Vec<Value>, rid: Rid) -> Self {
        Self { values, rid }
    }

    pub fn value(&self, idx: usize) -> &Value {
        &self.values[idx]
    }

    /// Project the key attributes out of this tuple to form an index key.
    pub fn key_from_tuple(&self, key_attrs: &[usize]) -> KeyTuple {
        KeyTuple(key_attrs.iter().map(|&i| self.values[i].clone()).collect())
    }
}

/// Per-tuple bookkeeping kept by the table heap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleMeta {
    pub insert_txn_id: TxnId,
    pub is_deleted: bool,
}

impl TupleMeta {
    pub fn new(insert_txn_id: TxnId) -> Self {
        Self {
            insert_txn_id,
            is_deleted: false,
        }
    }

    pub fn untracked() -> Self {
        Self::new(INVALID_TXN_ID)
    }
}

/// Composite index key: the projected key-column values of one tuple.
/// Totally ordered so it can key a B+ tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyTuple(pub Vec<Value>);

impl PartialOrd for KeyTuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyTuple {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            match a.total_cmp(b) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}
