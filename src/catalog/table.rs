use std::sync::Arc;

use parking_lot::RwLock;

use crate::catalog::tuple::{Tuple, TupleMeta};
use crate::common::types::{Rid, TableOid};
use crate::transaction::lock_manager::LockManager;
use crate::transaction::transaction::{LockMode, Transaction, TransactionAbortError};

/// In-memory table heap: a growing array of (meta, tuple) slots addressed
/// by RID. The engine core does not define a physical byte layout for
/// tuples; the heap only honours the narrow contract the executors need.
pub struct TableHeap {
    oid: TableOid,
    rows: RwLock<Vec<(TupleMeta, Tuple)>>,
}

impl TableHeap {
    pub fn new(oid: TableOid) -> Self {
        Self {
            oid,
            rows: RwLock::new(Vec::new()),
        }
    }

    pub fn oid(&self) -> TableOid {
        self.oid
    }

    /// Append a tuple, taking the row X lock on its new RID first when a
    /// transaction is supplied.
    pub fn insert_tuple(
        &self,
        meta: TupleMeta,
        mut tuple: Tuple,
        lock: Option<(&LockManager, &Arc<Transaction>)>,
    ) -> Result<Option<Rid>, TransactionAbortError> {
        let mut rows = self.rows.write();
        let rid = Rid::new(self.oid, rows.len() as u32);
        if let Some((lock_manager, txn)) = lock {
            // a fresh rid has no other holders, so the grant is immediate
            if !lock_manager.lock_row(txn, LockMode::Exclusive, self.oid, rid)? {
                return Ok(None);
            }
        }
        tuple.rid = rid;
        rows.push((meta, tuple));
        Ok(Some(rid))
    }

    pub fn get_tuple(&self, rid: Rid) -> Option<(TupleMeta, Tuple)> {
        let rows = self.rows.read();
        rows.get(rid.slot as usize).cloned()
    }

    pub fn tuple_meta(&self, rid: Rid) -> Option<TupleMeta> {
        let rows = self.rows.read();
        rows.get(rid.slot as usize).map(|(meta, _)| *meta)
    }

    pub fn update_tuple_meta(&self, meta: TupleMeta, rid: Rid) {
        let mut rows = self.rows.write();
        if let Some(slot) = rows.get_mut(rid.slot as usize) {
            slot.0 = meta;
        }
    }

    /// Snapshot of every RID currently in the heap, in insertion order.
    pub fn scan_rids(&self) -> Vec<Rid> {
        let rows = self.rows.read();
        (0..rows.len())
            .map(|slot| Rid::new(self.oid, slot as u32))
            .collect()
    }

    pub fn make_iterator(self: &Arc<Self>) -> TableIter {
        TableIter {
            heap: self.clone(),
            rids: self.scan_rids(),
            pos: 0,
        }
    }
}

/// Iterator over a snapshot of the heap's RIDs, re-reading each row as it
/// is visited.
pub struct TableIter {
    heap: Arc<TableHeap>,
    rids: Vec<Rid>,
    pos: usize,
}

impl TableIter {
    pub fn next_row(&mut self) -> Option<(Rid, TupleMeta, Tuple)> {
        while self.pos < self.rids.len() {
            let rid = self.rids[self.pos];
            self.pos += 1;
            if let Some((meta, tuple)) = self.heap.get_tuple(rid) {
                return Some((rid, meta, tuple));
            }
        }
        None
    }
}
