use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use thiserror::Error;

use crate::catalog::{Catalog, TupleMeta};
use crate::common::types::TxnId;
use crate::index::btree::BTreeError;
use crate::transaction::lock_manager::LockManager;
use crate::transaction::transaction::{
    IsolationLevel, Transaction, TransactionAbortError, TransactionState, WType,
};

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("transaction aborted: {0}")]
    Abort(#[from] TransactionAbortError),

    #[error("index rollback failed: {0}")]
    IndexRollback(#[from] BTreeError),

    #[error("transaction {0} not found")]
    NotFound(TxnId),
}

/// Creates transactions, tracks the live ones, and drives commit and
/// abort. Abort replays the write sets to undo the transaction's effects.
pub struct TransactionManager {
    next_txn_id: AtomicU32,
    lock_manager: Arc<LockManager>,
    catalog: Arc<Catalog>,
    txn_map: Mutex<HashMap<TxnId, Arc<Transaction>>>,
}

impl TransactionManager {
    pub fn new(lock_manager: Arc<LockManager>, catalog: Arc<Catalog>) -> Self {
        Self {
            next_txn_id: AtomicU32::new(1),
            lock_manager,
            catalog,
            txn_map: Mutex::new(HashMap::new()),
        }
    }

    pub fn begin(&self, isolation_level: IsolationLevel) -> Arc<Transaction> {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let txn = Arc::new(Transaction::new(txn_id, isolation_level));
        self.txn_map.lock().insert(txn_id, txn.clone());
        txn
    }

    pub fn get_transaction(&self, txn_id: TxnId) -> Option<Arc<Transaction>> {
        self.txn_map.lock().get(&txn_id).cloned()
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    /// Release the transaction's locks and mark it committed.
    pub fn commit(&self, txn: &Arc<Transaction>) {
        self.lock_manager.unlock_all(txn);
        txn.set_state(TransactionState::Committed);
        self.txn_map.lock().remove(&txn.id());
        debug!("txn {} committed", txn.id());
    }

    /// Undo the transaction's writes, release its locks, and mark it
    /// aborted. The index write set is replayed in reverse (inserts are
    /// deleted, deletes re-inserted); the table write set then flips each
    /// tuple's deletion flag back.
    pub fn abort(&self, txn: &Arc<Transaction>) -> Result<(), TransactionError> {
        let (table_records, index_records) = txn.take_write_sets();

        for record in index_records.iter().rev() {
            let Some(index_info) = self.catalog.index(record.index_oid) else {
                continue;
            };
            match record.wtype {
                WType::Insert => index_info.index.remove(&record.key)?,
                WType::Delete => {
                    index_info.index.insert(record.key.clone(), record.rid)?;
                }
            }
        }

        for record in table_records.iter().rev() {
            let Some(table_info) = self.catalog.table(record.oid) else {
                continue;
            };
            if let Some(meta) = table_info.table.tuple_meta(record.rid) {
                let flipped = TupleMeta {
                    insert_txn_id: meta.insert_txn_id,
                    is_deleted: !meta.is_deleted,
                };
                table_info.table.update_tuple_meta(flipped, record.rid);
            }
        }

        self.lock_manager.unlock_all(txn);
        txn.set_state(TransactionState::Aborted);
        self.txn_map.lock().remove(&txn.id());
        debug!("txn {} aborted and rolled back", txn.id());
        Ok(())
    }
}
