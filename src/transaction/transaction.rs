use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use thiserror::Error;

use crate::catalog::tuple::KeyTuple;
use crate::catalog::IndexOid;
use crate::common::types::{Rid, TableOid, TxnId};

/// Transaction isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
}

/// Transaction states under two-phase locking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Growing,
    Shrinking,
    Committed,
    Aborted,
}

/// Lock modes, from weakest to strongest intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    IntentionShared,
    IntentionExclusive,
    Shared,
    SharedIntentionExclusive,
    Exclusive,
}

/// Why a transaction was aborted by the lock manager
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    #[error("lock requested while shrinking")]
    LockOnShrinking,
    #[error("shared lock requested at READ_UNCOMMITTED")]
    LockSharedOnReadUncommitted,
    #[error("intention lock requested on a row")]
    AttemptedIntentionLockOnRow,
    #[error("incompatible lock upgrade")]
    IncompatibleUpgrade,
    #[error("another transaction is already upgrading on this resource")]
    UpgradeConflict,
    #[error("row lock requested without the required table lock")]
    TableLockNotPresent,
    #[error("unlock requested but no lock is held")]
    AttemptedUnlockButNoLockHeld,
    #[error("table unlocked before its row locks were released")]
    TableUnlockedBeforeUnlockingRows,
    #[error("chosen as a deadlock victim")]
    Deadlock,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transaction {txn_id} aborted: {reason}")]
pub struct TransactionAbortError {
    pub txn_id: TxnId,
    pub reason: AbortReason,
}

/// What kind of write a write record undoes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WType {
    Insert,
    Delete,
}

/// Undo information for one table heap modification
#[derive(Debug, Clone)]
pub struct TableWriteRecord {
    pub oid: TableOid,
    pub rid: Rid,
    pub wtype: WType,
}

/// Undo information for one index modification
#[derive(Debug, Clone)]
pub struct IndexWriteRecord {
    pub oid: TableOid,
    pub index_oid: IndexOid,
    pub rid: Rid,
    pub key: KeyTuple,
    pub wtype: WType,
}

#[derive(Default)]
struct LockSets {
    shared_tables: HashSet<TableOid>,
    exclusive_tables: HashSet<TableOid>,
    intention_shared_tables: HashSet<TableOid>,
    intention_exclusive_tables: HashSet<TableOid>,
    shared_intention_exclusive_tables: HashSet<TableOid>,
    shared_rows: HashMap<TableOid, HashSet<Rid>>,
    exclusive_rows: HashMap<TableOid, HashSet<Rid>>,
}

impl LockSets {
    fn table_set(&mut self, mode: LockMode) -> &mut HashSet<TableOid> {
        match mode {
            LockMode::Shared => &mut self.shared_tables,
            LockMode::Exclusive => &mut self.exclusive_tables,
            LockMode::IntentionShared => &mut self.intention_shared_tables,
            LockMode::IntentionExclusive => &mut self.intention_exclusive_tables,
            LockMode::SharedIntentionExclusive => &mut self.shared_intention_exclusive_tables,
        }
    }
}

/// An active transaction: identity, isolation level, 2PL state, the locks
/// it holds at each granularity, and the undo logs for its writes.
pub struct Transaction {
    id: TxnId,
    isolation_level: IsolationLevel,
    state: Mutex<TransactionState>,
    locks: Mutex<LockSets>,
    table_write_set: Mutex<Vec<TableWriteRecord>>,
    index_write_set: Mutex<Vec<IndexWriteRecord>>,
}

impl Transaction {
    pub fn new(id: TxnId, isolation_level: IsolationLevel) -> Self {
        Self {
            id,
            isolation_level,
            state: Mutex::new(TransactionState::Growing),
            locks: Mutex::new(LockSets::default()),
            table_write_set: Mutex::new(Vec::new()),
            index_write_set: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: TransactionState) {
        *self.state.lock() = state;
    }

    /// Growing -> Shrinking; never resurrects a finished transaction.
    pub fn begin_shrinking(&self) {
        let mut state = self.state.lock();
        if *state == TransactionState::Growing {
            *state = TransactionState::Shrinking;
        }
    }

    // ---- lock set bookkeeping (driven by the lock manager) ----

    pub fn add_table_lock(&self, mode: LockMode, oid: TableOid) {
        self.locks.lock().table_set(mode).insert(oid);
    }

    pub fn remove_table_lock(&self, mode: LockMode, oid: TableOid) {
        self.locks.lock().table_set(mode).remove(&oid);
    }

    pub fn held_table_lock_mode(&self, oid: TableOid) -> Option<LockMode> {
        let locks = self.locks.lock();
        for mode in [
            LockMode::Exclusive,
            LockMode::SharedIntentionExclusive,
            LockMode::Shared,
            LockMode::IntentionExclusive,
            LockMode::IntentionShared,
        ] {
            let set = match mode {
                LockMode::Shared => &locks.shared_tables,
                LockMode::Exclusive => &locks.exclusive_tables,
                LockMode::IntentionShared => &locks.intention_shared_tables,
                LockMode::IntentionExclusive => &locks.intention_exclusive_tables,
                LockMode::SharedIntentionExclusive => &locks.shared_intention_exclusive_tables,
            };
            if set.contains(&oid) {
                return Some(mode);
            }
        }
        None
    }

    pub fn add_row_lock(&self, mode: LockMode, oid: TableOid, rid: Rid) {
        let mut locks = self.locks.lock();
        let map = match mode {
            LockMode::Shared => &mut locks.shared_rows,
            LockMode::Exclusive => &mut locks.exclusive_rows,
            _ => unreachable!("intention locks are not taken on rows"),
        };
        map.entry(oid).or_default().insert(rid);
    }

    pub fn remove_row_lock(&self, mode: LockMode, oid: TableOid, rid: Rid) {
        let mut locks = self.locks.lock();
        let map = match mode {
            LockMode::Shared => &mut locks.shared_rows,
            LockMode::Exclusive => &mut locks.exclusive_rows,
            _ => unreachable!("intention locks are not taken on rows"),
        };
        if let Some(set) = map.get_mut(&oid) {
            set.remove(&rid);
        }
    }

    pub fn held_row_lock_mode(&self, oid: TableOid, rid: Rid) -> Option<LockMode> {
        let locks = self.locks.lock();
        if locks
            .exclusive_rows
            .get(&oid)
            .is_some_and(|set| set.contains(&rid))
        {
            return Some(LockMode::Exclusive);
        }
        if locks
            .shared_rows
            .get(&oid)
            .is_some_and(|set| set.contains(&rid))
        {
            return Some(LockMode::Shared);
        }
        None
    }

    /// Does this transaction still hold any row lock under the given table?
    pub fn holds_row_locks_on(&self, oid: TableOid) -> bool {
        let locks = self.locks.lock();
        locks.shared_rows.get(&oid).is_some_and(|s| !s.is_empty())
            || locks.exclusive_rows.get(&oid).is_some_and(|s| !s.is_empty())
    }

    /// Snapshot of all held table locks (for bulk release)
    pub fn table_locks(&self) -> Vec<(LockMode, TableOid)> {
        let locks = self.locks.lock();
        let mut out = Vec::new();
        for (mode, set) in [
            (LockMode::Shared, &locks.shared_tables),
            (LockMode::Exclusive, &locks.exclusive_tables),
            (LockMode::IntentionShared, &locks.intention_shared_tables),
            (LockMode::IntentionExclusive, &locks.intention_exclusive_tables),
            (
                LockMode::SharedIntentionExclusive,
                &locks.shared_intention_exclusive_tables,
            ),
        ] {
            out.extend(set.iter().map(|&oid| (mode, oid)));
        }
        out
    }

    /// Snapshot of all held row locks (for bulk release)
    pub fn row_locks(&self) -> Vec<(LockMode, TableOid, Rid)> {
        let locks = self.locks.lock();
        let mut out = Vec::new();
        for (&oid, set) in &locks.shared_rows {
            out.extend(set.iter().map(|&rid| (LockMode::Shared, oid, rid)));
        }
        for (&oid, set) in &locks.exclusive_rows {
            out.extend(set.iter().map(|&rid| (LockMode::Exclusive, oid, rid)));
        }
        out
    }

    // ---- write sets ----

    pub fn append_table_write_record(&self, record: TableWriteRecord) {
        self.table_write_set.lock().push(record);
    }

    pub fn append_index_write_record(&self, record: IndexWriteRecord) {
        self.index_write_set.lock().push(record);
    }

    pub fn take_write_sets(&self) -> (Vec<TableWriteRecord>, Vec<IndexWriteRecord>) {
        let table = std::mem::take(&mut *self.table_write_set.lock());
        let index = std::mem::take(&mut *self.index_write_set.lock());
        (table, index)
    }
}
