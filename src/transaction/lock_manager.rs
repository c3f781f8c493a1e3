use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;
use parking_lot::{Condvar, Mutex};

use crate::common::types::{Rid, TableOid, TxnId};
use crate::transaction::transaction::{
    AbortReason, IsolationLevel, LockMode, Transaction, TransactionAbortError, TransactionState,
};
use crate::transaction::transaction_manager::TransactionManager;

const MODE_COUNT: usize = 5;

fn mode_idx(mode: LockMode) -> usize {
    match mode {
        LockMode::IntentionShared => 0,
        LockMode::IntentionExclusive => 1,
        LockMode::Shared => 2,
        LockMode::SharedIntentionExclusive => 3,
        LockMode::Exclusive => 4,
    }
}

/// Multi-granularity compatibility: may `mode` join the granted set?
fn compatible_with_granted(counts: &[usize; MODE_COUNT], mode: LockMode) -> bool {
    let is = counts[0];
    let ix = counts[1];
    let s = counts[2];
    let six = counts[3];
    let x = counts[4];
    match mode {
        LockMode::IntentionShared => x == 0,
        LockMode::IntentionExclusive => s == 0 && six == 0 && x == 0,
        LockMode::Shared => ix == 0 && six == 0 && x == 0,
        LockMode::SharedIntentionExclusive => ix == 0 && s == 0 && six == 0 && x == 0,
        LockMode::Exclusive => is == 0 && ix == 0 && s == 0 && six == 0 && x == 0,
    }
}

/// The upgrade lattice: IS -> {S, X, IX, SIX}, S -> {SIX, X},
/// IX -> {SIX, X}, SIX -> {X}.
fn can_upgrade(from: LockMode, to: LockMode) -> bool {
    match from {
        LockMode::IntentionShared => to != LockMode::IntentionShared,
        LockMode::Shared | LockMode::IntentionExclusive => {
            matches!(to, LockMode::SharedIntentionExclusive | LockMode::Exclusive)
        }
        LockMode::SharedIntentionExclusive => to == LockMode::Exclusive,
        LockMode::Exclusive => false,
    }
}

struct PendingRequest {
    txn_id: TxnId,
    mode: LockMode,
}

#[derive(Default)]
struct QueueState {
    /// FIFO pending requests; an upgrader is re-queued at the front
    queue: VecDeque<PendingRequest>,
    /// currently granted requests by transaction
    granted: HashMap<TxnId, LockMode>,
    granted_counts: [usize; MODE_COUNT],
    /// at most one transaction may be upgrading per resource
    upgrading: Option<TxnId>,
}

struct LockRequestQueue {
    state: Mutex<QueueState>,
    cv: Condvar,
}

impl LockRequestQueue {
    fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            cv: Condvar::new(),
        }
    }
}

/// Which resource a queue protects; carried through the shared acquire
/// path so lock-set bookkeeping lands at the right granularity.
#[derive(Clone, Copy)]
enum ResourceKey {
    Table(TableOid),
    Row(TableOid, Rid),
}

/// Hierarchical two-phase-locking lock manager with table and row
/// granularities, lock upgrades, and background deadlock detection.
pub struct LockManager {
    table_lock_map: Mutex<HashMap<TableOid, Arc<LockRequestQueue>>>,
    row_lock_map: Mutex<HashMap<Rid, Arc<LockRequestQueue>>>,
    running: Arc<AtomicBool>,
    detector: Mutex<Option<JoinHandle<()>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            table_lock_map: Mutex::new(HashMap::new()),
            row_lock_map: Mutex::new(HashMap::new()),
            running: Arc::new(AtomicBool::new(false)),
            detector: Mutex::new(None),
        }
    }

    /// Acquire a table lock, blocking until it can be granted in FIFO
    /// order. Returns Ok(false) if the transaction was aborted while
    /// waiting; precondition violations abort it and return the error.
    pub fn lock_table(
        &self,
        txn: &Arc<Transaction>,
        mode: LockMode,
        oid: TableOid,
    ) -> Result<bool, TransactionAbortError> {
        self.check_isolation_preconditions(txn, mode, false)?;
        let queue = self.table_queue(oid);
        self.acquire(&queue, txn, mode, ResourceKey::Table(oid))
    }

    /// Acquire a row lock. Rows only take S or X, and require a covering
    /// table lock.
    pub fn lock_row(
        &self,
        txn: &Arc<Transaction>,
        mode: LockMode,
        oid: TableOid,
        rid: Rid,
    ) -> Result<bool, TransactionAbortError> {
        if !matches!(mode, LockMode::Shared | LockMode::Exclusive) {
            return Err(self.abort(txn, AbortReason::AttemptedIntentionLockOnRow));
        }
        self.check_isolation_preconditions(txn, mode, true)?;
        let table_mode = txn.held_table_lock_mode(oid);
        let covered = match mode {
            LockMode::Exclusive => matches!(
                table_mode,
                Some(LockMode::Exclusive)
                    | Some(LockMode::IntentionExclusive)
                    | Some(LockMode::SharedIntentionExclusive)
            ),
            _ => table_mode.is_some(),
        };
        if !covered {
            return Err(self.abort(txn, AbortReason::TableLockNotPresent));
        }
        let queue = self.row_queue(rid);
        self.acquire(&queue, txn, mode, ResourceKey::Row(oid, rid))
    }

    /// Release a table lock, applying the 2PL state transition.
    pub fn unlock_table(
        &self,
        txn: &Arc<Transaction>,
        oid: TableOid,
    ) -> Result<(), TransactionAbortError> {
        let Some(mode) = txn.held_table_lock_mode(oid) else {
            return Err(self.abort(txn, AbortReason::AttemptedUnlockButNoLockHeld));
        };
        if txn.holds_row_locks_on(oid) {
            return Err(self.abort(txn, AbortReason::TableUnlockedBeforeUnlockingRows));
        }
        let queue = self.table_queue(oid);
        {
            let mut state = queue.state.lock();
            state.granted_counts[mode_idx(mode)] -= 1;
            state.granted.remove(&txn.id());
        }
        self.apply_2pl_transition(txn, mode);
        txn.remove_table_lock(mode, oid);
        queue.cv.notify_all();
        Ok(())
    }

    /// Release a row lock. `force` skips the 2PL state transition (used by
    /// scans shedding early-acquired S locks).
    pub fn unlock_row(
        &self,
        txn: &Arc<Transaction>,
        oid: TableOid,
        rid: Rid,
        force: bool,
    ) -> Result<(), TransactionAbortError> {
        let Some(mode) = txn.held_row_lock_mode(oid, rid) else {
            return Err(self.abort(txn, AbortReason::AttemptedUnlockButNoLockHeld));
        };
        let queue = self.row_queue(rid);
        {
            let mut state = queue.state.lock();
            state.granted_counts[mode_idx(mode)] -= 1;
            state.granted.remove(&txn.id());
        }
        if !force {
            self.apply_2pl_transition(txn, mode);
        }
        txn.remove_row_lock(mode, oid, rid);
        queue.cv.notify_all();
        Ok(())
    }

    /// Release everything the transaction still holds, rows before tables,
    /// with no 2PL transitions or precondition checks. Used by commit and
    /// abort.
    pub fn unlock_all(&self, txn: &Arc<Transaction>) {
        for (mode, oid, rid) in txn.row_locks() {
            let queue = self.row_queue(rid);
            {
                let mut state = queue.state.lock();
                if state.granted.remove(&txn.id()).is_some() {
                    state.granted_counts[mode_idx(mode)] -= 1;
                }
            }
            txn.remove_row_lock(mode, oid, rid);
            queue.cv.notify_all();
        }
        for (mode, oid) in txn.table_locks() {
            let queue = self.table_queue(oid);
            {
                let mut state = queue.state.lock();
                if state.granted.remove(&txn.id()).is_some() {
                    state.granted_counts[mode_idx(mode)] -= 1;
                }
            }
            txn.remove_table_lock(mode, oid);
            queue.cv.notify_all();
        }
    }

    // ---- internals ----

    fn table_queue(&self, oid: TableOid) -> Arc<LockRequestQueue> {
        let mut map = self.table_lock_map.lock();
        map.entry(oid)
            .or_insert_with(|| Arc::new(LockRequestQueue::new()))
            .clone()
    }

    fn row_queue(&self, rid: Rid) -> Arc<LockRequestQueue> {
        let mut map = self.row_lock_map.lock();
        map.entry(rid)
            .or_insert_with(|| Arc::new(LockRequestQueue::new()))
            .clone()
    }

    fn abort(&self, txn: &Arc<Transaction>, reason: AbortReason) -> TransactionAbortError {
        txn.set_state(TransactionState::Aborted);
        debug!("txn {} aborted: {}", txn.id(), reason);
        TransactionAbortError {
            txn_id: txn.id(),
            reason,
        }
    }

    fn check_isolation_preconditions(
        &self,
        txn: &Arc<Transaction>,
        mode: LockMode,
        is_row: bool,
    ) -> Result<(), TransactionAbortError> {
        let state = txn.state();
        match txn.isolation_level() {
            IsolationLevel::RepeatableRead => {
                if state == TransactionState::Shrinking {
                    return Err(self.abort(txn, AbortReason::LockOnShrinking));
                }
            }
            IsolationLevel::ReadCommitted => {
                let read_mode = if is_row {
                    mode == LockMode::Shared
                } else {
                    matches!(mode, LockMode::Shared | LockMode::IntentionShared)
                };
                if state == TransactionState::Shrinking && !read_mode {
                    return Err(self.abort(txn, AbortReason::LockOnShrinking));
                }
            }
            IsolationLevel::ReadUncommitted => {
                let write_mode = if is_row {
                    mode == LockMode::Exclusive
                } else {
                    matches!(mode, LockMode::Exclusive | LockMode::IntentionExclusive)
                };
                if !write_mode {
                    return Err(self.abort(txn, AbortReason::LockSharedOnReadUncommitted));
                }
                if state == TransactionState::Shrinking {
                    return Err(self.abort(txn, AbortReason::LockOnShrinking));
                }
            }
        }
        Ok(())
    }

    fn apply_2pl_transition(&self, txn: &Arc<Transaction>, released: LockMode) {
        let shrink = match txn.isolation_level() {
            IsolationLevel::RepeatableRead => {
                matches!(released, LockMode::Shared | LockMode::Exclusive)
            }
            IsolationLevel::ReadCommitted | IsolationLevel::ReadUncommitted => {
                released == LockMode::Exclusive
            }
        };
        if shrink {
            txn.begin_shrinking();
        }
    }

    /// Shared grant path for tables and rows: upgrade handling, FIFO wait,
    /// abort-aware wakeups, and lock-set bookkeeping.
    fn acquire(
        &self,
        queue: &Arc<LockRequestQueue>,
        txn: &Arc<Transaction>,
        mode: LockMode,
        key: ResourceKey,
    ) -> Result<bool, TransactionAbortError> {
        let txn_id = txn.id();
        let mut state = queue.state.lock();

        if let Some(&prev_mode) = state.granted.get(&txn_id) {
            if prev_mode == mode {
                return Ok(true);
            }
            if !can_upgrade(prev_mode, mode) {
                return Err(self.abort(txn, AbortReason::IncompatibleUpgrade));
            }
            if state.upgrading.is_some_and(|id| id != txn_id) {
                return Err(self.abort(txn, AbortReason::UpgradeConflict));
            }
            // drop the held lock and take the reserved head-of-queue slot
            state.upgrading = Some(txn_id);
            state.granted_counts[mode_idx(prev_mode)] -= 1;
            state.granted.remove(&txn_id);
            match key {
                ResourceKey::Table(oid) => txn.remove_table_lock(prev_mode, oid),
                ResourceKey::Row(oid, rid) => txn.remove_row_lock(prev_mode, oid, rid),
            }
            state.queue.push_front(PendingRequest { txn_id, mode });
        } else {
            state.queue.push_back(PendingRequest { txn_id, mode });
        }

        loop {
            if txn.state() == TransactionState::Aborted {
                // withdraw the pending request so successors can proceed
                if let Some(pos) = state.queue.iter().position(|r| r.txn_id == txn_id) {
                    state.queue.remove(pos);
                }
                if state.upgrading == Some(txn_id) {
                    state.upgrading = None;
                }
                queue.cv.notify_all();
                return Ok(false);
            }
            let at_front = state
                .queue
                .front()
                .is_some_and(|r| r.txn_id == txn_id && r.mode == mode);
            if at_front && compatible_with_granted(&state.granted_counts, mode) {
                break;
            }
            queue.cv.wait(&mut state);
        }

        state.queue.pop_front();
        if state.upgrading == Some(txn_id) {
            state.upgrading = None;
        }
        state.granted.insert(txn_id, mode);
        state.granted_counts[mode_idx(mode)] += 1;
        match key {
            ResourceKey::Table(oid) => txn.add_table_lock(mode, oid),
            ResourceKey::Row(oid, rid) => txn.add_row_lock(mode, oid, rid),
        }
        queue.cv.notify_all();
        Ok(true)
    }

    // ---- deadlock detection ----

    /// Spawn the background detector. Each cycle it rebuilds the waits-for
    /// graph from scratch, aborts the youngest transaction on each cycle,
    /// and wakes the queues that victim was waiting in.
    pub fn start_deadlock_detection(
        self: &Arc<Self>,
        txn_manager: &Arc<TransactionManager>,
        interval: Duration,
    ) {
        let weak_lm = Arc::downgrade(self);
        let weak_tm = Arc::downgrade(txn_manager);
        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);
        let handle = thread::Builder::new()
            .name("deadlock-detector".to_string())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    thread::sleep(interval);
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    let (Some(lm), Some(tm)) = (weak_lm.upgrade(), weak_tm.upgrade()) else {
                        break;
                    };
                    lm.run_detection_cycle(&tm);
                }
            })
            .expect("failed to spawn deadlock detector");
        *self.detector.lock() = Some(handle);
    }

    /// Stop the detector thread and wait for it to exit.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.detector.lock().take() {
            let _ = handle.join();
        }
    }

    fn all_queues(&self) -> Vec<Arc<LockRequestQueue>> {
        let mut queues: Vec<Arc<LockRequestQueue>> =
            self.table_lock_map.lock().values().cloned().collect();
        queues.extend(self.row_lock_map.lock().values().cloned());
        queues
    }

    fn run_detection_cycle(&self, txn_manager: &TransactionManager) {
        let queues = self.all_queues();

        // each pending requester waits on every granted holder
        let mut waits_for: BTreeMap<TxnId, BTreeSet<TxnId>> = BTreeMap::new();
        for queue in &queues {
            let state = queue.state.lock();
            for pending in &state.queue {
                for &holder in state.granted.keys() {
                    if holder != pending.txn_id {
                        waits_for.entry(pending.txn_id).or_default().insert(holder);
                    }
                }
            }
        }

        while let Some(cycle) = find_cycle(&waits_for) {
            let victim = *cycle.iter().max().expect("cycle cannot be empty");
            debug!("deadlock: cycle {:?}, aborting txn {}", cycle, victim);
            if let Some(victim_txn) = txn_manager.get_transaction(victim) {
                victim_txn.set_state(TransactionState::Aborted);
            }
            waits_for.remove(&victim);
            for queue in &queues {
                let state = queue.state.lock();
                if state.queue.iter().any(|r| r.txn_id == victim) {
                    queue.cv.notify_all();
                }
            }
        }
        // the graph is transient; it is rebuilt from scratch next cycle
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LockManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Depth-first search for a cycle, visiting vertices and edges in
/// ascending transaction-id order. Returns the transactions on the first
/// cycle found.
fn find_cycle(graph: &BTreeMap<TxnId, BTreeSet<TxnId>>) -> Option<Vec<TxnId>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    fn dfs(
        node: TxnId,
        graph: &BTreeMap<TxnId, BTreeSet<TxnId>>,
        colors: &mut HashMap<TxnId, Color>,
        path: &mut Vec<TxnId>,
    ) -> Option<Vec<TxnId>> {
        colors.insert(node, Color::Gray);
        path.push(node);
        if let Some(edges) = graph.get(&node) {
            for &next in edges {
                match colors.get(&next).copied().unwrap_or(Color::White) {
                    Color::Gray => {
                        // back-edge: the cycle is the path suffix from `next`
                        let start = path.iter().position(|&n| n == next).unwrap_or(0);
                        return Some(path[start..].to_vec());
                    }
                    Color::White => {
                        if let Some(cycle) = dfs(next, graph, colors, path) {
                            return Some(cycle);
                        }
                    }
                    Color::Black => {}
                }
            }
        }
        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    let mut colors: HashMap<TxnId, Color> = HashMap::new();
    for &start in graph.keys() {
        if colors.get(&start).copied().unwrap_or(Color::White) == Color::White {
            let mut path = Vec::new();
            if let Some(cycle) = dfs(start, graph, &mut colors, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}
