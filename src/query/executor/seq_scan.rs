use std::sync::Arc;

use crate::catalog::schema::Schema;
use crate::catalog::tuple::Tuple;
use crate::catalog::TableInfo;
use crate::common::types::Rid;
use crate::query::executor::{ExecutionError, Executor, ExecutorContext};
use crate::query::plan::SeqScanPlan;
use crate::transaction::transaction::{IsolationLevel, LockMode};

/// Full-table scan with the 2PL locking ladder: an intention lock on the
/// table, then a lock per row. READ_UNCOMMITTED takes no read locks at
/// all; READ_COMMITTED sheds each row's S lock as soon as the row has
/// been surfaced. Exclusive locks (for delete pipelines) are held to the
/// end of the transaction.
pub struct SeqScanExecutor {
    plan: SeqScanPlan,
    ctx: ExecutorContext,
    table_info: Option<Arc<TableInfo>>,
    rids: Vec<Rid>,
    pos: usize,
}

impl SeqScanExecutor {
    pub fn new(plan: SeqScanPlan, ctx: ExecutorContext) -> Self {
        Self {
            plan,
            ctx,
            table_info: None,
            rids: Vec::new(),
            pos: 0,
        }
    }

    fn takes_read_locks(&self) -> bool {
        self.ctx.txn.isolation_level() != IsolationLevel::ReadUncommitted || self.ctx.is_delete
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> Result<(), ExecutionError> {
        let oid = self.plan.table_oid;
        if self.takes_read_locks() {
            let held = self.ctx.txn.held_table_lock_mode(oid);
            // any table lock covers a read; a delete needs exclusive intent
            let needs_lock = if self.ctx.is_delete {
                !matches!(
                    held,
                    Some(LockMode::IntentionExclusive)
                        | Some(LockMode::SharedIntentionExclusive)
                        | Some(LockMode::Exclusive)
                )
            } else {
                held.is_none()
            };
            if needs_lock {
                let mode = if self.ctx.is_delete {
                    LockMode::IntentionExclusive
                } else {
                    LockMode::IntentionShared
                };
                if !self.ctx.lock_manager.lock_table(&self.ctx.txn, mode, oid)? {
                    return Err(ExecutionError::LockNotGranted);
                }
            }
        }
        let table_info = self
            .ctx
            .catalog
            .table(oid)
            .ok_or(ExecutionError::UnknownTable(oid))?;
        self.rids = table_info.table.scan_rids();
        self.table_info = Some(table_info);
        self.pos = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>, ExecutionError> {
        let table_info = self
            .table_info
            .as_ref()
            .ok_or(ExecutionError::UnknownTable(self.plan.table_oid))?
            .clone();
        let oid = self.plan.table_oid;
        loop {
            if self.pos >= self.rids.len() {
                return Ok(None);
            }
            let rid = self.rids[self.pos];
            self.pos += 1;

            let mut row_locked = false;
            if self.takes_read_locks() {
                let held = self.ctx.txn.held_row_lock_mode(oid, rid);
                let needs_lock = if self.ctx.is_delete {
                    held != Some(LockMode::Exclusive)
                } else {
                    held.is_none()
                };
                if needs_lock {
                    let mode = if self.ctx.is_delete {
                        LockMode::Exclusive
                    } else {
                        LockMode::Shared
                    };
                    if !self.ctx.lock_manager.lock_row(&self.ctx.txn, mode, oid, rid)? {
                        return Err(ExecutionError::LockNotGranted);
                    }
                    row_locked = true;
                }
            }

            let Some((meta, tuple)) = table_info.table.get_tuple(rid) else {
                if row_locked && !self.ctx.is_delete {
                    self.ctx.lock_manager.unlock_row(&self.ctx.txn, oid, rid, true)?;
                }
                continue;
            };

            if meta.is_deleted {
                // a row we will not surface keeps no S lock
                if row_locked && !self.ctx.is_delete {
                    self.ctx.lock_manager.unlock_row(&self.ctx.txn, oid, rid, true)?;
                }
                continue;
            }

            if row_locked
                && !self.ctx.is_delete
                && self.ctx.txn.isolation_level() == IsolationLevel::ReadCommitted
            {
                self.ctx.lock_manager.unlock_row(&self.ctx.txn, oid, rid, true)?;
            }
            return Ok(Some((tuple, rid)));
        }
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
