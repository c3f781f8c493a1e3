use std::sync::Arc;

use crate::catalog::schema::Schema;
use crate::catalog::tuple::{Tuple, TupleMeta};
use crate::catalog::{IndexInfo, TableInfo};
use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::catalog::value::Value;
use crate::query::executor::{ExecutionError, Executor, ExecutorContext};
use crate::query::plan::InsertPlan;
use crate::transaction::transaction::{IndexWriteRecord, LockMode, TableWriteRecord, WType};

/// Pulls rows from its child, appends each to the table heap and every
/// index, and records undo information in the transaction's write sets.
/// Emits one summary row carrying the inserted-row count.
pub struct InsertExecutor {
    plan: InsertPlan,
    child: Box<dyn Executor>,
    ctx: ExecutorContext,
    table_info: Option<Arc<TableInfo>>,
    indexes: Vec<Arc<IndexInfo>>,
    done: bool,
}

impl InsertExecutor {
    pub fn new(plan: InsertPlan, child: Box<dyn Executor>, ctx: ExecutorContext) -> Self {
        Self {
            plan,
            child,
            ctx,
            table_info: None,
            indexes: Vec::new(),
            done: false,
        }
    }
}

impl Executor for InsertExecutor {
    fn init(&mut self) -> Result<(), ExecutionError> {
        self.child.init()?;
        let oid = self.plan.table_oid;
        let covered = matches!(
            self.ctx.txn.held_table_lock_mode(oid),
            Some(LockMode::IntentionExclusive)
                | Some(LockMode::SharedIntentionExclusive)
                | Some(LockMode::Exclusive)
        );
        if !covered
            && !self
                .ctx
                .lock_manager
                .lock_table(&self.ctx.txn, LockMode::IntentionExclusive, oid)?
        {
            return Err(ExecutionError::LockNotGranted);
        }
        self.table_info = Some(
            self.ctx
                .catalog
                .table(oid)
                .ok_or(ExecutionError::UnknownTable(oid))?,
        );
        self.indexes = self.ctx.catalog.table_indexes(oid);
        self.done = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>, ExecutionError> {
        if self.done {
            return Ok(None);
        }
        let table_info = self
            .table_info
            .as_ref()
            .ok_or(ExecutionError::UnknownTable(self.plan.table_oid))?
            .clone();
        let mut count: i64 = 0;
        while let Some((tuple, _)) = self.child.next()? {
            let meta = TupleMeta::new(self.ctx.txn.id());
            let inserted = table_info.table.insert_tuple(
                meta,
                tuple.clone(),
                Some((self.ctx.lock_manager.as_ref(), &self.ctx.txn)),
            )?;
            let Some(rid) = inserted else {
                return Err(ExecutionError::LockNotGranted);
            };
            // every index must accept the key before the row counts as
            // inserted; a duplicate aborts the statement with no summary row
            let mut keys = Vec::with_capacity(self.indexes.len());
            let mut all_indexed = true;
            for index_info in &self.indexes {
                let key = tuple.key_from_tuple(&index_info.key_attrs);
                if index_info.index.insert(key.clone(), rid)? {
                    keys.push(key);
                } else {
                    all_indexed = false;
                    break;
                }
            }
            if !all_indexed {
                self.done = true;
                return Ok(None);
            }
            self.ctx.txn.append_table_write_record(TableWriteRecord {
                oid: table_info.oid,
                rid,
                wtype: WType::Insert,
            });
            for (index_info, key) in self.indexes.iter().zip(keys) {
                self.ctx.txn.append_index_write_record(IndexWriteRecord {
                    oid: table_info.oid,
                    index_oid: index_info.index_oid,
                    rid,
                    key,
                    wtype: WType::Insert,
                });
            }
            count += 1;
        }
        self.done = true;
        Ok(Some((
            Tuple::new(vec![Value::Integer(count)]),
            Rid::new(INVALID_PAGE_ID, 0),
        )))
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
