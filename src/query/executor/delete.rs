use std::sync::Arc;

use crate::catalog::schema::Schema;
use crate::catalog::tuple::{Tuple, TupleMeta};
use crate::catalog::value::Value;
use crate::catalog::{IndexInfo, TableInfo};
use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::query::executor::{ExecutionError, Executor, ExecutorContext};
use crate::query::plan::DeletePlan;
use crate::transaction::transaction::{IndexWriteRecord, TableWriteRecord, WType};

/// Marks each child row's tuple-meta deleted, removes its index entries,
/// and records the undo. Emits one summary row with the count.
pub struct DeleteExecutor {
    plan: DeletePlan,
    child: Box<dyn Executor>,
    ctx: ExecutorContext,
    table_info: Option<Arc<TableInfo>>,
    indexes: Vec<Arc<IndexInfo>>,
    done: bool,
}

impl DeleteExecutor {
    pub fn new(plan: DeletePlan, child: Box<dyn Executor>, ctx: ExecutorContext) -> Self {
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

impl Executor for DeleteExecutor {
    fn init(&mut self) -> Result<(), ExecutionError> {
        self.child.init()?;
        let oid = self.plan.table_oid;
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
        while let Some((tuple, rid)) = self.child.next()? {
            let Some(meta) = table_info.table.tuple_meta(rid) else {
                continue;
            };
            let tombstone = TupleMeta {
                is_deleted: true,
                ..meta
            };
            table_info.table.update_tuple_meta(tombstone, rid);
            self.ctx.txn.append_table_write_record(TableWriteRecord {
                oid: table_info.oid,
                rid,
                wtype: WType::Delete,
            });
            for index_info in &self.indexes {
                let key = tuple.key_from_tuple(&index_info.key_attrs);
                index_info.index.remove(&key)?;
                self.ctx.txn.append_index_write_record(IndexWriteRecord {
                    oid: table_info.oid,
                    index_oid: index_info.index_oid,
                    rid,
                    key,
                    wtype: WType::Delete,
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
