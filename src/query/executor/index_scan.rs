use std::sync::Arc;

use crate::catalog::schema::Schema;
use crate::catalog::tuple::{KeyTuple, Tuple};
use crate::catalog::TableInfo;
use crate::common::types::Rid;
use crate::index::btree::BPlusTreeIter;
use crate::query::executor::{ExecutionError, Executor, ExecutorContext};
use crate::query::plan::IndexScanPlan;

/// Ordered scan over a B+ tree index, fetching each referenced tuple
/// through the table heap and skipping tombstoned rows.
pub struct IndexScanExecutor {
    plan: IndexScanPlan,
    ctx: ExecutorContext,
    table_info: Option<Arc<TableInfo>>,
    iter: Option<BPlusTreeIter<KeyTuple>>,
}

impl IndexScanExecutor {
    pub fn new(plan: IndexScanPlan, ctx: ExecutorContext) -> Self {
        Self {
            plan,
            ctx,
            table_info: None,
            iter: None,
        }
    }
}

impl Executor for IndexScanExecutor {
    fn init(&mut self) -> Result<(), ExecutionError> {
        let index_info = self
            .ctx
            .catalog
            .index(self.plan.index_oid)
            .ok_or(ExecutionError::UnknownIndex(self.plan.index_oid))?;
        let table_info = self
            .ctx
            .catalog
            .table(self.plan.table_oid)
            .ok_or(ExecutionError::UnknownTable(self.plan.table_oid))?;
        self.iter = Some(index_info.index.iter()?);
        self.table_info = Some(table_info);
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>, ExecutionError> {
        let table_info = self
            .table_info
            .as_ref()
            .ok_or(ExecutionError::UnknownTable(self.plan.table_oid))?
            .clone();
        let Some(iter) = self.iter.as_mut() else {
            return Ok(None);
        };
        while let Some((_, rid)) = iter.next_entry()? {
            let Some((meta, tuple)) = table_info.table.get_tuple(rid) else {
                continue;
            };
            if meta.is_deleted {
                continue;
            }
            return Ok(Some((tuple, rid)));
        }
        Ok(None)
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
