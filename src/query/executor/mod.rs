// Pull-based execution operators.
//
// Every operator implements the same two-phase contract: `init` primes
// state (and takes whatever locks the operator needs), `next` yields one
// row at a time until exhaustion.

pub mod aggregation;
pub mod delete;
pub mod hash_join;
pub mod index_scan;
pub mod insert;
pub mod limit;
pub mod nested_loop_join;
pub mod seq_scan;
pub mod sort;
pub mod topn;
pub mod update;
pub mod values;

use std::sync::Arc;

use thiserror::Error;

use crate::catalog::schema::Schema;
use crate::catalog::tuple::Tuple;
use crate::catalog::{Catalog, IndexOid};
use crate::common::types::{Rid, TableOid};
use crate::index::btree::BTreeError;
use crate::query::plan::PlanNode;
use crate::transaction::lock_manager::LockManager;
use crate::transaction::transaction::{Transaction, TransactionAbortError};

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("transaction aborted: {0}")]
    TransactionAbort(#[from] TransactionAbortError),

    #[error("lock was not granted")]
    LockNotGranted,

    #[error("index error: {0}")]
    Index(#[from] BTreeError),

    #[error("unknown table oid {0}")]
    UnknownTable(TableOid),

    #[error("unknown index oid {0}")]
    UnknownIndex(IndexOid),
}

/// Everything an operator needs from its surroundings. `is_delete` tells
/// scans feeding a delete/update pipeline to take exclusive locks.
#[derive(Clone)]
pub struct ExecutorContext {
    pub catalog: Arc<Catalog>,
    pub lock_manager: Arc<LockManager>,
    pub txn: Arc<Transaction>,
    pub is_delete: bool,
}

impl ExecutorContext {
    pub fn new(catalog: Arc<Catalog>, lock_manager: Arc<LockManager>, txn: Arc<Transaction>) -> Self {
        Self {
            catalog,
            lock_manager,
            txn,
            is_delete: false,
        }
    }

    pub fn for_delete(&self) -> Self {
        let mut ctx = self.clone();
        ctx.is_delete = true;
        ctx
    }
}

/// The iterator-model operator interface
pub trait Executor: Send {
    fn init(&mut self) -> Result<(), ExecutionError>;
    fn next(&mut self) -> Result<Option<(Tuple, Rid)>, ExecutionError>;
    fn output_schema(&self) -> &Schema;
}

/// Build the executor tree for a physical plan, bottom-up.
pub fn build_executor(
    plan: &PlanNode,
    ctx: &ExecutorContext,
) -> Result<Box<dyn Executor>, ExecutionError> {
    Ok(match plan {
        PlanNode::SeqScan(p) => Box::new(seq_scan::SeqScanExecutor::new(p.clone(), ctx.clone())),
        PlanNode::IndexScan(p) => {
            Box::new(index_scan::IndexScanExecutor::new(p.clone(), ctx.clone()))
        }
        PlanNode::Values(p) => Box::new(values::ValuesExecutor::new(p.clone())),
        PlanNode::Insert(p) => {
            let child = build_executor(&p.child, ctx)?;
            Box::new(insert::InsertExecutor::new(p.clone(), child, ctx.clone()))
        }
        PlanNode::Delete(p) => {
            let delete_ctx = ctx.for_delete();
            let child = build_executor(&p.child, &delete_ctx)?;
            Box::new(delete::DeleteExecutor::new(p.clone(), child, delete_ctx))
        }
        PlanNode::Update(p) => {
            let update_ctx = ctx.for_delete();
            let child = build_executor(&p.child, &update_ctx)?;
            Box::new(update::UpdateExecutor::new(p.clone(), child, update_ctx))
        }
        PlanNode::NestedLoopJoin(p) => {
            let left = build_executor(&p.left, ctx)?;
            let right = build_executor(&p.right, ctx)?;
            Box::new(nested_loop_join::NestedLoopJoinExecutor::new(
                p.clone(),
                left,
                right,
            ))
        }
        PlanNode::HashJoin(p) => {
            let left = build_executor(&p.left, ctx)?;
            let right = build_executor(&p.right, ctx)?;
            Box::new(hash_join::HashJoinExecutor::new(p.clone(), left, right))
        }
        PlanNode::Aggregation(p) => {
            let child = build_executor(&p.child, ctx)?;
            Box::new(aggregation::AggregationExecutor::new(p.clone(), child))
        }
        PlanNode::Sort(p) => {
            let child = build_executor(&p.child, ctx)?;
            Box::new(sort::SortExecutor::new(p.clone(), child))
        }
        PlanNode::Limit(p) => {
            let child = build_executor(&p.child, ctx)?;
            Box::new(limit::LimitExecutor::new(p.clone(), child))
        }
        PlanNode::TopN(p) => {
            let child = build_executor(&p.child, ctx)?;
            Box::new(topn::TopNExecutor::new(p.clone(), child))
        }
    })
}
