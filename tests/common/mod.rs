use std::sync::Arc;

use anyhow::Result;
use tempfile::NamedTempFile;

use tarndb::catalog::{Catalog, Column, Schema, TableInfo, TypeId, Value};
use tarndb::query::executor::{build_executor, ExecutorContext};
use tarndb::query::plan::{InsertPlan, PlanNode, SeqScanPlan, ValuesPlan};
use tarndb::storage::buffer::BufferPoolManager;
use tarndb::transaction::{IsolationLevel, LockManager, Transaction, TransactionManager};

// Create a temporary database file for testing
#[allow(dead_code)]
pub fn create_temp_db_file() -> Result<NamedTempFile> {
    Ok(NamedTempFile::new()?)
}

// Create a buffer pool manager with a temporary database
#[allow(dead_code)]
pub fn create_test_buffer_pool(pool_size: usize) -> Result<(Arc<BufferPoolManager>, NamedTempFile)> {
    let file = create_temp_db_file()?;
    let buffer_pool = Arc::new(BufferPoolManager::new(pool_size, file.path(), 2)?);
    Ok((buffer_pool, file))
}

/// Fully wired engine instance over a temporary file
#[allow(dead_code)]
pub struct TestDb {
    pub buffer_pool: Arc<BufferPoolManager>,
    pub catalog: Arc<Catalog>,
    pub lock_manager: Arc<LockManager>,
    pub txn_manager: Arc<TransactionManager>,
    _file: NamedTempFile,
}

#[allow(dead_code)]
pub fn create_test_db(pool_size: usize) -> Result<TestDb> {
    let file = create_temp_db_file()?;
    let buffer_pool = Arc::new(BufferPoolManager::new(pool_size, file.path(), 2)?);
    let catalog = Arc::new(Catalog::new(buffer_pool.clone()));
    let lock_manager = Arc::new(LockManager::new());
    let txn_manager = Arc::new(TransactionManager::new(
        lock_manager.clone(),
        catalog.clone(),
    ));
    Ok(TestDb {
        buffer_pool,
        catalog,
        lock_manager,
        txn_manager,
        _file: file,
    })
}

#[allow(dead_code)]
pub fn accounts_schema() -> Schema {
    Schema::new(vec![
        Column::new("id", TypeId::Integer),
        Column::new("name", TypeId::Varchar),
        Column::new("balance", TypeId::Integer),
    ])
}

#[allow(dead_code)]
pub fn account_row(id: i64, name: &str, balance: i64) -> Vec<Value> {
    vec![
        Value::Integer(id),
        Value::Varchar(name.to_string()),
        Value::Integer(balance),
    ]
}

/// Create the accounts table (and optionally an index on id) in the
/// catalog.
#[allow(dead_code)]
pub fn create_accounts_table(db: &TestDb, with_index: bool) -> Result<Arc<TableInfo>> {
    let info = db.catalog.create_table("accounts", accounts_schema());
    if with_index {
        db.catalog
            .create_index("accounts_id_idx", "accounts", vec![0], 4, 4)?;
    }
    Ok(info)
}

#[allow(dead_code)]
pub fn executor_context(db: &TestDb, txn: &Arc<Transaction>) -> ExecutorContext {
    ExecutorContext::new(db.catalog.clone(), db.lock_manager.clone(), txn.clone())
}

#[allow(dead_code)]
pub fn values_plan(schema: Schema, rows: Vec<Vec<Value>>) -> Arc<PlanNode> {
    Arc::new(PlanNode::Values(ValuesPlan {
        rows,
        output_schema: schema,
    }))
}

#[allow(dead_code)]
pub fn seq_scan_plan(table: &TableInfo) -> Arc<PlanNode> {
    Arc::new(PlanNode::SeqScan(SeqScanPlan {
        table_oid: table.oid,
        output_schema: table.schema.clone(),
    }))
}

#[allow(dead_code)]
pub fn count_schema() -> Schema {
    Schema::new(vec![Column::new("count", TypeId::Integer)])
}

/// Insert rows through the executor pipeline under a fresh committed
/// transaction, so heaps and indexes stay consistent.
#[allow(dead_code)]
pub fn insert_rows(db: &TestDb, table: &TableInfo, rows: Vec<Vec<Value>>) -> Result<i64> {
    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);
    let plan = Arc::new(PlanNode::Insert(InsertPlan {
        table_oid: table.oid,
        child: values_plan(table.schema.clone(), rows),
        output_schema: count_schema(),
    }));
    let ctx = executor_context(db, &txn);
    let mut executor = build_executor(&plan, &ctx).map_err(|e| anyhow::anyhow!("{e}"))?;
    executor.init().map_err(|e| anyhow::anyhow!("{e}"))?;
    let row = executor
        .next()
        .map_err(|e| anyhow::anyhow!("{e}"))?
        .expect("insert emits a summary row");
    db.txn_manager.commit(&txn);
    match row.0.value(0) {
        Value::Integer(n) => Ok(*n),
        other => anyhow::bail!("unexpected summary value {:?}", other),
    }
}

/// Run a read-only plan to completion under the given transaction.
#[allow(dead_code)]
pub fn collect_rows(
    db: &TestDb,
    txn: &Arc<Transaction>,
    plan: &Arc<PlanNode>,
) -> Result<Vec<Vec<Value>>> {
    let ctx = executor_context(db, txn);
    let mut executor = build_executor(plan, &ctx).map_err(|e| anyhow::anyhow!("{e}"))?;
    executor.init().map_err(|e| anyhow::anyhow!("{e}"))?;
    let mut rows = Vec::new();
    while let Some((tuple, _)) = executor.next().map_err(|e| anyhow::anyhow!("{e}"))? {
        rows.push(tuple.values);
    }
    Ok(rows)
}
