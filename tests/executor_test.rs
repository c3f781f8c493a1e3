use std::sync::Arc;

use anyhow::Result;

use tarndb::catalog::{Column, Schema, TupleMeta, TypeId, Value};
use tarndb::query::executor::build_executor;
use tarndb::query::expression::{CompareOp, Expression};
use tarndb::query::plan::{
    AggregationPlan, AggregationType, DeletePlan, HashJoinPlan, IndexScanPlan, JoinType,
    LimitPlan, NestedLoopJoinPlan, OrderByType, PlanNode, SortPlan, TopNPlan, UpdatePlan,
};
use tarndb::transaction::IsolationLevel;

mod common;
use common::{
    account_row, collect_rows, count_schema, create_accounts_table, create_test_db,
    executor_context, insert_rows, seq_scan_plan, values_plan,
};

fn int(n: i64) -> Value {
    Value::Integer(n)
}

#[test]
fn test_seq_scan_returns_live_rows() -> Result<()> {
    let db = create_test_db(32)?;
    let table = create_accounts_table(&db, false)?;
    insert_rows(
        &db,
        &table,
        vec![
            account_row(1, "alice", 100),
            account_row(2, "bob", 200),
            account_row(3, "carol", 300),
        ],
    )?;

    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);
    let rows = collect_rows(&db, &txn, &seq_scan_plan(&table))?;
    assert_eq!(rows.len(), 3);
    db.txn_manager.commit(&txn);
    Ok(())
}

#[test]
fn test_seq_scan_skips_tombstones() -> Result<()> {
    let db = create_test_db(32)?;
    let table = create_accounts_table(&db, false)?;
    insert_rows(&db, &table, vec![account_row(1, "a", 1), account_row(2, "b", 2)])?;

    let rid = table.table.scan_rids()[0];
    let meta = table.table.tuple_meta(rid).unwrap();
    table
        .table
        .update_tuple_meta(TupleMeta { is_deleted: true, ..meta }, rid);

    let txn = db.txn_manager.begin(IsolationLevel::ReadCommitted);
    let rows = collect_rows(&db, &txn, &seq_scan_plan(&table))?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], int(2));
    db.txn_manager.commit(&txn);
    Ok(())
}

#[test]
fn test_delete_executor_counts_and_tombstones() -> Result<()> {
    let db = create_test_db(32)?;
    let table = create_accounts_table(&db, false)?;
    insert_rows(&db, &table, vec![account_row(1, "a", 1), account_row(2, "b", 2)])?;

    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);
    let plan = Arc::new(PlanNode::Delete(DeletePlan {
        table_oid: table.oid,
        child: seq_scan_plan(&table),
        output_schema: count_schema(),
    }));
    let rows = collect_rows(&db, &txn, &plan)?;
    assert_eq!(rows, vec![vec![int(2)]]);
    db.txn_manager.commit(&txn);

    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);
    assert!(collect_rows(&db, &txn, &seq_scan_plan(&table))?.is_empty());
    db.txn_manager.commit(&txn);
    Ok(())
}

#[test]
fn test_update_executor_rewrites_rows() -> Result<()> {
    let db = create_test_db(32)?;
    let table = create_accounts_table(&db, false)?;
    insert_rows(&db, &table, vec![account_row(1, "a", 100), account_row(2, "b", 200)])?;

    // UPDATE accounts SET balance = 0 (identity on id and name)
    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);
    let plan = Arc::new(PlanNode::Update(UpdatePlan {
        table_oid: table.oid,
        child: seq_scan_plan(&table),
        target_expressions: vec![
            Expression::column(0),
            Expression::column(1),
            Expression::constant(int(0)),
        ],
        output_schema: count_schema(),
    }));
    let rows = collect_rows(&db, &txn, &plan)?;
    assert_eq!(rows, vec![vec![int(2)]]);
    db.txn_manager.commit(&txn);

    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);
    let rows = collect_rows(&db, &txn, &seq_scan_plan(&table))?;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r[2] == int(0)));
    db.txn_manager.commit(&txn);
    Ok(())
}

fn users_schema() -> Schema {
    Schema::new(vec![
        Column::new("id", TypeId::Integer),
        Column::new("name", TypeId::Varchar),
    ])
}

fn orders_schema() -> Schema {
    Schema::new(vec![
        Column::new("user_id", TypeId::Integer),
        Column::new("order_id", TypeId::Integer),
    ])
}

fn joined_schema() -> Schema {
    Schema::new(vec![
        Column::new("id", TypeId::Integer),
        Column::new("name", TypeId::Varchar),
        Column::new("user_id", TypeId::Integer),
        Column::new("order_id", TypeId::Integer),
    ])
}

fn users_rows() -> Vec<Vec<Value>> {
    vec![
        vec![int(1), Value::Varchar("alice".into())],
        vec![int(2), Value::Varchar("bob".into())],
        vec![int(3), Value::Varchar("carol".into())],
    ]
}

fn orders_rows() -> Vec<Vec<Value>> {
    vec![vec![int(1), int(101)], vec![int(2), int(102)], vec![int(1), int(103)]]
}

#[test]
fn test_nested_loop_join_inner() -> Result<()> {
    let db = create_test_db(16)?;
    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);

    let plan = Arc::new(PlanNode::NestedLoopJoin(NestedLoopJoinPlan {
        left: values_plan(users_schema(), users_rows()),
        right: values_plan(orders_schema(), orders_rows()),
        predicate: Expression::compare(
            CompareOp::Equal,
            Expression::join_column(0, 0),
            Expression::join_column(1, 0),
        ),
        join_type: JoinType::Inner,
        output_schema: joined_schema(),
    }));
    let rows = collect_rows(&db, &txn, &plan)?;
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r[0] == r[2]));
    db.txn_manager.commit(&txn);
    Ok(())
}

#[test]
fn test_nested_loop_join_left_pads_with_nulls() -> Result<()> {
    let db = create_test_db(16)?;
    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);

    let plan = Arc::new(PlanNode::NestedLoopJoin(NestedLoopJoinPlan {
        left: values_plan(users_schema(), users_rows()),
        right: values_plan(orders_schema(), orders_rows()),
        predicate: Expression::compare(
            CompareOp::Equal,
            Expression::join_column(0, 0),
            Expression::join_column(1, 0),
        ),
        join_type: JoinType::Left,
        output_schema: joined_schema(),
    }));
    let rows = collect_rows(&db, &txn, &plan)?;
    assert_eq!(rows.len(), 4, "carol must appear once, padded");

    let carol: Vec<_> = rows.iter().filter(|r| r[0] == int(3)).collect();
    assert_eq!(carol.len(), 1);
    assert!(carol[0][2].is_null());
    assert!(carol[0][3].is_null());
    db.txn_manager.commit(&txn);
    Ok(())
}

#[test]
fn test_hash_join_matches_nested_loop() -> Result<()> {
    let db = create_test_db(16)?;
    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);

    let plan = Arc::new(PlanNode::HashJoin(HashJoinPlan {
        left: values_plan(users_schema(), users_rows()),
        right: values_plan(orders_schema(), orders_rows()),
        left_key_expressions: vec![Expression::column(0)],
        right_key_expressions: vec![Expression::column(0)],
        join_type: JoinType::Inner,
        output_schema: joined_schema(),
    }));
    let mut rows = collect_rows(&db, &txn, &plan)?;
    assert_eq!(rows.len(), 3);
    rows.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
    assert!(rows.iter().all(|r| r[0] == r[2]));
    db.txn_manager.commit(&txn);
    Ok(())
}

#[test]
fn test_hash_join_left_pads_with_nulls() -> Result<()> {
    let db = create_test_db(16)?;
    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);

    let plan = Arc::new(PlanNode::HashJoin(HashJoinPlan {
        left: values_plan(users_schema(), users_rows()),
        right: values_plan(orders_schema(), orders_rows()),
        left_key_expressions: vec![Expression::column(0)],
        right_key_expressions: vec![Expression::column(0)],
        join_type: JoinType::Left,
        output_schema: joined_schema(),
    }));
    let rows = collect_rows(&db, &txn, &plan)?;
    assert_eq!(rows.len(), 4);
    let carol: Vec<_> = rows.iter().filter(|r| r[0] == int(3)).collect();
    assert_eq!(carol.len(), 1);
    assert!(carol[0][2].is_null());
    db.txn_manager.commit(&txn);
    Ok(())
}

#[test]
fn test_aggregation_with_group_by() -> Result<()> {
    let db = create_test_db(16)?;
    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);

    let schema = Schema::new(vec![
        Column::new("grp", TypeId::Integer),
        Column::new("v", TypeId::Integer),
    ]);
    let rows = vec![
        vec![int(1), int(10)],
        vec![int(1), int(20)],
        vec![int(2), int(5)],
    ];
    let out_schema = Schema::new(vec![
        Column::new("grp", TypeId::Integer),
        Column::new("cnt", TypeId::Integer),
        Column::new("sum", TypeId::Integer),
        Column::new("min", TypeId::Integer),
        Column::new("max", TypeId::Integer),
    ]);
    let plan = Arc::new(PlanNode::Aggregation(AggregationPlan {
        child: values_plan(schema, rows),
        group_bys: vec![Expression::column(0)],
        aggregates: vec![
            (AggregationType::CountStar, Expression::column(0)),
            (AggregationType::Sum, Expression::column(1)),
            (AggregationType::Min, Expression::column(1)),
            (AggregationType::Max, Expression::column(1)),
        ],
        output_schema: out_schema,
    }));
    let mut rows = collect_rows(&db, &txn, &plan)?;
    rows.sort_by(|a, b| a[0].total_cmp(&b[0]));
    assert_eq!(
        rows,
        vec![
            vec![int(1), int(2), int(30), int(10), int(20)],
            vec![int(2), int(1), int(5), int(5), int(5)],
        ]
    );
    db.txn_manager.commit(&txn);
    Ok(())
}

#[test]
fn test_aggregation_empty_input_emits_initial_row() -> Result<()> {
    let db = create_test_db(16)?;
    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);

    let schema = Schema::new(vec![Column::new("v", TypeId::Integer)]);
    let out_schema = Schema::new(vec![
        Column::new("cnt", TypeId::Integer),
        Column::new("sum", TypeId::Integer),
    ]);
    let plan = Arc::new(PlanNode::Aggregation(AggregationPlan {
        child: values_plan(schema, Vec::new()),
        group_bys: Vec::new(),
        aggregates: vec![
            (AggregationType::CountStar, Expression::column(0)),
            (AggregationType::Sum, Expression::column(0)),
        ],
        output_schema: out_schema,
    }));
    let rows = collect_rows(&db, &txn, &plan)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], int(0));
    assert!(rows[0][1].is_null());
    db.txn_manager.commit(&txn);
    Ok(())
}

fn sortable_plan() -> (Arc<PlanNode>, Schema) {
    let schema = Schema::new(vec![
        Column::new("id", TypeId::Integer),
        Column::new("v", TypeId::Integer),
    ]);
    let rows = vec![
        vec![int(1), int(30)],
        vec![int(2), int(10)],
        vec![int(3), int(20)],
        vec![int(4), int(10)],
    ];
    (values_plan(schema.clone(), rows), schema)
}

#[test]
fn test_sort_orders_with_directions() -> Result<()> {
    let db = create_test_db(16)?;
    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);

    let (child, schema) = sortable_plan();
    // ORDER BY v ASC, id DESC
    let plan = Arc::new(PlanNode::Sort(SortPlan {
        child,
        order_bys: vec![
            (OrderByType::Asc, Expression::column(1)),
            (OrderByType::Desc, Expression::column(0)),
        ],
        output_schema: schema,
    }));
    let rows = collect_rows(&db, &txn, &plan)?;
    let ids: Vec<&Value> = rows.iter().map(|r| &r[0]).collect();
    assert_eq!(ids, vec![&int(4), &int(2), &int(3), &int(1)]);
    db.txn_manager.commit(&txn);
    Ok(())
}

#[test]
fn test_topn_keeps_the_n_best() -> Result<()> {
    let db = create_test_db(16)?;
    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);

    let (child, schema) = sortable_plan();
    // top 2 by v descending
    let plan = Arc::new(PlanNode::TopN(TopNPlan {
        child,
        order_bys: vec![(OrderByType::Desc, Expression::column(1))],
        n: 2,
        output_schema: schema,
    }));
    let rows = collect_rows(&db, &txn, &plan)?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][1], int(30));
    assert_eq!(rows[1][1], int(20));
    db.txn_manager.commit(&txn);
    Ok(())
}

#[test]
fn test_limit_truncates() -> Result<()> {
    let db = create_test_db(16)?;
    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);

    let (child, schema) = sortable_plan();
    let plan = Arc::new(PlanNode::Limit(LimitPlan {
        child,
        limit: 3,
        output_schema: schema,
    }));
    let rows = collect_rows(&db, &txn, &plan)?;
    assert_eq!(rows.len(), 3);
    db.txn_manager.commit(&txn);
    Ok(())
}

#[test]
fn test_index_scan_is_key_ordered_and_skips_tombstones() -> Result<()> {
    let db = create_test_db(32)?;
    let table = create_accounts_table(&db, true)?;
    // inserted out of key order
    insert_rows(
        &db,
        &table,
        vec![
            account_row(3, "carol", 300),
            account_row(1, "alice", 100),
            account_row(2, "bob", 200),
        ],
    )?;
    let index = db.catalog.table_indexes(table.oid).pop().unwrap();

    // tombstone bob behind the index's back: the scan must skip him
    let bob_rid = table.table.scan_rids()[2];
    let meta = table.table.tuple_meta(bob_rid).unwrap();
    table
        .table
        .update_tuple_meta(TupleMeta { is_deleted: true, ..meta }, bob_rid);

    let txn = db.txn_manager.begin(IsolationLevel::RepeatableRead);
    let plan = Arc::new(PlanNode::IndexScan(IndexScanPlan {
        index_oid: index.index_oid,
        table_oid: table.oid,
        output_schema: table.schema.clone(),
    }));
    let rows = collect_rows(&db, &txn, &plan)?;
    let ids: Vec<&Value> = rows.iter().map(|r| &r[0]).collect();
    assert_eq!(ids, vec![&int(1), &int(3)]);
    db.txn_manager.commit(&txn);
    Ok(())
}
