use std::sync::Arc;

use crate::catalog::schema::Schema;
use crate::catalog::value::Value;
use crate::catalog::IndexOid;
use crate::common::types::TableOid;
use crate::query::expression::Expression;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderByType {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationType {
    CountStar,
    Count,
    Sum,
    Min,
    Max,
}

#[derive(Debug, Clone)]
pub struct SeqScanPlan {
    pub table_oid: TableOid,
    pub output_schema: Schema,
}

#[derive(Debug, Clone)]
pub struct IndexScanPlan {
    pub index_oid: IndexOid,
    pub table_oid: TableOid,
    pub output_schema: Schema,
}

#[derive(Debug, Clone)]
pub struct ValuesPlan {
    pub rows: Vec<Vec<Value>>,
    pub output_schema: Schema,
}

#[derive(Debug, Clone)]
pub struct InsertPlan {
    pub table_oid: TableOid,
    pub child: Arc<PlanNode>,
    pub output_schema: Schema,
}

#[derive(Debug, Clone)]
pub struct DeletePlan {
    pub table_oid: TableOid,
    pub child: Arc<PlanNode>,
    pub output_schema: Schema,
}

#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub table_oid: TableOid,
    pub child: Arc<PlanNode>,
    pub target_expressions: Vec<Expression>,
    pub output_schema: Schema,
}

#[derive(Debug, Clone)]
pub struct NestedLoopJoinPlan {
    pub left: Arc<PlanNode>,
    pub right: Arc<PlanNode>,
    pub predicate: Expression,
    pub join_type: JoinType,
    pub output_schema: Schema,
}

#[derive(Debug, Clone)]
pub struct HashJoinPlan {
    pub left: Arc<PlanNode>,
    pub right: Arc<PlanNode>,
    pub left_key_expressions: Vec<Expression>,
    pub right_key_expressions: Vec<Expression>,
    pub join_type: JoinType,
    pub output_schema: Schema,
}

#[derive(Debug, Clone)]
pub struct AggregationPlan {
    pub child: Arc<PlanNode>,
    pub group_bys: Vec<Expression>,
    pub aggregates: Vec<(AggregationType, Expression)>,
    pub output_schema: Schema,
}

#[derive(Debug, Clone)]
pub struct SortPlan {
    pub child: Arc<PlanNode>,
    pub order_bys: Vec<(OrderByType, Expression)>,
    pub output_schema: Schema,
}

#[derive(Debug, Clone)]
pub struct LimitPlan {
    pub child: Arc<PlanNode>,
    pub limit: usize,
    pub output_schema: Schema,
}

#[derive(Debug, Clone)]
pub struct TopNPlan {
    pub child: Arc<PlanNode>,
    pub order_bys: Vec<(OrderByType, Expression)>,
    pub n: usize,
    pub output_schema: Schema,
}

/// Physical plan tree. Children are shared so optimizer rules can rebuild
/// trees without copying whole subplans.
#[derive(Debug, Clone)]
pub enum PlanNode {
    SeqScan(SeqScanPlan),
    IndexScan(IndexScanPlan),
    Values(ValuesPlan),
    Insert(InsertPlan),
    Delete(DeletePlan),
    Update(UpdatePlan),
    NestedLoopJoin(NestedLoopJoinPlan),
    HashJoin(HashJoinPlan),
    Aggregation(AggregationPlan),
    Sort(SortPlan),
    Limit(LimitPlan),
    TopN(TopNPlan),
}

impl PlanNode {
    pub fn output_schema(&self) -> &Schema {
        match self {
            PlanNode::SeqScan(p) => &p.output_schema,
            PlanNode::IndexScan(p) => &p.output_schema,
            PlanNode::Values(p) => &p.output_schema,
            PlanNode::Insert(p) => &p.output_schema,
            PlanNode::Delete(p) => &p.output_schema,
            PlanNode::Update(p) => &p.output_schema,
            PlanNode::NestedLoopJoin(p) => &p.output_schema,
            PlanNode::HashJoin(p) => &p.output_schema,
            PlanNode::Aggregation(p) => &p.output_schema,
            PlanNode::Sort(p) => &p.output_schema,
            PlanNode::Limit(p) => &p.output_schema,
            PlanNode::TopN(p) => &p.output_schema,
        }
    }

    pub fn children(&self) -> Vec<Arc<PlanNode>> {
        match self {
            PlanNode::SeqScan(_) | PlanNode::IndexScan(_) | PlanNode::Values(_) => Vec::new(),
            PlanNode::Insert(p) => vec![p.child.clone()],
            PlanNode::Delete(p) => vec![p.child.clone()],
            PlanNode::Update(p) => vec![p.child.clone()],
            PlanNode::NestedLoopJoin(p) => vec![p.left.clone(), p.right.clone()],
            PlanNode::HashJoin(p) => vec![p.left.clone(), p.right.clone()],
            PlanNode::Aggregation(p) => vec![p.child.clone()],
            PlanNode::Sort(p) => vec![p.child.clone()],
            PlanNode::Limit(p) => vec![p.child.clone()],
            PlanNode::TopN(p) => vec![p.child.clone()],
        }
    }

    /// Rebuild this node over new children (same arity as `children()`).
    pub fn with_children(&self, children: Vec<Arc<PlanNode>>) -> PlanNode {
        let take = |idx: usize| children[idx].clone();
        match self {
            PlanNode::SeqScan(_) | PlanNode::IndexScan(_) | PlanNode::Values(_) => self.clone(),
            PlanNode::Insert(p) => PlanNode::Insert(InsertPlan {
                child: take(0),
                ..p.clone()
            }),
            PlanNode::Delete(p) => PlanNode::Delete(DeletePlan {
                child: take(0),
                ..p.clone()
            }),
            PlanNode::Update(p) => PlanNode::Update(UpdatePlan {
                child: take(0),
                ..p.clone()
            }),
            PlanNode::NestedLoopJoin(p) => PlanNode::NestedLoopJoin(NestedLoopJoinPlan {
                left: take(0),
                right: take(1),
                ..p.clone()
            }),
            PlanNode::HashJoin(p) => PlanNode::HashJoin(HashJoinPlan {
                left: take(0),
                right: take(1),
                ..p.clone()
            }),
            PlanNode::Aggregation(p) => PlanNode::Aggregation(AggregationPlan {
                child: take(0),
                ..p.clone()
            }),
            PlanNode::Sort(p) => PlanNode::Sort(SortPlan {
                child: take(0),
                ..p.clone()
            }),
            PlanNode::Limit(p) => PlanNode::Limit(LimitPlan {
                child: take(0),
                ..p.clone()
            }),
            PlanNode::TopN(p) => PlanNode::TopN(TopNPlan {
                child: take(0),
                ..p.clone()
            }),
        }
    }
}
