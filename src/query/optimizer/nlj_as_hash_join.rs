use std::sync::Arc;

use crate::query::expression::{CompareOp, Expression};
use crate::query::plan::{HashJoinPlan, PlanNode};

/// Pull the (left, right) key pair out of a column-equality comparison
/// whose sides come from different join inputs.
fn column_equality(expr: &Expression) -> Option<(Expression, Expression)> {
    let Expression::Compare {
        op: CompareOp::Equal,
        left,
        right,
    } = expr
    else {
        return None;
    };
    let (Expression::ColumnRef { side: s0, col_idx: c0 }, Expression::ColumnRef { side: s1, col_idx: c1 }) =
        (left.as_ref(), right.as_ref())
    else {
        return None;
    };
    if s0 == s1 {
        return None;
    }
    if *s0 == 0 {
        Some((Expression::column(*c0), Expression::column(*c1)))
    } else {
        Some((Expression::column(*c1), Expression::column(*c0)))
    }
}

/// Rewrite nested-loop joins whose predicate is one column equality, or a
/// conjunction of two, into hash joins keyed on the extracted columns.
pub fn apply(plan: &Arc<PlanNode>) -> Arc<PlanNode> {
    let children: Vec<Arc<PlanNode>> = plan.children().iter().map(apply).collect();
    let rebuilt = plan.with_children(children);

    let PlanNode::NestedLoopJoin(ref nlj) = rebuilt else {
        return Arc::new(rebuilt);
    };

    let mut left_keys = Vec::new();
    let mut right_keys = Vec::new();
    let mut extracted = false;

    if let Some((l, r)) = column_equality(&nlj.predicate) {
        left_keys.push(l);
        right_keys.push(r);
        extracted = true;
    } else if let Expression::And { left, right } = &nlj.predicate {
        if let (Some((l0, r0)), Some((l1, r1))) = (column_equality(left), column_equality(right)) {
            left_keys.extend([l0, l1]);
            right_keys.extend([r0, r1]);
            extracted = true;
        }
    }

    if !extracted {
        return Arc::new(rebuilt);
    }
    Arc::new(PlanNode::HashJoin(HashJoinPlan {
        left: nlj.left.clone(),
        right: nlj.right.clone(),
        left_key_expressions: left_keys,
        right_key_expressions: right_keys,
        join_type: nlj.join_type,
        output_schema: nlj.output_schema.clone(),
    }))
}
