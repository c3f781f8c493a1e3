// Rule-based plan rewrites, applied bottom-up. Each rule returns a new
// tree and leaves the input untouched.

pub mod nlj_as_hash_join;
pub mod sort_limit_as_topn;

use std::sync::Arc;

use crate::query::plan::PlanNode;

/// Run every rewrite rule over the plan.
pub fn optimize(plan: &Arc<PlanNode>) -> Arc<PlanNode> {
    let plan = nlj_as_hash_join::apply(plan);
    sort_limit_as_topn::apply(&plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::column::Column;
    use crate::catalog::schema::Schema;
    use crate::catalog::value::TypeId;
    use crate::query::expression::{CompareOp, Expression};
    use crate::query::plan::{
        JoinType, LimitPlan, NestedLoopJoinPlan, OrderByType, PlanNode, SeqScanPlan, SortPlan,
    };

    fn scan(oid: u32) -> Arc<PlanNode> {
        Arc::new(PlanNode::SeqScan(SeqScanPlan {
            table_oid: oid,
            output_schema: Schema::new(vec![Column::new("v", TypeId::Integer)]),
        }))
    }

    fn join_schema() -> Schema {
        Schema::new(vec![
            Column::new("l", TypeId::Integer),
            Column::new("r", TypeId::Integer),
        ])
    }

    #[test]
    fn test_single_equality_becomes_hash_join() {
        let predicate = Expression::compare(
            CompareOp::Equal,
            Expression::join_column(0, 0),
            Expression::join_column(1, 0),
        );
        let plan = Arc::new(PlanNode::NestedLoopJoin(NestedLoopJoinPlan {
            left: scan(1),
            right: scan(2),
            predicate,
            join_type: JoinType::Left,
            output_schema: join_schema(),
        }));
        let optimized = optimize(&plan);
        let PlanNode::HashJoin(hj) = optimized.as_ref() else {
            panic!("expected a hash join, got {:?}", optimized);
        };
        assert_eq!(hj.join_type, JoinType::Left);
        assert_eq!(hj.left_key_expressions.len(), 1);
        assert_eq!(hj.right_key_expressions.len(), 1);
    }

    #[test]
    fn test_conjunction_of_two_equalities_becomes_hash_join() {
        let eq = |l, r| {
            Expression::compare(
                CompareOp::Equal,
                Expression::join_column(0, l),
                Expression::join_column(1, r),
            )
        };
        // swapped sides in the second conjunct still extract correctly
        let swapped = Expression::compare(
            CompareOp::Equal,
            Expression::join_column(1, 0),
            Expression::join_column(0, 1),
        );
        let plan = Arc::new(PlanNode::NestedLoopJoin(NestedLoopJoinPlan {
            left: scan(1),
            right: scan(2),
            predicate: Expression::and(eq(0, 0), swapped),
            join_type: JoinType::Inner,
            output_schema: join_schema(),
        }));
        let optimized = optimize(&plan);
        let PlanNode::HashJoin(hj) = optimized.as_ref() else {
            panic!("expected a hash join");
        };
        assert_eq!(hj.left_key_expressions.len(), 2);
        assert_eq!(
            hj.left_key_expressions[1],
            Expression::column(1),
            "swapped conjunct must land its side-0 column in the left keys"
        );
    }

    #[test]
    fn test_non_equality_predicate_is_left_alone() {
        let predicate = Expression::compare(
            CompareOp::LessThan,
            Expression::join_column(0, 0),
            Expression::join_column(1, 0),
        );
        let plan = Arc::new(PlanNode::NestedLoopJoin(NestedLoopJoinPlan {
            left: scan(1),
            right: scan(2),
            predicate,
            join_type: JoinType::Inner,
            output_schema: join_schema(),
        }));
        let optimized = optimize(&plan);
        assert!(matches!(optimized.as_ref(), PlanNode::NestedLoopJoin(_)));
    }

    #[test]
    fn test_sort_limit_collapses_to_topn() {
        let schema = Schema::new(vec![Column::new("v", TypeId::Integer)]);
        let sort = Arc::new(PlanNode::Sort(SortPlan {
            child: scan(1),
            order_bys: vec![(OrderByType::Desc, Expression::column(0))],
            output_schema: schema.clone(),
        }));
        let plan = Arc::new(PlanNode::Limit(LimitPlan {
            child: sort,
            limit: 3,
            output_schema: schema,
        }));
        let optimized = optimize(&plan);
        let PlanNode::TopN(topn) = optimized.as_ref() else {
            panic!("expected a top-n");
        };
        assert_eq!(topn.n, 3);
        assert_eq!(topn.order_bys.len(), 1);
        assert!(matches!(topn.child.as_ref(), PlanNode::SeqScan(_)));
    }

    #[test]
    fn test_limit_over_non_sort_is_left_alone() {
        let schema = Schema::new(vec![Column::new("v", TypeId::Integer)]);
        let plan = Arc::new(PlanNode::Limit(LimitPlan {
            child: scan(1),
            limit: 3,
            output_schema: schema,
        }));
        let optimized = optimize(&plan);
        assert!(matches!(optimized.as_ref(), PlanNode::Limit(_)));
    }
}
