use std::sync::Arc;

use crate::query::plan::{PlanNode, TopNPlan};

/// Rewrite a limit whose sole child is a sort into a bounded top-n,
/// carrying the sort's order-by list and the limit's N.
pub fn apply(plan: &Arc<PlanNode>) -> Arc<PlanNode> {
    let children: Vec<Arc<PlanNode>> = plan.children().iter().map(apply).collect();
    let rebuilt = plan.with_children(children);

    let PlanNode::Limit(ref limit) = rebuilt else {
        return Arc::new(rebuilt);
    };
    let PlanNode::Sort(ref sort) = *limit.child else {
        return Arc::new(rebuilt);
    };

    Arc::new(PlanNode::TopN(TopNPlan {
        child: sort.child.clone(),
        order_bys: sort.order_bys.clone(),
        n: limit.limit,
        output_schema: limit.output_schema.clone(),
    }))
}
