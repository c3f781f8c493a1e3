use std::cmp::Ordering;

use crate::catalog::schema::Schema;
use crate::catalog::tuple::Tuple;
use crate::catalog::value::Value;
use crate::common::types::Rid;
use crate::query::executor::{ExecutionError, Executor};
use crate::query::plan::{OrderByType, SortPlan};

/// Compare two rows' precomputed order-by values, honouring per-column
/// direction. Shared with the top-n operator.
pub(crate) fn compare_order_keys(
    a: &[Value],
    b: &[Value],
    directions: &[OrderByType],
) -> Ordering {
    for ((va, vb), dir) in a.iter().zip(b.iter()).zip(directions.iter()) {
        let ord = va.total_cmp(vb);
        if ord != Ordering::Equal {
            return match dir {
                OrderByType::Asc => ord,
                OrderByType::Desc => ord.reverse(),
            };
        }
    }
    Ordering::Equal
}

/// Materialises the child, stable-sorts it by the order-by list, then
/// streams the result.
pub struct SortExecutor {
    plan: SortPlan,
    child: Box<dyn Executor>,
    sorted: Vec<(Tuple, Rid)>,
    pos: usize,
}

impl SortExecutor {
    pub fn new(plan: SortPlan, child: Box<dyn Executor>) -> Self {
        Self {
            plan,
            child,
            sorted: Vec::new(),
            pos: 0,
        }
    }
}

impl Executor for SortExecutor {
    fn init(&mut self) -> Result<(), ExecutionError> {
        self.child.init()?;
        let mut rows: Vec<(Vec<Value>, Tuple, Rid)> = Vec::new();
        while let Some((tuple, rid)) = self.child.next()? {
            let keys: Vec<Value> = self
                .plan
                .order_bys
                .iter()
                .map(|(_, e)| e.evaluate(&tuple, self.child.output_schema()))
                .collect();
            rows.push((keys, tuple, rid));
        }
        let directions: Vec<OrderByType> =
            self.plan.order_bys.iter().map(|(dir, _)| *dir).collect();
        rows.sort_by(|a, b| compare_order_keys(&a.0, &b.0, &directions));
        self.sorted = rows.into_iter().map(|(_, t, r)| (t, r)).collect();
        self.pos = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>, ExecutionError> {
        if self.pos >= self.sorted.len() {
            return Ok(None);
        }
        let row = self.sorted[self.pos].clone();
        self.pos += 1;
        Ok(Some(row))
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
