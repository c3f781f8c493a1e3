use crate::catalog::schema::Schema;
use crate::catalog::tuple::Tuple;
use crate::catalog::value::Value;
use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::query::executor::{ExecutionError, Executor};
use crate::query::plan::{JoinType, NestedLoopJoinPlan};

/// Outer-driven nested-loop join. The inner side is re-initialised for
/// each outer row. INNER and LEFT joins are supported; LEFT pads an
/// unmatched outer row with typed nulls for the inner columns.
pub struct NestedLoopJoinExecutor {
    plan: NestedLoopJoinPlan,
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    left_tuple: Option<Tuple>,
    matched: bool,
}

impl NestedLoopJoinExecutor {
    pub fn new(plan: NestedLoopJoinPlan, left: Box<dyn Executor>, right: Box<dyn Executor>) -> Self {
        Self {
            plan,
            left,
            right,
            left_tuple: None,
            matched: false,
        }
    }

    fn null_padded(&self, left_tuple: &Tuple) -> Tuple {
        let mut values = left_tuple.values.clone();
        for col in self.right.output_schema().columns() {
            values.push(Value::null_of(col.type_id));
        }
        Tuple::new(values)
    }

    fn merged(&self, left_tuple: &Tuple, right_tuple: &Tuple) -> Tuple {
        let mut values = left_tuple.values.clone();
        values.extend(right_tuple.values.iter().cloned());
        Tuple::new(values)
    }
}

impl Executor for NestedLoopJoinExecutor {
    fn init(&mut self) -> Result<(), ExecutionError> {
        self.left.init()?;
        self.right.init()?;
        self.left_tuple = self.left.next()?.map(|(t, _)| t);
        self.matched = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>, ExecutionError> {
        loop {
            let Some(left_tuple) = self.left_tuple.clone() else {
                return Ok(None);
            };
            match self.right.next()? {
                Some((right_tuple, _)) => {
                    let verdict = self.plan.predicate.evaluate_join(
                        &left_tuple,
                        self.left.output_schema(),
                        &right_tuple,
                        self.right.output_schema(),
                    );
                    if verdict == Value::Boolean(true) {
                        self.matched = true;
                        let out = self.merged(&left_tuple, &right_tuple);
                        return Ok(Some((out, Rid::new(INVALID_PAGE_ID, 0))));
                    }
                }
                None => {
                    if !self.matched && self.plan.join_type == JoinType::Left {
                        self.matched = true;
                        let out = self.null_padded(&left_tuple);
                        return Ok(Some((out, Rid::new(INVALID_PAGE_ID, 0))));
                    }
                    self.right.init()?;
                    self.left_tuple = self.left.next()?.map(|(t, _)| t);
                    self.matched = false;
                }
            }
        }
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
