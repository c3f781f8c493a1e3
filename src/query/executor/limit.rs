use crate::catalog::schema::Schema;
use crate::catalog::tuple::Tuple;
use crate::common::types::Rid;
use crate::query::executor::{ExecutionError, Executor};
use crate::query::plan::LimitPlan;

/// Passes through at most `limit` child rows.
pub struct LimitExecutor {
    plan: LimitPlan,
    child: Box<dyn Executor>,
    emitted: usize,
}

impl LimitExecutor {
    pub fn new(plan: LimitPlan, child: Box<dyn Executor>) -> Self {
        Self {
            plan,
            child,
            emitted: 0,
        }
    }
}

impl Executor for LimitExecutor {
    fn init(&mut self) -> Result<(), ExecutionError> {
        self.emitted = 0;
        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>, ExecutionError> {
        if self.emitted >= self.plan.limit {
            return Ok(None);
        }
        match self.child.next()? {
            Some(row) => {
                self.emitted += 1;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
