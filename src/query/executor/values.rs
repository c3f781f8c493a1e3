use crate::catalog::schema::Schema;
use crate::catalog::tuple::Tuple;
use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::query::executor::{ExecutionError, Executor};
use crate::query::plan::ValuesPlan;

/// Emits a fixed list of literal rows; the leaf of DML plans.
pub struct ValuesExecutor {
    plan: ValuesPlan,
    pos: usize,
}

impl ValuesExecutor {
    pub fn new(plan: ValuesPlan) -> Self {
        Self { plan, pos: 0 }
    }
}

impl Executor for ValuesExecutor {
    fn init(&mut self) -> Result<(), ExecutionError> {
        self.pos = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>, ExecutionError> {
        if self.pos >= self.plan.rows.len() {
            return Ok(None);
        }
        let tuple = Tuple::new(self.plan.rows[self.pos].clone());
        self.pos += 1;
        Ok(Some((tuple, Rid::new(INVALID_PAGE_ID, 0))))
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
