use std::collections::HashMap;

use crate::catalog::schema::Schema;
use crate::catalog::tuple::Tuple;
use crate::catalog::value::Value;
use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::query::executor::{ExecutionError, Executor};
use crate::query::plan::{HashJoinPlan, JoinType};

/// Equality join: the right child is drained into a hash table on init,
/// then each left row probes it and emits every matching right row. LEFT
/// pads misses with typed nulls. Rows whose key contains NULL never match.
pub struct HashJoinExecutor {
    plan: HashJoinPlan,
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    table: HashMap<Vec<Value>, Vec<Tuple>>,
    left_tuple: Option<Tuple>,
    matches: Vec<Tuple>,
    match_idx: usize,
}

impl HashJoinExecutor {
    pub fn new(plan: HashJoinPlan, left: Box<dyn Executor>, right: Box<dyn Executor>) -> Self {
        Self {
            plan,
            left,
            right,
            table: HashMap::new(),
            left_tuple: None,
            matches: Vec::new(),
            match_idx: 0,
        }
    }

    fn advance_left(&mut self) -> Result<(), ExecutionError> {
        self.left_tuple = self.left.next()?.map(|(t, _)| t);
        self.match_idx = 0;
        self.matches = match &self.left_tuple {
            Some(tuple) => {
                let key: Vec<Value> = self
                    .plan
                    .left_key_expressions
                    .iter()
                    .map(|e| e.evaluate(tuple, self.left.output_schema()))
                    .collect();
                if key.iter().any(Value::is_null) {
                    Vec::new()
                } else {
                    self.table.get(&key).cloned().unwrap_or_default()
                }
            }
            None => Vec::new(),
        };
        Ok(())
    }

    fn null_padded(&self, left_tuple: &Tuple) -> Tuple {
        let mut values = left_tuple.values.clone();
        for col in self.right.output_schema().columns() {
            values.push(Value::null_of(col.type_id));
        }
        Tuple::new(values)
    }
}

impl Executor for HashJoinExecutor {
    fn init(&mut self) -> Result<(), ExecutionError> {
        self.left.init()?;
        self.right.init()?;
        self.table.clear();
        while let Some((right_tuple, _)) = self.right.next()? {
            let key: Vec<Value> = self
                .plan
                .right_key_expressions
                .iter()
                .map(|e| e.evaluate(&right_tuple, self.right.output_schema()))
                .collect();
            if key.iter().any(Value::is_null) {
                continue;
            }
            self.table.entry(key).or_default().push(right_tuple);
        }
        self.advance_left()?;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>, ExecutionError> {
        loop {
            let Some(left_tuple) = self.left_tuple.clone() else {
                return Ok(None);
            };
            if self.match_idx < self.matches.len() {
                let right_tuple = &self.matches[self.match_idx];
                self.match_idx += 1;
                let mut values = left_tuple.values.clone();
                values.extend(right_tuple.values.iter().cloned());
                return Ok(Some((Tuple::new(values), Rid::new(INVALID_PAGE_ID, 0))));
            }
            if self.matches.is_empty() && self.plan.join_type == JoinType::Left {
                let out = self.null_padded(&left_tuple);
                self.advance_left()?;
                return Ok(Some((out, Rid::new(INVALID_PAGE_ID, 0))));
            }
            self.advance_left()?;
        }
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
