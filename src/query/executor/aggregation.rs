use std::collections::HashMap;

use crate::catalog::schema::Schema;
use crate::catalog::tuple::Tuple;
use crate::catalog::value::{TypeId, Value};
use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::query::executor::{ExecutionError, Executor};
use crate::query::plan::{AggregationPlan, AggregationType};

/// Hash aggregation: one bucket per distinct group-by key, combined
/// incrementally. With no group-bys and no input it still emits one row of
/// initial aggregate values (COUNT(*) = 0, the rest NULL).
pub struct AggregationExecutor {
    plan: AggregationPlan,
    child: Box<dyn Executor>,
    results: Vec<(Vec<Value>, Vec<Value>)>,
    pos: usize,
    emit_initial: bool,
}

impl AggregationExecutor {
    pub fn new(plan: AggregationPlan, child: Box<dyn Executor>) -> Self {
        Self {
            plan,
            child,
            results: Vec::new(),
            pos: 0,
            emit_initial: false,
        }
    }

    fn initial_values(&self) -> Vec<Value> {
        self.plan
            .aggregates
            .iter()
            .map(|(agg, _)| match agg {
                AggregationType::CountStar => Value::Integer(0),
                _ => Value::null_of(TypeId::Integer),
            })
            .collect()
    }

    fn combine(&self, running: &mut [Value], tuple: &Tuple) {
        for (i, (agg, expr)) in self.plan.aggregates.iter().enumerate() {
            let input = expr.evaluate(tuple, self.child.output_schema());
            match agg {
                AggregationType::CountStar => {
                    if let Value::Integer(n) = running[i] {
                        running[i] = Value::Integer(n + 1);
                    }
                }
                AggregationType::Count => {
                    if !input.is_null() {
                        running[i] = match running[i] {
                            Value::Integer(n) => Value::Integer(n + 1),
                            _ => Value::Integer(1),
                        };
                    }
                }
                AggregationType::Sum => {
                    if let Value::Integer(v) = input {
                        running[i] = match running[i] {
                            Value::Integer(acc) => Value::Integer(acc + v),
                            _ => Value::Integer(v),
                        };
                    }
                }
                AggregationType::Min => {
                    if !input.is_null() {
                        let replace = running[i].is_null()
                            || input.compare_less_than(&running[i]).is_true();
                        if replace {
                            running[i] = input;
                        }
                    }
                }
                AggregationType::Max => {
                    if !input.is_null() {
                        let replace = running[i].is_null()
                            || input.compare_greater_than(&running[i]).is_true();
                        if replace {
                            running[i] = input;
                        }
                    }
                }
            }
        }
    }
}

impl Executor for AggregationExecutor {
    fn init(&mut self) -> Result<(), ExecutionError> {
        self.child.init()?;
        let mut table: HashMap<Vec<Value>, Vec<Value>> = HashMap::new();
        while let Some((tuple, _)) = self.child.next()? {
            let key: Vec<Value> = self
                .plan
                .group_bys
                .iter()
                .map(|e| e.evaluate(&tuple, self.child.output_schema()))
                .collect();
            let initial = self.initial_values();
            let running = table.entry(key).or_insert(initial);
            self.combine(running, &tuple);
        }
        self.emit_initial = self.plan.group_bys.is_empty() && table.is_empty();
        self.results = table.into_iter().collect();
        self.pos = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>, ExecutionError> {
        if self.emit_initial {
            self.emit_initial = false;
            return Ok(Some((
                Tuple::new(self.initial_values()),
                Rid::new(INVALID_PAGE_ID, 0),
            )));
        }
        if self.pos >= self.results.len() {
            return Ok(None);
        }
        let (key, aggs) = &self.results[self.pos];
        self.pos += 1;
        let mut values = key.clone();
        values.extend(aggs.iter().cloned());
        Ok(Some((Tuple::new(values), Rid::new(INVALID_PAGE_ID, 0))))
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
