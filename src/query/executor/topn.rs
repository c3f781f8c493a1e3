use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::catalog::schema::Schema;
use crate::catalog::tuple::Tuple;
use crate::catalog::value::Value;
use crate::common::types::Rid;
use crate::query::executor::sort::compare_order_keys;
use crate::query::executor::{ExecutionError, Executor};
use crate::query::plan::{OrderByType, TopNPlan};

struct HeapEntry {
    keys: Vec<Value>,
    directions: Arc<Vec<OrderByType>>,
    tuple: Tuple,
    rid: Rid,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_order_keys(&self.keys, &other.keys, &self.directions)
    }
}

/// Keeps only the N best rows under the sort comparator in a bounded
/// max-heap; the heap's top is the worst survivor and is evicted whenever
/// a better row arrives. Draining and reversing yields the output order.
pub struct TopNExecutor {
    plan: TopNPlan,
    child: Box<dyn Executor>,
    rows: Vec<(Tuple, Rid)>,
    pos: usize,
}

impl TopNExecutor {
    pub fn new(plan: TopNPlan, child: Box<dyn Executor>) -> Self {
        Self {
            plan,
            child,
            rows: Vec::new(),
            pos: 0,
        }
    }
}

impl Executor for TopNExecutor {
    fn init(&mut self) -> Result<(), ExecutionError> {
        self.child.init()?;
        let directions: Arc<Vec<OrderByType>> =
            Arc::new(self.plan.order_bys.iter().map(|(dir, _)| *dir).collect());
        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
        while let Some((tuple, rid)) = self.child.next()? {
            let keys: Vec<Value> = self
                .plan
                .order_bys
                .iter()
                .map(|(_, e)| e.evaluate(&tuple, self.child.output_schema()))
                .collect();
            heap.push(HeapEntry {
                keys,
                directions: directions.clone(),
                tuple,
                rid,
            });
            if heap.len() > self.plan.n {
                heap.pop();
            }
        }
        let mut rows = Vec::with_capacity(heap.len());
        while let Some(entry) = heap.pop() {
            rows.push((entry.tuple, entry.rid));
        }
        rows.reverse();
        self.rows = rows;
        self.pos = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>, ExecutionError> {
        if self.pos >= self.rows.len() {
            return Ok(None);
        }
        let row = self.rows[self.pos].clone();
        self.pos += 1;
        Ok(Some(row))
    }

    fn output_schema(&self) -> &Schema {
        &self.plan.output_schema
    }
}
