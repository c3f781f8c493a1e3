use crate::catalog::schema::Schema;
use crate::catalog::tuple::Tuple;
use crate::catalog::value::{CmpBool, TypeId, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

/// Expression tree evaluated against one tuple, or against a (left, right)
/// pair for join predicates. Column references carry which side of a join
/// they read from (0 = left/outer, 1 = right/inner; single-tuple contexts
/// always use side 0).
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    ColumnRef { side: usize, col_idx: usize },
    Constant(Value),
    Compare {
        op: CompareOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    And {
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn column(col_idx: usize) -> Self {
        Expression::ColumnRef { side: 0, col_idx }
    }

    pub fn join_column(side: usize, col_idx: usize) -> Self {
        Expression::ColumnRef { side, col_idx }
    }

    pub fn constant(value: Value) -> Self {
        Expression::Constant(value)
    }

    pub fn compare(op: CompareOp, left: Expression, right: Expression) -> Self {
        Expression::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::And {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn evaluate(&self, tuple: &Tuple, schema: &Schema) -> Value {
        self.eval(&[tuple], &[schema])
    }

    pub fn evaluate_join(
        &self,
        left: &Tuple,
        left_schema: &Schema,
        right: &Tuple,
        right_schema: &Schema,
    ) -> Value {
        self.eval(&[left, right], &[left_schema, right_schema])
    }

    fn eval(&self, tuples: &[&Tuple], _schemas: &[&Schema]) -> Value {
        match self {
            Expression::ColumnRef { side, col_idx } => tuples[*side].value(*col_idx).clone(),
            Expression::Constant(v) => v.clone(),
            Expression::Compare { op, left, right } => {
                let lv = left.eval(tuples, _schemas);
                let rv = right.eval(tuples, _schemas);
                let cmp = match op {
                    CompareOp::Equal => lv.compare_equals(&rv),
                    CompareOp::NotEqual => lv.compare_not_equals(&rv),
                    CompareOp::LessThan => lv.compare_less_than(&rv),
                    CompareOp::LessThanOrEqual => lv.compare_less_than_or_equal(&rv),
                    CompareOp::GreaterThan => lv.compare_greater_than(&rv),
                    CompareOp::GreaterThanOrEqual => lv.compare_greater_than_or_equal(&rv),
                };
                match cmp {
                    CmpBool::CmpTrue => Value::Boolean(true),
                    CmpBool::CmpFalse => Value::Boolean(false),
                    CmpBool::CmpNull => Value::null_of(TypeId::Boolean),
                }
            }
            Expression::And { left, right } => {
                let lv = left.eval(tuples, _schemas);
                let rv = right.eval(tuples, _schemas);
                // three-valued AND
                match (&lv, &rv) {
                    (Value::Boolean(false), _) | (_, Value::Boolean(false)) => {
                        Value::Boolean(false)
                    }
                    (Value::Boolean(true), Value::Boolean(true)) => Value::Boolean(true),
                    _ => Value::null_of(TypeId::Boolean),
                }
            }
        }
    }
}
