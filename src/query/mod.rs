pub mod executor;
pub mod expression;
pub mod optimizer;
pub mod plan;

pub use executor::{build_executor, ExecutionError, Executor, ExecutorContext};
pub use expression::{CompareOp, Expression};
pub use plan::PlanNode;
