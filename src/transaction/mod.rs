pub mod lock_manager;
pub mod transaction;
pub mod transaction_manager;

pub use lock_manager::LockManager;
pub use transaction::{
    AbortReason, IndexWriteRecord, IsolationLevel, LockMode, TableWriteRecord, Transaction,
    TransactionAbortError, TransactionState, WType,
};
pub use transaction_manager::{TransactionError, TransactionManager};
