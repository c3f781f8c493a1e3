// Export public modules
pub mod catalog;
pub mod common;
pub mod index;
pub mod query;
pub mod storage;
pub mod transaction;

// Re-export key items for convenient access
pub use catalog::Catalog;
pub use index::BPlusTree;
pub use storage::buffer::{BufferPoolError, BufferPoolManager};
pub use transaction::{LockManager, TransactionManager};
