pub mod delete;
pub mod error;
pub mod insert;
pub mod iterator;
pub mod node;
pub mod serialization;
pub mod tree;

pub use error::BTreeError;
pub use iterator::BPlusTreeIter;
pub use tree::BPlusTree;
