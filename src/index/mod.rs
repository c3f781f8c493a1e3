pub mod btree;

pub use btree::{BPlusTree, BPlusTreeIter, BTreeError};
