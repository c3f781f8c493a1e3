use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::catalog::schema::Schema;
use crate::catalog::tuple::KeyTuple;
use crate::catalog::table::TableHeap;
use crate::common::types::TableOid;
use crate::index::btree::{BPlusTree, BTreeError};
use crate::storage::buffer::BufferPoolManager;

pub type IndexOid = u32;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("table {0} not found")]
    TableNotFound(String),

    #[error("index error: {0}")]
    Index(#[from] BTreeError),
}

/// Everything the engine needs to know about one table
pub struct TableInfo {
    pub oid: TableOid,
    pub name: String,
    pub schema: Schema,
    pub table: Arc<TableHeap>,
}

/// Everything the engine needs to know about one index
pub struct IndexInfo {
    pub index_oid: IndexOid,
    pub name: String,
    pub table_name: String,
    pub key_schema: Schema,
    pub key_attrs: Vec<usize>,
    pub index: Arc<BPlusTree<KeyTuple>>,
}

/// Registry of tables and their indexes. The engine core has no DDL
/// surface; tests and embedding code create tables directly.
pub struct Catalog {
    bpm: Arc<BufferPoolManager>,
    tables: RwLock<HashMap<TableOid, Arc<TableInfo>>>,
    table_names: RwLock<HashMap<String, TableOid>>,
    indexes: RwLock<HashMap<IndexOid, Arc<IndexInfo>>>,
    table_indexes: RwLock<HashMap<TableOid, Vec<IndexOid>>>,
    next_table_oid: AtomicU32,
    next_index_oid: AtomicU32,
}

impl Catalog {
    pub fn new(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            tables: RwLock::new(HashMap::new()),
            table_names: RwLock::new(HashMap::new()),
            indexes: RwLock::new(HashMap::new()),
            table_indexes: RwLock::new(HashMap::new()),
            next_table_oid: AtomicU32::new(1),
            next_index_oid: AtomicU32::new(1),
        }
    }

    pub fn create_table(&self, name: impl Into<String>, schema: Schema) -> Arc<TableInfo> {
        let name = name.into();
        let oid = self.next_table_oid.fetch_add(1, Ordering::SeqCst);
        let info = Arc::new(TableInfo {
            oid,
            name: name.clone(),
            schema,
            table: Arc::new(TableHeap::new(oid)),
        });
        self.tables.write().insert(oid, info.clone());
        self.table_names.write().insert(name, oid);
        self.table_indexes.write().insert(oid, Vec::new());
        info
    }

    /// Create a B+ tree index over the named table's key attributes.
    /// Existing rows are not back-filled; the engine core creates indexes
    /// before loading data.
    pub fn create_index(
        &self,
        name: impl Into<String>,
        table_name: &str,
        key_attrs: Vec<usize>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Arc<IndexInfo>, CatalogError> {
        let name = name.into();
        let table_info = self
            .table_by_name(table_name)
            .ok_or_else(|| CatalogError::TableNotFound(table_name.to_string()))?;
        let key_schema = table_info.schema.project(&key_attrs);
        let index = BPlusTree::new(name.clone(), self.bpm.clone(), leaf_max_size, internal_max_size)?;
        let index_oid = self.next_index_oid.fetch_add(1, Ordering::SeqCst);
        let info = Arc::new(IndexInfo {
            index_oid,
            name,
            table_name: table_name.to_string(),
            key_schema,
            key_attrs,
            index: Arc::new(index),
        });
        self.indexes.write().insert(index_oid, info.clone());
        self.table_indexes
            .write()
            .entry(table_info.oid)
            .or_default()
            .push(index_oid);
        Ok(info)
    }

    pub fn table(&self, oid: TableOid) -> Option<Arc<TableInfo>> {
        self.tables.read().get(&oid).cloned()
    }

    pub fn table_by_name(&self, name: &str) -> Option<Arc<TableInfo>> {
        let oid = *self.table_names.read().get(name)?;
        self.table(oid)
    }

    pub fn index(&self, index_oid: IndexOid) -> Option<Arc<IndexInfo>> {
        self.indexes.read().get(&index_oid).cloned()
    }

    pub fn table_indexes(&self, oid: TableOid) -> Vec<Arc<IndexInfo>> {
        let index_oids = match self.table_indexes.read().get(&oid) {
            Some(oids) => oids.clone(),
            None => return Vec::new(),
        };
        let indexes = self.indexes.read();
        index_oids
            .iter()
            .filter_map(|io| indexes.get(io).cloned())
            .collect()
    }
}
