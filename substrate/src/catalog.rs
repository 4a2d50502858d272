//! Table registry.
//!
//! The catalog maps table ids to their backing files and names. It is
//! in-memory only; loading a schema from disk is a front-end concern
//! and not part of the storage core.

use crate::buffer_pool::{BufferPool, PageRef};
use crate::error::StorageError;
use crate::heap_file::HeapScan;
use crate::page::HeapPage;
use crate::transaction::TransactionId;
use crate::tuple::{PageId, Tuple, TupleDesc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// The contract between the buffer pool and a table's backing file.
pub trait DbFile: Send + Sync {
    /// Stable id of the table this file backs.
    fn id(&self) -> u32;

    fn tuple_desc(&self) -> &TupleDesc;

    fn num_pages(&self) -> usize;

    /// Reads the page image at `pid` from disk.
    fn read_page(&self, pid: PageId) -> Result<HeapPage, StorageError>;

    /// Writes the page image back to its offset.
    fn write_page(&self, page: &HeapPage) -> Result<(), StorageError>;

    /// Stores the tuple somewhere in the file, locking through the
    /// buffer pool. Returns every page the operation dirtied; pages not
    /// yet cached (the freshly created case) are installed by the pool.
    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: Tuple,
    ) -> Result<Vec<PageRef>, StorageError>;

    /// Removes the tuple named by its record id.
    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageRef>, StorageError>;

    /// Pull iterator over every tuple in the file, page at a time
    /// through the buffer pool with READ permission.
    fn scan(&self, pool: Arc<BufferPool>, tid: TransactionId) -> HeapScan {
        HeapScan::new(pool, tid, self.id(), self.num_pages())
    }
}

struct CatalogEntry {
    file: Arc<dyn DbFile>,
    name: String,
}

/// Registry of the tables the storage engine knows about.
#[derive(Default)]
pub struct Catalog {
    tables: Mutex<HashMap<u32, CatalogEntry>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table under its file's id. Re-registering an id
    /// replaces the previous entry (the re-open case).
    pub fn add_table(&self, file: Arc<dyn DbFile>, name: &str) {
        let mut tables = self.tables.lock().unwrap();
        tables.insert(
            file.id(),
            CatalogEntry {
                file,
                name: name.to_string(),
            },
        );
    }

    pub fn db_file(&self, table_id: u32) -> Result<Arc<dyn DbFile>, StorageError> {
        self.tables
            .lock()
            .unwrap()
            .get(&table_id)
            .map(|entry| Arc::clone(&entry.file))
            .ok_or(StorageError::UnknownTable(table_id))
    }

    pub fn table_name(&self, table_id: u32) -> Result<String, StorageError> {
        self.tables
            .lock()
            .unwrap()
            .get(&table_id)
            .map(|entry| entry.name.clone())
            .ok_or(StorageError::UnknownTable(table_id))
    }

    pub fn tuple_desc(&self, table_id: u32) -> Result<TupleDesc, StorageError> {
        self.tables
            .lock()
            .unwrap()
            .get(&table_id)
            .map(|entry| entry.file.tuple_desc().clone())
            .ok_or(StorageError::UnknownTable(table_id))
    }

    /// Ids of every registered table.
    pub fn table_ids(&self) -> Vec<u32> {
        self.tables.lock().unwrap().keys().copied().collect()
    }
}
