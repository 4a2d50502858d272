#![allow(dead_code)]

use meridian::errors::ExecutionError;
use meridian::executor::{Executor, SeqScan};
use std::path::Path;
use std::sync::Arc;
use substrate::{
    BufferPool, Catalog, DbFile, Field, HeapFile, TransactionId, Tuple, TupleDesc, Type,
};
use tempfile::TempDir;

pub fn setup_pool(capacity: usize) -> (TempDir, Arc<BufferPool>) {
    let dir = TempDir::new().unwrap();
    let catalog = Arc::new(Catalog::new());
    let pool = Arc::new(BufferPool::with_capacity(catalog, capacity));
    (dir, pool)
}

/// Reattaches a buffer pool to the tables already on disk under `dir`,
/// the way a restarted process would.
pub fn reopen_pool(
    dir: &Path,
    tables: &[(&str, TupleDesc)],
    capacity: usize,
) -> Arc<BufferPool> {
    let catalog = Arc::new(Catalog::new());
    for (name, desc) in tables {
        let file = HeapFile::open(dir.join(name), desc.clone()).unwrap();
        catalog.add_table(Arc::new(file), name);
    }
    Arc::new(BufferPool::with_capacity(catalog, capacity))
}

pub fn create_table(dir: &Path, pool: &Arc<BufferPool>, name: &str, desc: TupleDesc) -> u32 {
    let file = HeapFile::open(dir.join(name), desc).unwrap();
    let table_id = file.id();
    pool.catalog().add_table(Arc::new(file), name);
    table_id
}

pub fn int_string_desc() -> TupleDesc {
    TupleDesc::new(vec![
        (Type::Int, Some("id".to_string())),
        (Type::String, Some("name".to_string())),
    ])
}

pub fn int_desc() -> TupleDesc {
    TupleDesc::new(vec![(Type::Int, Some("value".to_string()))])
}

/// Serves a fixed list of tuples; the usual child for DML operators in
/// tests.
pub struct StaticTuples {
    desc: TupleDesc,
    rows: Vec<Tuple>,
    cursor: usize,
}

impl StaticTuples {
    pub fn new(desc: TupleDesc, rows: Vec<Tuple>) -> Self {
        Self {
            desc,
            rows,
            cursor: 0,
        }
    }
}

impl Executor for StaticTuples {
    fn open(&mut self) -> Result<(), ExecutionError> {
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        let Some(row) = self.rows.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        Ok(Some(row.clone()))
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {}

    fn schema(&self) -> &TupleDesc {
        &self.desc
    }
}

/// Inserts the rows in one transaction and commits.
pub fn insert_and_commit(pool: &Arc<BufferPool>, table_id: u32, rows: Vec<Tuple>) {
    let tid = TransactionId::new();
    for row in rows {
        pool.insert_tuple(tid, table_id, row).unwrap();
    }
    pool.transaction_complete(tid, true).unwrap();
}

/// Scans every tuple of the table under its own committed transaction.
pub fn scan_all(pool: &Arc<BufferPool>, table_id: u32) -> Vec<Tuple> {
    let tid = TransactionId::new();
    let mut scan = SeqScan::new(Arc::clone(pool), tid, table_id).unwrap();
    scan.open().unwrap();
    let mut rows = Vec::new();
    while let Some(tuple) = scan.next().unwrap() {
        rows.push(tuple);
    }
    scan.close();
    pool.transaction_complete(tid, true).unwrap();
    rows
}

pub fn int_field(tuple: &Tuple, i: usize) -> i32 {
    match tuple.field(i) {
        Field::Int(v) => *v,
        other => panic!("expected INT field, got {:?}", other),
    }
}

pub fn str_field(tuple: &Tuple, i: usize) -> String {
    match tuple.field(i) {
        Field::Str(s) => s.clone(),
        other => panic!("expected STRING field, got {:?}", other),
    }
}
