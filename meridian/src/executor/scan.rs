use super::Executor;
use crate::errors::ExecutionError;
use std::sync::Arc;
use substrate::heap_file::HeapScan;
use substrate::{BufferPool, DbFile, TransactionId, Tuple, TupleDesc};

/// Sequential scan over a table, one page at a time through the buffer
/// pool under READ permission.
pub struct SeqScan {
    pool: Arc<BufferPool>,
    tid: TransactionId,
    table_id: u32,
    desc: TupleDesc,
    scan: Option<HeapScan>,
}

impl SeqScan {
    pub fn new(
        pool: Arc<BufferPool>,
        tid: TransactionId,
        table_id: u32,
    ) -> Result<Self, ExecutionError> {
        let desc = pool.catalog().tuple_desc(table_id)?;
        Ok(Self {
            pool,
            tid,
            table_id,
            desc,
            scan: None,
        })
    }
}

impl Executor for SeqScan {
    fn open(&mut self) -> Result<(), ExecutionError> {
        let file = self.pool.catalog().db_file(self.table_id)?;
        self.scan = Some(file.scan(Arc::clone(&self.pool), self.tid));
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        let scan = self.scan.as_mut().ok_or(ExecutionError::NotOpen)?;
        Ok(scan.next()?)
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        let scan = self.scan.as_mut().ok_or(ExecutionError::NotOpen)?;
        scan.rewind();
        Ok(())
    }

    fn close(&mut self) {
        self.scan = None;
    }

    fn schema(&self) -> &TupleDesc {
        &self.desc
    }
}
