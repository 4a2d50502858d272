use super::Executor;
use crate::errors::ExecutionError;
use std::sync::Arc;
use substrate::{BufferPool, Field, StorageError, TransactionId, Tuple, TupleDesc, Type};

fn count_tuple(desc: &TupleDesc, count: i32) -> Tuple {
    Tuple::new(desc.clone(), vec![Field::Int(count)]).expect("count schema is a single INT")
}

/// Inserts every tuple its child produces into a table. One-shot: the
/// first `next` drains the child and yields a single tuple holding the
/// insert count; later calls yield `None` until `rewind`.
pub struct Insert {
    pool: Arc<BufferPool>,
    tid: TransactionId,
    table_id: u32,
    child: Box<dyn Executor>,
    desc: TupleDesc,
    result: Option<Tuple>,
    done: bool,
    opened: bool,
}

impl Insert {
    /// Fails with `SchemaMismatch` when the child's schema differs
    /// from the destination table's.
    pub fn new(
        pool: Arc<BufferPool>,
        tid: TransactionId,
        child: Box<dyn Executor>,
        table_id: u32,
    ) -> Result<Self, ExecutionError> {
        let table_desc = pool.catalog().tuple_desc(table_id)?;
        if child.schema() != &table_desc {
            return Err(StorageError::SchemaMismatch.into());
        }
        Ok(Self {
            pool,
            tid,
            table_id,
            child,
            desc: TupleDesc::from_types(vec![Type::Int]),
            result: None,
            done: false,
            opened: false,
        })
    }
}

impl Executor for Insert {
    fn open(&mut self) -> Result<(), ExecutionError> {
        self.child.open()?;
        self.opened = true;
        self.done = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        if !self.opened {
            return Err(ExecutionError::NotOpen);
        }
        if self.done {
            return Ok(None);
        }
        if self.result.is_none() {
            let mut count = 0;
            while let Some(tuple) = self.child.next()? {
                self.pool.insert_tuple(self.tid, self.table_id, tuple)?;
                count += 1;
            }
            self.result = Some(count_tuple(&self.desc, count));
        }
        self.done = true;
        Ok(self.result.clone())
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        if !self.opened {
            return Err(ExecutionError::NotOpen);
        }
        self.done = false;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
        self.child.close();
    }

    fn schema(&self) -> &TupleDesc {
        &self.desc
    }
}

/// Deletes every tuple its child produces. Same one-shot protocol as
/// `Insert`.
pub struct Delete {
    pool: Arc<BufferPool>,
    tid: TransactionId,
    child: Box<dyn Executor>,
    desc: TupleDesc,
    result: Option<Tuple>,
    done: bool,
    opened: bool,
}

impl Delete {
    pub fn new(pool: Arc<BufferPool>, tid: TransactionId, child: Box<dyn Executor>) -> Self {
        Self {
            pool,
            tid,
            child,
            desc: TupleDesc::from_types(vec![Type::Int]),
            result: None,
            done: false,
            opened: false,
        }
    }
}

impl Executor for Delete {
    fn open(&mut self) -> Result<(), ExecutionError> {
        self.child.open()?;
        self.opened = true;
        self.done = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        if !self.opened {
            return Err(ExecutionError::NotOpen);
        }
        if self.done {
            return Ok(None);
        }
        if self.result.is_none() {
            let mut count = 0;
            while let Some(tuple) = self.child.next()? {
                self.pool.delete_tuple(self.tid, &tuple)?;
                count += 1;
            }
            self.result = Some(count_tuple(&self.desc, count));
        }
        self.done = true;
        Ok(self.result.clone())
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        if !self.opened {
            return Err(ExecutionError::NotOpen);
        }
        self.done = false;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
        self.child.close();
    }

    fn schema(&self) -> &TupleDesc {
        &self.desc
    }
}
