//! The pull-based operator pipeline.
//!
//! Every operator speaks the same protocol: `open` before anything
//! else, `next` until it yields `None`, `rewind` to restart, `close`
//! when done. Operators compose by owning their child as a
//! `Box<dyn Executor>`. Driving an operator that is not open is a
//! usage error, reported as `ExecutionError::NotOpen`.

use crate::errors::ExecutionError;
use substrate::{Tuple, TupleDesc};

mod dml;
mod scan;

pub use dml::{Delete, Insert};
pub use scan::SeqScan;

pub trait Executor {
    fn open(&mut self) -> Result<(), ExecutionError>;

    /// The next tuple, or `None` when the operator is exhausted.
    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError>;

    /// Restarts the operator from the beginning. Only valid while open.
    fn rewind(&mut self) -> Result<(), ExecutionError>;

    fn close(&mut self);

    /// Schema of the tuples this operator produces.
    fn schema(&self) -> &TupleDesc;
}
