//! Error kinds surfaced by the storage engine.

use crate::tuple::PageId;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum StorageError {
    /// A tuple's schema does not match the page or file it targets,
    /// or two fields of different types were compared.
    SchemaMismatch,
    /// Insert into a page with no free slot.
    PageFull,
    /// Read or delete targeting a page number past the end of the file.
    PageNotFound(PageId),
    /// A delete targeted a slot whose header bit is not set.
    SlotEmpty(PageId, usize),
    /// Every cached page is dirty; nothing can leave the buffer pool.
    NoEvictablePage,
    /// A lock acquisition timed out; the transaction has released all
    /// of its locks and must unwind.
    TransactionAborted,
    /// No table with this id is registered in the catalog.
    UnknownTable(u32),
    /// Underlying file I/O failure.
    Io(io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::SchemaMismatch => write!(f, "tuple schema does not match"),
            StorageError::PageFull => write!(f, "no free slot on page"),
            StorageError::PageNotFound(pid) => {
                write!(f, "page {} of table {} does not exist", pid.page_no, pid.table_id)
            }
            StorageError::SlotEmpty(pid, slot) => {
                write!(f, "slot {} on page {} of table {} is not in use", slot, pid.page_no, pid.table_id)
            }
            StorageError::NoEvictablePage => write!(f, "all cached pages are dirty"),
            StorageError::TransactionAborted => write!(f, "transaction aborted"),
            StorageError::UnknownTable(id) => write!(f, "no table registered with id {}", id),
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}
