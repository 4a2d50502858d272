use std::fmt;
use substrate::StorageError;

#[derive(Debug)]
pub enum ExecutionError {
    /// Anything the storage engine reports, including lock-timeout
    /// aborts that unwind the whole pipeline.
    Storage(StorageError),
    /// An operator was driven before `open` or after `close`.
    NotOpen,
    /// Aggregate operator the column type cannot support.
    UnsupportedAggregate(String),
}

impl ExecutionError {
    /// True when the underlying cause is a transaction abort.
    pub fn is_aborted(&self) -> bool {
        matches!(self, ExecutionError::Storage(StorageError::TransactionAborted))
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::Storage(e) => write!(f, "{}", e),
            ExecutionError::NotOpen => write!(f, "operator is not open"),
            ExecutionError::UnsupportedAggregate(msg) => {
                write!(f, "unsupported aggregate: {}", msg)
            }
        }
    }
}

impl std::error::Error for ExecutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutionError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for ExecutionError {
    fn from(err: StorageError) -> Self {
        ExecutionError::Storage(err)
    }
}
