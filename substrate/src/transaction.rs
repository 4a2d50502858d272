//! Transaction identifiers.
//!
//! A transaction begins implicitly with its first lock acquisition and
//! ends at `BufferPool::transaction_complete`. The id itself is just a
//! process-unique token; there is no per-transaction state outside the
//! lock manager and the dirty marks on pages.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Vends a fresh id, unique within the process.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        TransactionId(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}
