//! Manages shared/exclusive locks on pages.
//!
//! One mutex guards both tables: the per-page `(mode, holder count)`
//! state and the per-transaction set of held pages. Waiters block on a
//! condition variable that is signaled on every release. An acquire
//! that cannot be granted within `LOCK_TIMEOUT` releases every lock the
//! requesting transaction holds and aborts it; the timeout stands in
//! for deadlock detection, so any wait cycle resolves by one
//! participant aborting.

use crate::error::StorageError;
use crate::transaction::TransactionId;
use crate::tuple::PageId;
use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Total time an acquire may wait before the transaction aborts.
pub const LOCK_TIMEOUT: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug, Default)]
struct LockTables {
    /// Current mode and holder count per locked page.
    pages: HashMap<PageId, (LockMode, usize)>,
    /// Pages each transaction currently holds, in any mode.
    held: HashMap<TransactionId, HashSet<PageId>>,
}

impl LockTables {
    fn holds(&self, tid: TransactionId, pid: PageId) -> bool {
        self.held.get(&tid).is_some_and(|pages| pages.contains(&pid))
    }

    fn release_one(&mut self, tid: TransactionId, pid: PageId) {
        let released = self
            .held
            .get_mut(&tid)
            .is_some_and(|pages| pages.remove(&pid));
        if !released {
            return;
        }
        if let Some((_, holders)) = self.pages.get_mut(&pid) {
            *holders -= 1;
            if *holders == 0 {
                self.pages.remove(&pid);
            }
        }
    }

    fn release_all(&mut self, tid: TransactionId) {
        let Some(pids) = self.held.remove(&tid) else {
            return;
        };
        for pid in pids {
            if let Some((_, holders)) = self.pages.get_mut(&pid) {
                *holders -= 1;
                if *holders == 0 {
                    self.pages.remove(&pid);
                }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct LockManager {
    tables: Mutex<LockTables>,
    cvar: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a shared lock. Returns immediately if `tid` already
    /// holds the page in any mode.
    pub fn acquire_shared(&self, tid: TransactionId, pid: PageId) -> Result<(), StorageError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.holds(tid, pid) {
            return Ok(());
        }
        let deadline = Instant::now() + LOCK_TIMEOUT;
        loop {
            match tables.pages.get(&pid) {
                Some((LockMode::Exclusive, _)) => {
                    tables = self.wait_or_abort(tables, tid, deadline)?;
                }
                _ => {
                    let entry = tables.pages.entry(pid).or_insert((LockMode::Shared, 0));
                    entry.1 += 1;
                    tables.held.entry(tid).or_default().insert(pid);
                    crate::substrate_debug_log!(
                        "[LockManager] tx {} acquired SHARED on {:?}",
                        tid.id(),
                        pid
                    );
                    return Ok(());
                }
            }
        }
    }

    /// Acquires an exclusive lock. A transaction that already holds the
    /// page upgrades in place once it is the sole holder.
    pub fn acquire_exclusive(&self, tid: TransactionId, pid: PageId) -> Result<(), StorageError> {
        let mut tables = self.tables.lock().unwrap();
        let deadline = Instant::now() + LOCK_TIMEOUT;
        if tables.holds(tid, pid) {
            loop {
                let entry = tables.pages.get_mut(&pid).expect("held page has lock state");
                if entry.1 == 1 {
                    entry.0 = LockMode::Exclusive;
                    crate::substrate_debug_log!(
                        "[LockManager] tx {} upgraded to EXCLUSIVE on {:?}",
                        tid.id(),
                        pid
                    );
                    return Ok(());
                }
                tables = self.wait_or_abort(tables, tid, deadline)?;
            }
        }
        loop {
            if tables.pages.contains_key(&pid) {
                tables = self.wait_or_abort(tables, tid, deadline)?;
                continue;
            }
            tables.pages.insert(pid, (LockMode::Exclusive, 1));
            tables.held.entry(tid).or_default().insert(pid);
            crate::substrate_debug_log!(
                "[LockManager] tx {} acquired EXCLUSIVE on {:?}",
                tid.id(),
                pid
            );
            return Ok(());
        }
    }

    /// Blocks on the condvar until signaled or the deadline passes. A
    /// passed deadline releases everything `tid` holds and aborts.
    fn wait_or_abort<'a>(
        &self,
        guard: MutexGuard<'a, LockTables>,
        tid: TransactionId,
        deadline: Instant,
    ) -> Result<MutexGuard<'a, LockTables>, StorageError> {
        let now = Instant::now();
        if now >= deadline {
            let mut guard = guard;
            guard.release_all(tid);
            self.cvar.notify_all();
            crate::substrate_debug_log!(
                "[LockManager] tx {} timed out waiting, aborting",
                tid.id()
            );
            return Err(StorageError::TransactionAborted);
        }
        let (guard, _) = self.cvar.wait_timeout(guard, deadline - now).unwrap();
        Ok(guard)
    }

    pub fn release(&self, tid: TransactionId, pid: PageId) {
        let mut tables = self.tables.lock().unwrap();
        tables.release_one(tid, pid);
        self.cvar.notify_all();
    }

    pub fn release_all(&self, tid: TransactionId) {
        let mut tables = self.tables.lock().unwrap();
        tables.release_all(tid);
        self.cvar.notify_all();
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.tables.lock().unwrap().holds(tid, pid)
    }

    /// Pages currently held by `tid`. The abort path walks this to
    /// discard dirty cached pages.
    pub fn pages_held(&self, tid: TransactionId) -> Vec<PageId> {
        self.tables
            .lock()
            .unwrap()
            .held
            .get(&tid)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn pid(n: usize) -> PageId {
        PageId::new(1, n)
    }

    #[test]
    fn shared_locks_are_compatible() {
        let lm = LockManager::new();
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        lm.acquire_shared(t1, pid(0)).unwrap();
        lm.acquire_shared(t2, pid(0)).unwrap();
        assert!(lm.holds_lock(t1, pid(0)));
        assert!(lm.holds_lock(t2, pid(0)));
    }

    #[test]
    fn reacquire_is_a_no_op() {
        let lm = LockManager::new();
        let t1 = TransactionId::new();
        lm.acquire_shared(t1, pid(0)).unwrap();
        lm.acquire_shared(t1, pid(0)).unwrap();
        lm.release(t1, pid(0));
        assert!(!lm.holds_lock(t1, pid(0)));
    }

    #[test]
    fn exclusive_blocks_shared_until_timeout() {
        let lm = Arc::new(LockManager::new());
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        lm.acquire_exclusive(t1, pid(0)).unwrap();

        let lm2 = Arc::clone(&lm);
        let handle = thread::spawn(move || {
            let start = Instant::now();
            let result = lm2.acquire_shared(t2, pid(0));
            (result, start.elapsed())
        });
        let (result, elapsed) = handle.join().unwrap();
        assert!(matches!(result, Err(StorageError::TransactionAborted)));
        assert!(elapsed >= LOCK_TIMEOUT);
        assert!(!lm.holds_lock(t2, pid(0)));
        assert!(lm.holds_lock(t1, pid(0)));
    }

    #[test]
    fn timeout_releases_everything_the_waiter_held() {
        let lm = Arc::new(LockManager::new());
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        lm.acquire_exclusive(t1, pid(0)).unwrap();

        let lm2 = Arc::clone(&lm);
        let handle = thread::spawn(move || {
            lm2.acquire_shared(t2, pid(1)).unwrap();
            lm2.acquire_exclusive(t2, pid(0))
        });
        assert!(matches!(
            handle.join().unwrap(),
            Err(StorageError::TransactionAborted)
        ));
        assert!(lm.pages_held(t2).is_empty());
    }

    #[test]
    fn sole_holder_upgrades_without_waiting() {
        let lm = LockManager::new();
        let t1 = TransactionId::new();
        lm.acquire_shared(t1, pid(0)).unwrap();
        let start = Instant::now();
        lm.acquire_exclusive(t1, pid(0)).unwrap();
        assert!(start.elapsed() < LOCK_TIMEOUT);

        // Still exclusive afterwards: a second reader must time out.
        let t2 = TransactionId::new();
        assert!(matches!(
            lm.acquire_shared(t2, pid(0)),
            Err(StorageError::TransactionAborted)
        ));
    }

    #[test]
    fn upgrade_waits_for_other_readers_to_leave() {
        let lm = Arc::new(LockManager::new());
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        lm.acquire_shared(t1, pid(0)).unwrap();
        lm.acquire_shared(t2, pid(0)).unwrap();

        let lm2 = Arc::clone(&lm);
        let handle = thread::spawn(move || lm2.acquire_exclusive(t1, pid(0)));
        thread::sleep(Duration::from_millis(50));
        lm.release(t2, pid(0));
        handle.join().unwrap().unwrap();
        assert!(lm.holds_lock(t1, pid(0)));
    }

    #[test]
    fn waiter_is_woken_by_release() {
        let lm = Arc::new(LockManager::new());
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        lm.acquire_exclusive(t1, pid(0)).unwrap();

        let lm2 = Arc::clone(&lm);
        let handle = thread::spawn(move || {
            let start = Instant::now();
            let result = lm2.acquire_shared(t2, pid(0));
            (result, start.elapsed())
        });
        thread::sleep(Duration::from_millis(50));
        lm.release_all(t1);
        let (result, elapsed) = handle.join().unwrap();
        result.unwrap();
        assert!(elapsed < LOCK_TIMEOUT);
    }

    #[test]
    fn release_all_clears_the_held_set() {
        let lm = LockManager::new();
        let t1 = TransactionId::new();
        lm.acquire_shared(t1, pid(0)).unwrap();
        lm.acquire_exclusive(t1, pid(1)).unwrap();
        lm.release_all(t1);
        assert!(lm.pages_held(t1).is_empty());
        assert!(!lm.holds_lock(t1, pid(0)));
        assert!(!lm.holds_lock(t1, pid(1)));
    }
}
