//! The buffer pool caches pages in memory and mediates every page
//! access. It is also where locking happens: fetching a page first
//! acquires the matching transaction lock, so a caller holding a
//! `PageRef` is covered for the access mode it asked for.
//!
//! Eviction is FIFO over clean pages only. Dirty pages never leave the
//! cache before their transaction commits (NO STEAL); when everything
//! cached is dirty, fetching an uncached page fails.

use crate::catalog::{Catalog, DbFile};
use crate::error::StorageError;
use crate::lock_manager::LockManager;
use crate::page::HeapPage;
use crate::transaction::TransactionId;
use crate::tuple::{PageId, Tuple};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

/// Pages are shared between the cache and the operators using them;
/// the transaction lock held through the pool makes that sound.
pub type PageRef = Arc<RwLock<HeapPage>>;

/// Access mode requested from `get_page`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

#[derive(Default)]
struct PageCache {
    pages: HashMap<PageId, PageRef>,
    /// Insertion order, the eviction scan order.
    order: VecDeque<PageId>,
}

impl PageCache {
    fn install(&mut self, pid: PageId, page: PageRef) {
        self.pages.insert(pid, page);
        self.order.push_back(pid);
    }

    fn remove(&mut self, pid: PageId) {
        self.pages.remove(&pid);
        if let Some(index) = self.order.iter().position(|p| *p == pid) {
            self.order.remove(index);
        }
    }

    /// Evicts the first clean page in insertion order. Clean pages
    /// match their on-disk bytes, so nothing is written back.
    fn evict_one(&mut self) -> Result<(), StorageError> {
        let victim = self
            .order
            .iter()
            .position(|pid| {
                self.pages
                    .get(pid)
                    .is_some_and(|page| page.read().unwrap().dirtied_by().is_none())
            })
            .ok_or(StorageError::NoEvictablePage)?;
        let pid = self.order.remove(victim).expect("victim index is in range");
        crate::substrate_debug_log!("[BufferPool] Evicting clean page {:?}", pid);
        self.pages.remove(&pid);
        Ok(())
    }
}

pub struct BufferPool {
    catalog: Arc<Catalog>,
    lock_manager: LockManager,
    capacity: usize,
    cache: Mutex<PageCache>,
}

impl BufferPool {
    pub const DEFAULT_CAPACITY: usize = 50;

    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_capacity(catalog, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(catalog: Arc<Catalog>, capacity: usize) -> Self {
        Self {
            catalog,
            lock_manager: LockManager::new(),
            capacity,
            cache: Mutex::new(PageCache::default()),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Fetches a page, acquiring a WRITE lock for `ReadWrite` and a
    /// READ lock for `ReadOnly` first. May block up to the lock
    /// timeout; a timeout aborts the transaction. Cache misses read
    /// through the table's file, evicting a clean page when full.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> Result<PageRef, StorageError> {
        match perm {
            Permissions::ReadWrite => self.lock_manager.acquire_exclusive(tid, pid)?,
            Permissions::ReadOnly => self.lock_manager.acquire_shared(tid, pid)?,
        }

        let mut cache = self.cache.lock().unwrap();
        if let Some(page) = cache.pages.get(&pid) {
            return Ok(Arc::clone(page));
        }
        if cache.pages.len() >= self.capacity {
            cache.evict_one()?;
        }
        let file = self.catalog.db_file(pid.table_id)?;
        let page = Arc::new(RwLock::new(file.read_page(pid)?));
        cache.install(pid, Arc::clone(&page));
        Ok(page)
    }

    /// Releases one lock before transaction end. This breaks two-phase
    /// locking; the only sanctioned caller is the insert path shedding
    /// READ locks on full pages it probed.
    pub fn unsafe_release_page(&self, tid: TransactionId, pid: PageId) {
        self.lock_manager.release(tid, pid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds_lock(tid, pid)
    }

    /// Ends a transaction. Commit flushes every page it dirtied and
    /// clears the marks; abort discards its dirty pages from the cache
    /// so the on-disk versions are re-read later. Both release all of
    /// the transaction's locks.
    pub fn transaction_complete(
        &self,
        tid: TransactionId,
        commit: bool,
    ) -> Result<(), StorageError> {
        if commit {
            self.flush_pages(tid)?;
        } else {
            let held = self.lock_manager.pages_held(tid);
            let mut cache = self.cache.lock().unwrap();
            for pid in held {
                let dirtied_by_tid = cache
                    .pages
                    .get(&pid)
                    .is_some_and(|page| page.read().unwrap().dirtied_by() == Some(tid));
                if dirtied_by_tid {
                    crate::substrate_debug_log!(
                        "[BufferPool] Discarding page {:?} dirtied by aborted tx {}",
                        pid,
                        tid.id()
                    );
                    cache.remove(pid);
                }
            }
        }
        self.lock_manager.release_all(tid);
        Ok(())
    }

    /// Routes an insert to the table's file and installs every dirtied
    /// page the file handed back that is not cached yet, taking a
    /// WRITE lock on it. This is how a freshly created page enters the
    /// cache; at capacity a clean page is evicted first.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: u32,
        tuple: Tuple,
    ) -> Result<(), StorageError> {
        let file = self.catalog.db_file(table_id)?;
        let dirtied = file.insert_tuple(self, tid, tuple)?;
        for page in dirtied {
            let pid = page.read().unwrap().pid();
            let mut cache = self.cache.lock().unwrap();
            if cache.pages.contains_key(&pid) {
                continue;
            }
            if cache.pages.len() >= self.capacity {
                cache.evict_one()?;
            }
            cache.install(pid, Arc::clone(&page));
            drop(cache);
            self.lock_manager.acquire_exclusive(tid, pid)?;
        }
        Ok(())
    }

    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<(), StorageError> {
        let rid = tuple.record_id().ok_or(StorageError::SchemaMismatch)?;
        let file = self.catalog.db_file(rid.page_id.table_id)?;
        file.delete_tuple(self, tid, tuple)?;
        Ok(())
    }

    /// Writes every dirty cached page out and clears its mark. This
    /// writes uncommitted data, so it breaks NO STEAL; it exists for
    /// orderly shutdown.
    pub fn flush_all_pages(&self) -> Result<(), StorageError> {
        let cache = self.cache.lock().unwrap();
        for page in cache.pages.values() {
            let dirty = page.read().unwrap().dirtied_by().is_some();
            if dirty {
                let guard = page.read().unwrap();
                let file = self.catalog.db_file(guard.pid().table_id)?;
                file.write_page(&guard)?;
                drop(guard);
                page.write().unwrap().mark_dirty(None);
            }
        }
        Ok(())
    }

    /// Writes every page dirtied by `tid` and clears its mark.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<(), StorageError> {
        let cache = self.cache.lock().unwrap();
        for page in cache.pages.values() {
            let dirtied_by_tid = page.read().unwrap().dirtied_by() == Some(tid);
            if dirtied_by_tid {
                let guard = page.read().unwrap();
                let file = self.catalog.db_file(guard.pid().table_id)?;
                file.write_page(&guard)?;
                drop(guard);
                page.write().unwrap().mark_dirty(None);
            }
        }
        Ok(())
    }

    /// Writes one cached page to its file. No-op if the page is not
    /// cached; the dirty mark is left untouched.
    pub fn flush_page(&self, pid: PageId) -> Result<(), StorageError> {
        let cache = self.cache.lock().unwrap();
        if let Some(page) = cache.pages.get(&pid) {
            let guard = page.read().unwrap();
            let file = self.catalog.db_file(pid.table_id)?;
            file.write_page(&guard)?;
        }
        Ok(())
    }

    /// Drops a page from the cache without writing it.
    pub fn remove_page(&self, pid: PageId) {
        self.cache.lock().unwrap().remove(pid);
    }
}
