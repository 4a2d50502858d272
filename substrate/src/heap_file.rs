//! Heap files: one OS file per table, a concatenation of fixed-size
//! pages holding tuples in no particular order.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::buffer_pool::{BufferPool, PageRef, Permissions};
use crate::catalog::DbFile;
use crate::error::StorageError;
use crate::page::HeapPage;
use crate::transaction::TransactionId;
use crate::tuple::{PageId, Tuple, TupleDesc};
use crate::PAGE_SIZE;

/// FNV-1a over the canonical path, folded to 32 bits. Deterministic
/// across processes, so a reopened table keeps its id.
fn table_id_for(path: &Path) -> u32 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in path.as_os_str().as_encoded_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash ^ (hash >> 32)) as u32
}

pub struct HeapFile {
    file: Mutex<File>,
    path: PathBuf,
    desc: TupleDesc,
    id: u32,
    /// Pages this table owns, counting pages allocated in memory that
    /// have not been flushed yet. Seeded from the file length.
    pages: AtomicUsize,
}

impl HeapFile {
    pub fn open<P: AsRef<Path>>(path: P, desc: TupleDesc) -> Result<Self, StorageError> {
        let path_ref = path.as_ref();
        crate::substrate_debug_log!("[HeapFile::open] Opening table file at: {path_ref:?}");
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path_ref)?;

        let canonical = path_ref.canonicalize()?;
        let file_size = file.metadata()?.len() as usize;
        let num_pages = file_size.div_ceil(PAGE_SIZE);
        crate::substrate_debug_log!(
            "[HeapFile::open] File size: {file_size}, initial num_pages: {num_pages}"
        );

        Ok(Self {
            file: Mutex::new(file),
            id: table_id_for(&canonical),
            path: canonical,
            desc,
            pages: AtomicUsize::new(num_pages),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DbFile for HeapFile {
    fn id(&self) -> u32 {
        self.id
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    fn num_pages(&self) -> usize {
        self.pages.load(Ordering::SeqCst)
    }

    fn read_page(&self, pid: PageId) -> Result<HeapPage, StorageError> {
        crate::substrate_debug_log!("[HeapFile::read_page] Reading page {:?}", pid);
        if pid.page_no >= self.num_pages() {
            return Err(StorageError::PageNotFound(pid));
        }

        let mut file = self.file.lock().unwrap();
        let file_pages = (file.metadata()?.len() as usize).div_ceil(PAGE_SIZE);
        if pid.page_no >= file_pages {
            // Allocated in memory, never flushed. Reads as empty.
            return Ok(HeapPage::empty(pid, self.desc.clone()));
        }

        let mut data = vec![0u8; PAGE_SIZE];
        file.seek(SeekFrom::Start((pid.page_no * PAGE_SIZE) as u64))?;
        let bytes_read = file.read(&mut data)?;
        if bytes_read < PAGE_SIZE {
            crate::substrate_debug_log!(
                "[HeapFile::read_page] Read {bytes_read} bytes (less than page size), rest stays zero."
            );
        }
        Ok(HeapPage::new(pid, &data, self.desc.clone()))
    }

    fn write_page(&self, page: &HeapPage) -> Result<(), StorageError> {
        let pid = page.pid();
        crate::substrate_debug_log!("[HeapFile::write_page] Writing page {:?}", pid);
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((pid.page_no * PAGE_SIZE) as u64))?;
        file.write_all(&page.page_data())?;
        file.sync_all()?;
        self.pages.fetch_max(pid.page_no + 1, Ordering::SeqCst);
        Ok(())
    }

    /// Walks pages from highest index to lowest looking for room. Full
    /// pages probed under a READ lock the transaction did not already
    /// hold are released immediately; they will not be in the final
    /// read set. When no page has room, a fresh page is allocated at
    /// the tail and returned unwritten for the buffer pool to install.
    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: Tuple,
    ) -> Result<Vec<PageRef>, StorageError> {
        if tuple.desc() != &self.desc {
            return Err(StorageError::SchemaMismatch);
        }
        for page_no in (0..self.num_pages()).rev() {
            let pid = PageId::new(self.id, page_no);
            let already_held = pool.holds_lock(tid, pid);
            let page = pool.get_page(tid, pid, Permissions::ReadOnly)?;
            let has_room = page.read().unwrap().unused_slots() > 0;
            if has_room {
                let page = pool.get_page(tid, pid, Permissions::ReadWrite)?;
                let mut guard = page.write().unwrap();
                guard.insert_tuple(tuple)?;
                guard.mark_dirty(Some(tid));
                drop(guard);
                return Ok(vec![page]);
            }
            if !already_held {
                pool.unsafe_release_page(tid, pid);
            }
        }

        let page_no = self.pages.fetch_add(1, Ordering::SeqCst);
        let pid = PageId::new(self.id, page_no);
        crate::substrate_debug_log!("[HeapFile::insert_tuple] Allocating fresh page {:?}", pid);
        let mut page = HeapPage::empty(pid, self.desc.clone());
        page.insert_tuple(tuple)?;
        page.mark_dirty(Some(tid));
        Ok(vec![Arc::new(std::sync::RwLock::new(page))])
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageRef>, StorageError> {
        let rid = tuple.record_id().ok_or(StorageError::SchemaMismatch)?;
        if rid.page_id.page_no >= self.num_pages() {
            return Err(StorageError::PageNotFound(rid.page_id));
        }
        let page = pool.get_page(tid, rid.page_id, Permissions::ReadWrite)?;
        let mut guard = page.write().unwrap();
        guard.delete_tuple(tuple)?;
        guard.mark_dirty(Some(tid));
        drop(guard);
        Ok(vec![page])
    }
}

/// Pull iterator over a heap file's tuples. Empty pages are skipped;
/// `rewind` restarts at page 0.
pub struct HeapScan {
    pool: Arc<BufferPool>,
    tid: TransactionId,
    table_id: u32,
    num_pages: usize,
    page_no: usize,
    current: Option<std::vec::IntoIter<Tuple>>,
}

impl HeapScan {
    pub fn new(
        pool: Arc<BufferPool>,
        tid: TransactionId,
        table_id: u32,
        num_pages: usize,
    ) -> Self {
        HeapScan {
            pool,
            tid,
            table_id,
            num_pages,
            page_no: 0,
            current: None,
        }
    }

    pub fn next(&mut self) -> Result<Option<Tuple>, StorageError> {
        loop {
            if let Some(iter) = &mut self.current {
                if let Some(tuple) = iter.next() {
                    return Ok(Some(tuple));
                }
                self.page_no += 1;
                self.current = None;
            }
            if self.page_no >= self.num_pages {
                return Ok(None);
            }
            let pid = PageId::new(self.table_id, self.page_no);
            let page = self.pool.get_page(self.tid, pid, Permissions::ReadOnly)?;
            let tuples: Vec<Tuple> = page.read().unwrap().iter().cloned().collect();
            self.current = Some(tuples.into_iter());
        }
    }

    pub fn rewind(&mut self) {
        self.page_no = 0;
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{Field, Type};
    use tempfile::tempdir;

    fn desc() -> TupleDesc {
        TupleDesc::new(vec![(Type::Int, Some("v".to_string()))])
    }

    fn tuple(v: i32) -> Tuple {
        Tuple::new(desc(), vec![Field::Int(v)]).unwrap()
    }

    #[test]
    fn test_heap_file_page_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.dat");
        let file = HeapFile::open(&path, desc()).unwrap();
        assert_eq!(file.num_pages(), 0);

        let pid = PageId::new(file.id(), 0);
        let mut page = HeapPage::empty(pid, desc());
        page.insert_tuple(tuple(123)).unwrap();
        file.write_page(&page).unwrap();
        assert_eq!(file.num_pages(), 1);

        drop(file);
        let file = HeapFile::open(&path, desc()).unwrap();
        assert_eq!(file.num_pages(), 1);
        let back = file.read_page(PageId::new(file.id(), 0)).unwrap();
        let values: Vec<_> = back.iter().map(|t| t.field(0).clone()).collect();
        assert_eq!(values, vec![Field::Int(123)]);
    }

    #[test]
    fn read_past_end_is_an_error() {
        let dir = tempdir().unwrap();
        let file = HeapFile::open(dir.path().join("t.dat"), desc()).unwrap();
        let result = file.read_page(PageId::new(file.id(), 0));
        assert!(matches!(result, Err(StorageError::PageNotFound(_))));
    }

    #[test]
    fn allocated_but_unflushed_page_reads_empty() {
        let dir = tempdir().unwrap();
        let file = HeapFile::open(dir.path().join("t.dat"), desc()).unwrap();
        file.pages.store(1, Ordering::SeqCst);
        let page = file.read_page(PageId::new(file.id(), 0)).unwrap();
        assert_eq!(page.unused_slots(), page.num_slots());
    }

    #[test]
    fn table_id_is_stable_across_opens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");
        let first = HeapFile::open(&path, desc()).unwrap().id();
        let second = HeapFile::open(&path, desc()).unwrap().id();
        assert_eq!(first, second);

        let other = HeapFile::open(dir.path().join("u.dat"), desc()).unwrap();
        assert_ne!(first, other.id());
    }
}
