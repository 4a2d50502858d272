//! Heap page layout.
//!
//! A heap page is `PAGE_SIZE` bytes: a header bitmap of
//! `ceil(num_slots / 8)` bytes (bit i set iff slot i holds a live
//! tuple) followed by `num_slots` fixed-width tuple records. Trailing
//! bytes that cannot fit another slot are zero padding.
//!
//! `num_slots = floor(PAGE_SIZE * 8 / (tuple_width * 8 + 1))`: each
//! slot costs its record width plus one header bit.

use crate::error::StorageError;
use crate::transaction::TransactionId;
use crate::tuple::{PageId, RecordId, Tuple, TupleDesc};
use crate::PAGE_SIZE;

#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: PageId,
    desc: TupleDesc,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirty: Option<TransactionId>,
}

impl HeapPage {
    /// Number of tuple slots a page of this schema holds.
    pub fn slots_per_page(desc: &TupleDesc) -> usize {
        (PAGE_SIZE * 8) / (desc.byte_len() * 8 + 1)
    }

    fn header_len(num_slots: usize) -> usize {
        num_slots.div_ceil(8)
    }

    /// Parses a page image. Well-formed images of `PAGE_SIZE` bytes
    /// always parse; slots whose header bit is clear are never read.
    pub fn new(pid: PageId, data: &[u8], desc: TupleDesc) -> HeapPage {
        let num_slots = Self::slots_per_page(&desc);
        let header_len = Self::header_len(num_slots);
        let width = desc.byte_len();

        let header = data[..header_len].to_vec();
        let mut tuples = Vec::with_capacity(num_slots);
        for slot in 0..num_slots {
            if header[slot / 8] >> (slot % 8) & 1 == 1 {
                let offset = header_len + slot * width;
                let mut tuple = Tuple::read_from(&desc, &data[offset..offset + width]);
                tuple.set_record_id(Some(RecordId::new(pid, slot)));
                tuples.push(Some(tuple));
            } else {
                tuples.push(None);
            }
        }

        HeapPage {
            pid,
            desc,
            header,
            tuples,
            dirty: None,
        }
    }

    /// An all-zero page image: empty header, no live slots.
    pub fn empty_page_data() -> Vec<u8> {
        vec![0; PAGE_SIZE]
    }

    /// A fresh page with every slot unused.
    pub fn empty(pid: PageId, desc: TupleDesc) -> HeapPage {
        Self::new(pid, &Self::empty_page_data(), desc)
    }

    pub fn pid(&self) -> PageId {
        self.pid
    }

    pub fn desc(&self) -> &TupleDesc {
        &self.desc
    }

    pub fn num_slots(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        self.header[slot / 8] >> (slot % 8) & 1 == 1
    }

    /// Count of zero bits in the header.
    pub fn unused_slots(&self) -> usize {
        (0..self.num_slots()).filter(|&s| !self.is_slot_used(s)).count()
    }

    fn set_slot(&mut self, slot: usize, used: bool) {
        if used {
            self.header[slot / 8] |= 1 << (slot % 8);
        } else {
            self.header[slot / 8] &= !(1 << (slot % 8));
        }
    }

    /// Stores the tuple in the lowest-indexed unused slot and stamps
    /// its record id.
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> Result<(), StorageError> {
        if tuple.desc() != &self.desc {
            return Err(StorageError::SchemaMismatch);
        }
        let slot = (0..self.num_slots())
            .find(|&s| !self.is_slot_used(s))
            .ok_or(StorageError::PageFull)?;
        self.set_slot(slot, true);
        tuple.set_record_id(Some(RecordId::new(self.pid, slot)));
        self.tuples[slot] = Some(tuple);
        Ok(())
    }

    /// Clears the slot named by the tuple's record id. The tuple must
    /// live on this page and its slot must be in use.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<(), StorageError> {
        let rid = tuple.record_id().ok_or(StorageError::SchemaMismatch)?;
        if rid.page_id != self.pid {
            return Err(StorageError::PageNotFound(rid.page_id));
        }
        if !self.is_slot_used(rid.slot) {
            return Err(StorageError::SlotEmpty(self.pid, rid.slot));
        }
        self.set_slot(rid.slot, false);
        self.tuples[rid.slot] = None;
        Ok(())
    }

    pub fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        self.dirty = tid;
    }

    /// The transaction that last wrote this page, if it is dirty.
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirty
    }

    /// Tuples of used slots in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().filter_map(|t| t.as_ref())
    }

    /// Serializes back to exactly `PAGE_SIZE` bytes. Unused slots
    /// serialize as zeroes, so empty-page round trips are identity.
    pub fn page_data(&self) -> Vec<u8> {
        let width = self.desc.byte_len();
        let mut data = Vec::with_capacity(PAGE_SIZE);
        data.extend_from_slice(&self.header);
        for tuple in &self.tuples {
            match tuple {
                Some(t) => t.serialize(&mut data),
                None => data.extend(std::iter::repeat(0u8).take(width)),
            }
        }
        data.resize(PAGE_SIZE, 0);
        data
    }
}
