use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use pond_common::TimePoint;

use crate::listener::{AppendListener, AppendListenerSet};
use crate::record::Record;
use crate::skip_index::TimeSkipIndex;

/// A chronological (id-ordered) list of records plus its own time-skip
/// index and append-listener set. Shared by [`AllRecords`] (which owns the
/// records) and `PerSite` (which only references them).
///
/// Backed by a plain `VecDeque<Rc<Record>>` rather than a fixed-capacity
/// arena: eviction only ever happens at the front, and monotonically
/// increasing ids let a stale cursor detect it without a pointer into
/// freed memory.
#[derive(Debug, Default)]
pub struct RecordList {
    records: VecDeque<Rc<Record>>,
    skip_index: TimeSkipIndex,
    listeners: AppendListenerSet,
}

impl RecordList {
    pub fn new() -> Self {
        RecordList::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn front(&self) -> Option<&Rc<Record>> {
        self.records.front()
    }

    pub fn front_id(&self) -> Option<u64> {
        self.records.front().map(|r| r.id)
    }

    pub fn records(&self) -> &VecDeque<Rc<Record>> {
        &self.records
    }

    /// Appends a record already known to belong to this list (id must be
    /// greater than every id currently in it), updating the skip index and
    /// firing append listeners synchronously, before returning — matching
    /// the "visible on the same turn" ordering guarantee.
    pub fn push_back(&mut self, record: Rc<Record>) {
        self.skip_index.update_on_append(record.id, record.summary.timestamp);
        self.listeners.fire(&record);
        self.records.push_back(record);
    }

    pub fn pop_front(&mut self) -> Option<Rc<Record>> {
        let popped = self.records.pop_front();
        match self.records.front() {
            Some(first) => self.skip_index.fix_deleted(first.id),
            None => self.skip_index = TimeSkipIndex::new(),
        }
        popped
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.skip_index = TimeSkipIndex::new();
    }

    /// Binary search by id; the list is always id-ordered.
    pub fn position_of(&self, id: u64) -> Result<usize, usize> {
        self.records.binary_search_by_key(&id, |r| r.id)
    }

    pub fn lower_bound_id(&self, since: TimePoint) -> Option<u64> {
        self.skip_index.lower_bound(since)
    }

    pub fn register_listener(&mut self, listener: Weak<dyn AppendListener>) {
        self.listeners.register(listener);
    }

    pub fn listeners_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

/// The chronological primary list: owns every record currently held by the
/// database and enforces the byte-capacity budget by evicting from the
/// front.
#[derive(Debug)]
pub struct AllRecords {
    list: RecordList,
    byte_usage: usize,
    capacity: usize,
}

impl AllRecords {
    pub fn new(capacity: usize) -> Self {
        AllRecords {
            list: RecordList::new(),
            byte_usage: 0,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn byte_usage(&self) -> usize {
        self.byte_usage
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn list(&self) -> &RecordList {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut RecordList {
        &mut self.list
    }

    /// Evicts from the front until `additional_size` more bytes fit,
    /// returning the evicted records in eviction (oldest-first) order so
    /// the caller can detach them from their `PerSite` lists too.
    ///
    /// A single record larger than the whole arena is a protocol error,
    /// not evicted; the caller is expected to have rejected it already.
    pub fn evict_to_fit(&mut self, additional_size: usize) -> Vec<Rc<Record>> {
        let mut evicted = Vec::new();
        while self.byte_usage + additional_size > self.capacity {
            let Some(front) = self.list.pop_front() else {
                break;
            };
            self.byte_usage -= front.byte_size();
            evicted.push(front);
        }
        evicted
    }

    pub fn push_back(&mut self, record: Rc<Record>) {
        self.byte_usage += record.byte_size();
        self.list.push_back(record);
    }

    /// Pops records from the front while they're older than `t` (or have no
    /// timestamp at all), returning them in eviction order so the caller
    /// can detach them from their `PerSite` lists too.
    pub fn delete_older_than(&mut self, t: TimePoint) -> Vec<Rc<Record>> {
        let mut removed = Vec::new();
        while let Some(front) = self.list.front() {
            if front.is_older_than(t) {
                let popped = self.list.pop_front().unwrap();
                self.byte_usage -= popped.byte_size();
                removed.push(popped);
            } else {
                break;
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        self.list.clear();
        self.byte_usage = 0;
    }
}
