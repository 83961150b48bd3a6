use std::rc::Rc;

use pond_common::{Filter, LogDatagram, UNTIL_GRACE};

use crate::cursor::Cursor;
use crate::list_handle::ListHandle;
use crate::record::Record;

/// A filter-aware cursor over one record list. Tolerates eviction (via
/// [`Cursor`]'s id-based re-resolution) and supports live tailing via
/// `on_append`.
#[derive(Debug, Clone)]
pub struct Selection {
    list: ListHandle,
    filter: Filter,
    cursor: Cursor,
}

impl Selection {
    pub fn new(list: ListHandle, filter: Filter) -> Self {
        Selection {
            list,
            filter,
            cursor: Cursor::Unstarted,
        }
    }

    fn record_matches(&self, record: &Record) -> bool {
        self.filter.matches(&record.summary, || {
            LogDatagram::decode(record.raw.clone()).unwrap_or(LogDatagram {
                timestamp: record.summary.timestamp,
                site: record.summary.site.clone(),
                log_type: record.summary.log_type,
                host: None,
                generator: None,
                http_uri: None,
                http_method: None,
                http_status: None,
                duration: None,
                message: bytes::Bytes::new(),
            })
        })
    }

    fn skip_mismatches_forward(&mut self) {
        loop {
            let record = self.list.with_list(|list| self.cursor.current(list).cloned());
            match record {
                Some(r) if !self.record_matches(&r) => self.list.with_list(|list| self.cursor.advance(list)),
                _ => break,
            }
        }
    }

    fn skip_mismatches_backward(&mut self) {
        while self.is_defined_reverse() {
            let record = self.list.with_list(|list| self.cursor.current(list).cloned());
            match record {
                Some(r) if !self.record_matches(&r) => self.list.with_list(|list| self.cursor.retreat(list)),
                _ => break,
            }
        }
    }

    /// `since`-less reverse iteration is allowed to run past `until` by the
    /// 10 second grace window, to tolerate producer clock jitter.
    fn is_defined_reverse(&self) -> bool {
        let record = self.list.with_list(|list| self.cursor.current(list).cloned());
        match record {
            None => false,
            Some(r) => match r.summary.timestamp {
                None => true,
                Some(ts) => ts.saturating_add(UNTIL_GRACE) >= self.filter.timestamp.since,
            },
        }
    }

    /// Positions the cursor at the start of the matching range: either the
    /// skip-index's lower bound for `filter.timestamp.since`, or the list
    /// head if no `since` is set.
    pub fn rewind(&mut self) {
        debug_assert!(matches!(self.cursor, Cursor::Unstarted));

        if self.filter.timestamp.since != pond_common::TimePoint::MIN {
            let start_id = self.list.with_list(|list| list.lower_bound_id(self.filter.timestamp.since));
            match start_id {
                Some(id) => self.cursor.set_at(id),
                None => {
                    self.cursor.set_end();
                    return;
                }
            }
        } else {
            self.list.with_list(|list| match list.front_id() {
                Some(id) => self.cursor.set_at(id),
                None => self.cursor.set_end(),
            });
        }

        self.skip_mismatches_forward();
    }

    /// Positions the cursor at the last record and scans backward,
    /// implementing `LAST`.
    pub fn seek_last(&mut self) {
        debug_assert!(matches!(self.cursor, Cursor::Unstarted));

        let last_id = self.list.with_list(|list| list.records().back().map(|r| r.id));
        match last_id {
            Some(id) => self.cursor.set_at(id),
            None => return,
        }

        self.skip_mismatches_backward();
    }

    /// Detects eviction via id comparison against the list's current head
    /// and rewinds if the remembered record is gone. Returns `true` if it
    /// rewound.
    pub fn fix_deleted(&mut self) -> bool {
        let evicted = self.list.with_list(|list| self.cursor.was_evicted(list));
        if !evicted {
            return false;
        }
        self.cursor = Cursor::Unstarted;
        self.rewind();
        true
    }

    pub fn advance(&mut self) {
        self.list.with_list(|list| self.cursor.advance(list));
        self.skip_mismatches_forward();
    }

    /// Called synchronously from `Database::emplace`'s fan-out. If this
    /// selection is currently exhausted and the new record matches,
    /// re-anchors the cursor to it and reports a match so the caller can
    /// schedule a write.
    pub fn on_append(&mut self, record: &Rc<Record>) -> bool {
        // No `self.is_defined()` check here: `on_append` runs synchronously
        // from `RecordList::push_back`'s listener fan-out, which fires
        // while the owning `AllRecords`/`PerSite` `RefCell` is still held
        // mutably borrowed by `Database::do_emplace` — reading the list
        // through `self.list.with_list` here would re-borrow that same
        // cell and panic. The caller only keeps a listener registered
        // while its selection is exhausted, so the precondition holds by
        // construction rather than by assertion.
        if !self.record_matches(record) {
            return false;
        }
        self.cursor.set_at(record.id);
        true
    }

    /// `true` while the cursor is on a record still inside the (possibly
    /// grace-extended) `until` window.
    pub fn is_defined(&self) -> bool {
        let record = self.list.with_list(|list| self.cursor.current(list).cloned());
        match record {
            None => false,
            Some(r) => match r.summary.timestamp {
                None => true,
                Some(ts) => ts.saturating_sub(UNTIL_GRACE) <= self.filter.timestamp.until,
            },
        }
    }

    pub fn current(&self) -> Option<Rc<Record>> {
        if !self.is_defined() {
            return None;
        }
        self.list.with_list(|list| self.cursor.current(list).cloned())
    }

    pub fn register_follow(&self, listener: std::rc::Weak<dyn crate::listener::AppendListener>) {
        self.list.with_list_mut(|list| list.register_listener(listener));
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn list_handle(&self) -> &ListHandle {
        &self.list
    }
}
