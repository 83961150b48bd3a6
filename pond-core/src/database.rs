//! `Database` owns the arena-backed primary record list plus the per-site
//! secondary indexes, and is the single entry point the server talks to:
//! append, eviction, selection.

use std::cell::RefCell;
use std::rc::Rc;

use bytes::Bytes;
use compact_str::CompactString;
use indexmap::IndexMap;
use pond_common::{Filter, LogDatagram, TimePoint};

use crate::arena::AllRecords;
use crate::clock::SteadyClock;
use crate::error::EmplaceError;
use crate::list_handle::ListHandle;
use crate::per_site::PerSite;
use crate::record::Record;
use crate::selection::Selection;
use crate::token_bucket::TokenBucketConfig;

/// A position into `Database::per_site`'s insertion-ordered map, used by
/// `GROUP_SITE` to walk all observed sites in the order they first
/// appeared. Stable only as long as no site is removed from underneath it
/// — the server never removes sites mid-query, since `compress`/`clear`
/// don't run concurrently with request handling on the single-threaded
/// event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteHandle(usize);

pub struct Database {
    all_records: Rc<RefCell<AllRecords>>,
    per_site: IndexMap<CompactString, Rc<RefCell<PerSite>>>,
    rate_limit: TokenBucketConfig,
    last_id: u64,
}

impl Database {
    pub fn new(capacity: usize, rate_limit: TokenBucketConfig) -> Self {
        Database {
            all_records: Rc::new(RefCell::new(AllRecords::new(capacity))),
            per_site: IndexMap::new(),
            rate_limit,
            last_id: 0,
        }
    }

    pub fn memory_capacity(&self) -> usize {
        self.all_records.borrow().capacity()
    }

    pub fn memory_usage(&self) -> usize {
        self.all_records.borrow().byte_usage()
    }

    pub fn record_count(&self) -> usize {
        self.all_records.borrow().len()
    }

    fn get_or_create_per_site(&mut self, site: &str, now: f64) -> Rc<RefCell<PerSite>> {
        if let Some(existing) = self.per_site.get(site) {
            return existing.clone();
        }
        let entry = Rc::new(RefCell::new(PerSite::new(CompactString::from(site), self.rate_limit, now)));
        self.per_site.insert(CompactString::from(site), entry.clone());
        entry
    }

    fn detach_from_site(&mut self, record: &Rc<Record>) {
        let Some(site) = &record.summary.site else { return };
        if let Some(per_site) = self.per_site.get(site.as_str()) {
            let popped = per_site.borrow_mut().list_mut().pop_front();
            debug_assert_eq!(popped.map(|r| r.id), Some(record.id));
        }
    }

    /// Unconditional insert: parses `raw`, evicts to make room, appends.
    /// Never rate-limited; used by `INJECT_LOG_RECORD` and CLONE replay.
    pub fn emplace(&mut self, raw: Bytes) -> Result<Rc<Record>, EmplaceError> {
        self.do_emplace(raw, None).map(|r| r.expect("unconditional emplace always commits"))
    }

    /// As `emplace`, but if a per-site message rate limit is configured and
    /// the record is a rate-limited kind (`LogType::HttpError`) with a
    /// known site, the record is dropped (returning `Ok(None)`) rather than
    /// committed when that site's token bucket is empty. Eviction to make
    /// room still happens before the rate-limit check runs, matching
    /// `Arena::check_emplace_back`'s precheck-after-evict ordering.
    pub fn check_emplace(&mut self, raw: Bytes, clock: &dyn SteadyClock) -> Result<Option<Rc<Record>>, EmplaceError> {
        if !self.rate_limit.is_enabled() {
            return self.emplace(raw).map(Some);
        }
        self.do_emplace(raw, Some(clock))
    }

    fn do_emplace(&mut self, raw: Bytes, clock: Option<&dyn SteadyClock>) -> Result<Option<Rc<Record>>, EmplaceError> {
        let datagram = LogDatagram::decode(raw.clone())?;
        let summary = datagram.summary();

        let byte_size = raw.len() + Record::OVERHEAD;
        if byte_size > self.all_records.borrow().capacity() {
            return Err(EmplaceError::TooLargeForArena(byte_size));
        }

        let evicted = self.all_records.borrow_mut().evict_to_fit(byte_size);
        for e in &evicted {
            self.detach_from_site(e);
        }

        if let Some(clock) = clock {
            if summary.log_type.is_rate_limited_kind() {
                if let Some(site) = &summary.site {
                    let now = clock.now_seconds();
                    let per_site = self.get_or_create_per_site(site, now);
                    let allowed = per_site.borrow_mut().check_rate_limit(self.rate_limit, now, 1.0);
                    if !allowed {
                        return Ok(None);
                    }
                }
            }
        }

        self.last_id += 1;
        let record = Rc::new(Record {
            id: self.last_id,
            raw,
            summary,
        });
        self.all_records.borrow_mut().push_back(record.clone());

        if let Some(site) = &record.summary.site {
            let now = clock.map(|c| c.now_seconds()).unwrap_or(0.0);
            let per_site = self.get_or_create_per_site(site, now);
            per_site.borrow_mut().list_mut().push_back(record.clone());
        }

        Ok(Some(record))
    }

    fn list_for_filter(&mut self, filter: &mut Filter, now: f64) -> ListHandle {
        if let Some(site) = filter.single_site().cloned() {
            // The per-site list is already filtered for site; dropping it
            // from the filter avoids a redundant check on every record.
            filter.sites.clear();
            ListHandle::Site(self.get_or_create_per_site(site.as_str(), now))
        } else {
            ListHandle::All(self.all_records.clone())
        }
    }

    pub fn select(&mut self, filter: Filter, now: f64) -> Selection {
        let mut filter = filter;
        let list = self.list_for_filter(&mut filter, now);
        let mut selection = Selection::new(list, filter);
        selection.rewind();
        selection
    }

    /// As `select`, but anchored past-the-end and with a follow listener
    /// ready to be registered by the caller (the append listener itself is
    /// owned by whatever drives the connection, so it registers on the
    /// returned selection's list rather than here).
    pub fn follow(&mut self, filter: Filter, now: f64) -> Selection {
        let mut filter = filter;
        let list = self.list_for_filter(&mut filter, now);
        Selection::new(list, filter)
    }

    /// First observed site, in insertion order, skipping the first `skip`.
    pub fn get_first_site(&self, skip: usize) -> Option<SiteHandle> {
        if skip < self.per_site.len() {
            Some(SiteHandle(skip))
        } else {
            None
        }
    }

    pub fn get_next_site(&self, site: SiteHandle) -> Option<SiteHandle> {
        let next = site.0 + 1;
        if next < self.per_site.len() {
            Some(SiteHandle(next))
        } else {
            None
        }
    }

    pub fn site_name(&self, site: SiteHandle) -> Option<&str> {
        self.per_site.get_index(site.0).map(|(k, _)| k.as_str())
    }

    /// Builds a `Selection` scoped to one site, for `GROUP_SITE`. `filter`
    /// must not already name a site (callers clear `filter.sites` before
    /// this).
    pub fn select_at_site(&self, site: SiteHandle, filter: Filter) -> Option<Selection> {
        debug_assert!(filter.sites.is_empty());
        let per_site = self.per_site.get_index(site.0).map(|(_, v)| v.clone())?;
        let mut selection = Selection::new(ListHandle::Site(per_site), filter);
        selection.rewind();
        Some(selection)
    }

    pub fn delete_older_than(&mut self, t: TimePoint) {
        let evicted = self.all_records.borrow_mut().delete_older_than(t);
        for e in &evicted {
            self.detach_from_site(e);
        }
    }

    /// Shrinks skip-index deques (implicitly, by reconstructing them
    /// lazily as entries are trimmed) and drops sites with no records, no
    /// listeners, and no outstanding `Selection` lease.
    pub fn compress(&mut self) {
        self.per_site.retain(|_, v| !is_expendable(v));
    }

    pub fn clear(&mut self) {
        for per_site in self.per_site.values() {
            per_site.borrow_mut().list_mut().clear();
        }
        self.all_records.borrow_mut().clear();
        self.per_site.retain(|_, v| !is_expendable(v));
    }
}

fn is_expendable(per_site: &Rc<RefCell<PerSite>>) -> bool {
    Rc::strong_count(per_site) == 1 && per_site.borrow().is_expendable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pond_common::{HttpMethod, LogType, Micros};

    fn datagram(site: Option<&str>, log_type: LogType, ts: u64) -> Bytes {
        let d = LogDatagram {
            timestamp: Some(TimePoint::from_micros(ts)),
            site: site.map(CompactString::from),
            log_type,
            host: None,
            generator: None,
            http_uri: None,
            http_method: Some(HttpMethod::Get),
            http_status: None,
            duration: Some(Micros::from_micros(1)),
            message: Bytes::new(),
        };
        d.to_bytes()
    }

    fn small_record(id_seed: u64) -> Bytes {
        datagram(None, LogType::HttpAccess, id_seed)
    }

    #[test]
    fn ids_strictly_increase() {
        let mut db = Database::new(1 << 20, TokenBucketConfig { rate: -1.0 });
        let r1 = db.emplace(small_record(1)).unwrap();
        let r2 = db.emplace(small_record(2)).unwrap();
        assert!(r1.id < r2.id);
    }

    #[test]
    fn arena_evicts_oldest_first_under_capacity() {
        // Arena sized for a handful of ~40 byte records.
        let mut db = Database::new(300, TokenBucketConfig { rate: -1.0 });
        let mut last = None;
        for ts in 1..=20u64 {
            last = Some(db.emplace(datagram(None, LogType::HttpAccess, ts)).unwrap());
        }
        assert!(db.memory_usage() <= db.memory_capacity());
        assert_eq!(last.unwrap().summary.timestamp, Some(TimePoint::from_micros(20)));
        // The earliest records must have been evicted.
        assert!(db.record_count() < 20);
    }

    #[test]
    fn rate_limit_throttles_http_error_per_site_independently() {
        let clock = crate::clock::MockClock::new(0.0, TimePoint::MIN);
        let mut db = Database::new(1 << 20, TokenBucketConfig { rate: 10.0 });

        // Non-message records are never rate-limited.
        for ts in 0..256u64 {
            assert!(db.check_emplace(datagram(None, LogType::HttpAccess, ts), &clock).unwrap().is_some());
        }

        for _ in 0..10 {
            assert!(db
                .check_emplace(datagram(Some("foo"), LogType::HttpError, 0), &clock)
                .unwrap()
                .is_some());
        }
        assert!(db
            .check_emplace(datagram(Some("foo"), LogType::HttpError, 0), &clock)
            .unwrap()
            .is_none());

        // Independent bucket for a different site.
        assert!(db
            .check_emplace(datagram(Some("bar"), LogType::HttpError, 0), &clock)
            .unwrap()
            .is_some());

        clock.advance_seconds(1.0);
        for _ in 0..10 {
            assert!(db
                .check_emplace(datagram(Some("foo"), LogType::HttpError, 0), &clock)
                .unwrap()
                .is_some());
        }
        assert!(db
            .check_emplace(datagram(Some("foo"), LogType::HttpError, 0), &clock)
            .unwrap()
            .is_none());
    }

    #[test]
    fn single_site_filter_selects_only_that_sites_records() {
        let mut db = Database::new(1 << 20, TokenBucketConfig { rate: -1.0 });
        db.emplace(datagram(Some("a"), LogType::HttpAccess, 1)).unwrap();
        db.emplace(datagram(Some("b"), LogType::HttpAccess, 2)).unwrap();
        db.emplace(datagram(Some("a"), LogType::HttpAccess, 3)).unwrap();
        db.emplace(datagram(Some("c"), LogType::HttpAccess, 4)).unwrap();

        let mut filter = Filter::default();
        filter.sites.insert("b".into());
        let selection = db.select(filter, 0.0);
        let record = selection.current().unwrap();
        assert_eq!(record.summary.site.as_deref(), Some("b"));
    }

    #[test]
    fn group_site_pagination_starts_at_the_nth_non_empty_site() {
        let mut db = Database::new(1 << 20, TokenBucketConfig { rate: -1.0 });
        for (site, ts) in [("a", 1), ("a", 2), ("b", 3), ("b", 4), ("c", 5), ("c", 6)] {
            db.emplace(datagram(Some(site), LogType::HttpAccess, ts)).unwrap();
        }

        let first = db.get_first_site(1).unwrap();
        assert_eq!(db.site_name(first), Some("b"));

        let selection = db.select_at_site(first, Filter::default()).unwrap();
        let record = selection.current().unwrap();
        assert_eq!(record.summary.site.as_deref(), Some("b"));
    }

    #[test]
    fn delete_older_than_is_idempotent() {
        let mut db = Database::new(1 << 20, TokenBucketConfig { rate: -1.0 });
        for ts in 1..=10u64 {
            db.emplace(datagram(None, LogType::HttpAccess, ts)).unwrap();
        }
        db.delete_older_than(TimePoint::from_micros(5));
        let count_after_first = db.record_count();
        db.delete_older_than(TimePoint::from_micros(5));
        assert_eq!(db.record_count(), count_after_first);
    }

    #[test]
    fn clear_is_a_no_op_after_first() {
        let mut db = Database::new(1 << 20, TokenBucketConfig { rate: -1.0 });
        db.emplace(datagram(Some("a"), LogType::HttpAccess, 1)).unwrap();
        db.clear();
        assert_eq!(db.record_count(), 0);
        db.clear();
        assert_eq!(db.record_count(), 0);
    }

    #[test]
    fn compress_collects_empty_sites_with_no_outstanding_lease() {
        let mut db = Database::new(1 << 20, TokenBucketConfig { rate: -1.0 });
        let filter = {
            let mut f = Filter::default();
            f.sites.insert("ghost".into());
            f
        };
        // select() on a never-seen site creates an (empty) PerSite entry.
        let selection = db.select(filter, 0.0);
        drop(selection);
        db.compress();
        assert!(db.get_first_site(0).is_none());
    }
}
