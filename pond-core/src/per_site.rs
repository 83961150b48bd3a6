use compact_str::CompactString;

use crate::arena::RecordList;
use crate::token_bucket::{TokenBucket, TokenBucketConfig};

/// A site's non-owning chronological sub-list of the records in
/// [`crate::arena::AllRecords`], plus its own skip index, listener set and
/// rate limiter.
///
/// `PerSite` values live behind `Rc<RefCell<PerSite>>` inside
/// `Database::per_site`; that `Rc` *is* the shared lease — a `Selection`
/// holding a clone of it keeps the entry alive (and out of
/// `compress`/`clear`'s garbage collection) for exactly as long as it is
/// still being read.
#[derive(Debug)]
pub struct PerSite {
    site: CompactString,
    list: RecordList,
    rate_limiter: TokenBucket,
}

impl PerSite {
    pub fn new(site: CompactString, rate_config: TokenBucketConfig, now: f64) -> Self {
        PerSite {
            site,
            list: RecordList::new(),
            rate_limiter: TokenBucket::new(rate_config, now),
        }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn list(&self) -> &RecordList {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut RecordList {
        &mut self.list
    }

    pub fn check_rate_limit(&mut self, config: TokenBucketConfig, now: f64, cost: f64) -> bool {
        self.rate_limiter.check(config, now, cost)
    }

    /// A `PerSite` with no records, no registered listeners, and — checked
    /// by the caller via `Rc::strong_count` — no outstanding lease, may be
    /// collected on `clear`/`compress`.
    pub fn is_expendable(&self) -> bool {
        self.list.is_empty() && self.list.listeners_empty()
    }
}
