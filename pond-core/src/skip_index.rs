use std::collections::VecDeque;

use pond_common::TimePoint;

/// One bucket per `SKIP_COUNT` records, used to accelerate a timestamp
/// lower-bound lookup over a record list without a dense time index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bucket {
    id: u64,
    min_timestamp: TimePoint,
}

/// A sparse, append-only skip index over a chronological record list: one
/// entry every 4096 records, tolerant of producer clock skew by tracking
/// each bucket's minimum timestamp rather than assuming strict
/// monotonicity.
#[derive(Debug, Clone, Default)]
pub struct TimeSkipIndex {
    buckets: VecDeque<Bucket>,
    count_since_last_bucket: u64,
}

/// Records per skip-index bucket.
pub const SKIP_COUNT: u64 = 4096;

impl TimeSkipIndex {
    pub fn new() -> Self {
        TimeSkipIndex::default()
    }

    /// Called once per appended record, in id order.
    pub fn update_on_append(&mut self, id: u64, timestamp: Option<TimePoint>) {
        let Some(timestamp) = timestamp else {
            self.count_since_last_bucket += 1;
            return;
        };

        match self.buckets.back_mut() {
            Some(last) if self.count_since_last_bucket < SKIP_COUNT => {
                if timestamp < last.min_timestamp {
                    last.min_timestamp = timestamp;
                }
                self.count_since_last_bucket += 1;
            }
            _ => {
                self.buckets.push_back(Bucket { id, min_timestamp: timestamp });
                self.count_since_last_bucket = 1;
            }
        }
    }

    /// Must be called before any lookup on a list that may have evicted
    /// records since the index was last consulted.
    pub fn fix_deleted(&mut self, first_live_id: u64) {
        while let Some(front) = self.buckets.front() {
            if front.id < first_live_id {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }

    /// Conservative lower bound: the id of the record to *start scanning
    /// from* (inclusive) such that no record with `timestamp >= t` is
    /// skipped. Linear refinement past this point is the caller's
    /// responsibility (records within a bucket are not strictly ordered
    /// under clock skew).
    pub fn lower_bound(&self, t: TimePoint) -> Option<u64> {
        if self.buckets.is_empty() {
            return None;
        }

        // First bucket whose min_timestamp >= t.
        let idx = self.buckets.partition_point(|b| b.min_timestamp < t);

        if idx == 0 {
            Some(self.buckets[0].id)
        } else if idx >= self.buckets.len() {
            // Every bucket is before t; start at the last bucket and let
            // the caller's linear scan discover there's nothing left.
            Some(self.buckets[self.buckets.len() - 1].id)
        } else {
            // Step back one bucket to absorb within-bucket skew.
            Some(self.buckets[idx - 1].id)
        }
    }

    #[cfg(test)]
    fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
