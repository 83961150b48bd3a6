use compact_str::CompactString;

use crate::log_type::LogType;
use crate::time::TimePoint;

/// The cheap-stage fields of a [`crate::datagram::LogDatagram`], extracted
/// once at `Database::emplace` time and stored alongside the raw bytes so
/// that site/type/timestamp filtering never needs a full re-parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub timestamp: Option<TimePoint>,
    pub site: Option<CompactString>,
    pub log_type: LogType,
}

impl Summary {
    pub fn is_older_than(&self, t: TimePoint) -> bool {
        match self.timestamp {
            Some(ts) => ts < t,
            // A record with no timestamp is treated as "old" by
            // `delete_older_than`, matching `IsOlderThanOrUnknown`.
            None => true,
        }
    }
}
