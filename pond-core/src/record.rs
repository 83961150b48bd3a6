use bytes::Bytes;
use pond_common::Summary;

/// An immutable, arena-resident log record: the raw datagram bytes plus its
/// cheap-stage summary and a strictly increasing id.
///
/// Lives behind `Rc` rather than inside a byte arena: records are held in
/// a byte-budgeted `VecDeque` (see [`crate::arena::AllRecords`]), which
/// gives head-eviction behavior without unsafe placement-new.
#[derive(Debug)]
pub struct Record {
    pub id: u64,
    pub raw: Bytes,
    pub summary: Summary,
}

impl Record {
    /// Fixed per-record bookkeeping overhead charged against the database's
    /// capacity in addition to the raw payload.
    pub const OVERHEAD: usize = 32;

    pub fn byte_size(&self) -> usize {
        self.raw.len() + Self::OVERHEAD
    }

    pub fn is_older_than(&self, t: pond_common::TimePoint) -> bool {
        self.summary.is_older_than(t)
    }
}
