//! Process-wide state: the database, both clocks, ingest counters, and the
//! single blocking-operation slot that CLONE/AutoClone occupy exclusively.
//! Event loop plumbing, Zeroconf, and systemd integration live elsewhere.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use pond_common::proto::PondStatsPayload;
use pond_common::TimePoint;
use pond_core::{Database, Stats, SteadyClock, SystemClock};
use tokio_util::sync::CancellationToken;

use crate::admin::is_local_admin;

/// What currently occupies the one administrative slot: a local CLONE, or
/// startup AutoClone replication. While occupied, new CLONE requests and a
/// fresh AutoClone are both refused, and ingest is suppressed.
pub struct BlockingOperation {
    pub cancel: CancellationToken,
}

pub struct Instance {
    pub database: RefCell<Database>,
    steady_clock: Box<dyn SteadyClock>,
    system_clock: Box<dyn SystemClock>,
    stats: Cell<Stats>,
    blocking: RefCell<Option<BlockingOperation>>,
    pub max_age: Option<Duration>,
    server_uid: u32,
}

impl Instance {
    pub fn new(
        database: Database,
        steady_clock: Box<dyn SteadyClock>,
        system_clock: Box<dyn SystemClock>,
        max_age: Option<Duration>,
        server_uid: u32,
    ) -> Self {
        Instance {
            database: RefCell::new(database),
            steady_clock,
            system_clock,
            stats: Cell::new(Stats::default()),
            blocking: RefCell::new(None),
            max_age,
            server_uid,
        }
    }

    pub fn steady_now(&self) -> f64 {
        self.steady_clock.now_seconds()
    }

    pub fn steady_clock(&self) -> &dyn SteadyClock {
        self.steady_clock.as_ref()
    }

    pub fn system_now(&self) -> TimePoint {
        self.system_clock.now()
    }

    /// Accounts for one UDP datagram's fate, mirroring
    /// `Instance::OnUdpDatagram`'s counting: received is incremented for
    /// every datagram that reaches the database (truncated datagrams never
    /// get here at all — the receiver counts those as malformed directly),
    /// then malformed/discarded depending on outcome.
    pub fn record_emplace_outcome(&self, outcome: &Result<Option<std::rc::Rc<pond_core::Record>>, pond_core::EmplaceError>) {
        let mut stats = self.stats.get();
        stats.n_received += 1;
        match outcome {
            Err(_) => stats.n_malformed += 1,
            Ok(None) => stats.n_discarded += 1,
            Ok(Some(_)) => {}
        }
        self.stats.set(stats);
    }

    pub fn record_truncated(&self) {
        let mut stats = self.stats.get();
        stats.n_received += 1;
        stats.n_malformed += 1;
        self.stats.set(stats);
    }

    pub fn stats_payload(&self) -> PondStatsPayload {
        let db = self.database.borrow();
        let stats = self.stats.get();
        PondStatsPayload {
            memory_capacity: db.memory_capacity() as u64,
            memory_usage: db.memory_usage() as u64,
            n_records: db.record_count() as u64,
            n_received: stats.n_received,
            n_malformed: stats.n_malformed,
            n_discarded: stats.n_discarded,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocking.borrow().is_some()
    }

    pub fn is_local_admin(&self, peer_uid: Option<crate::admin::PeerCredentials>) -> bool {
        is_local_admin(peer_uid, self.server_uid)
    }

    /// Claims the single administrative slot, or returns `None` if it is
    /// already occupied (`Already-blocked` in the error-handling design).
    pub fn try_begin_blocking(&self) -> Option<CancellationToken> {
        let mut slot = self.blocking.borrow_mut();
        if slot.is_some() {
            return None;
        }
        let cancel = CancellationToken::new();
        *slot = Some(BlockingOperation { cancel: cancel.clone() });
        Some(cancel)
    }

    pub fn end_blocking(&self) {
        *self.blocking.borrow_mut() = None;
    }

    /// `CANCEL_OPERATION`: ask whatever blocking operation is running to
    /// stop. A no-op if nothing is running.
    pub fn cancel_blocking_operation(&self) {
        if let Some(op) = self.blocking.borrow().as_ref() {
            op.cancel.cancel();
        }
    }
}
