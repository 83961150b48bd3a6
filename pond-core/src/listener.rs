use std::rc::{Rc, Weak};

use crate::record::Record;

/// Registered on a record list to be invoked when a new record arrives.
/// Implemented by whatever owns a follow/continue `Selection` (a
/// `Connection`, in `pond-server`).
pub trait AppendListener {
    /// Returns `true` if the record matched and the listener should be
    /// removed (it re-registers itself after draining, per the
    /// one-pending-record-per-connection backpressure rule), `false` to
    /// stay registered.
    fn on_append(&self, record: &Rc<Record>) -> bool;
}

/// An unordered bag of listeners. Holding only `Weak` references means a
/// listener's owner dropping it is exactly "self-unregister on
/// destruction" — no explicit unlink call needed.
#[derive(Default)]
pub struct AppendListenerSet {
    listeners: Vec<Weak<dyn AppendListener>>,
}

impl AppendListenerSet {
    pub fn new() -> Self {
        AppendListenerSet::default()
    }

    pub fn register(&mut self, listener: Weak<dyn AppendListener>) {
        self.listeners.push(listener);
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.iter().all(|l| l.strong_count() == 0)
    }

    /// Fans the new record out to every live listener, dropping dead weak
    /// refs and listeners that returned `true` in the same pass. Tolerant
    /// of a listener destroying itself mid-iteration.
    pub fn fire(&mut self, record: &Rc<Record>) {
        self.listeners.retain(|weak| match weak.upgrade() {
            None => false,
            Some(listener) => !listener.on_append(record),
        });
    }
}

impl std::fmt::Debug for AppendListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendListenerSet")
            .field("len", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pond_common::{LogType, Summary};
    use std::cell::Cell;

    struct CountingListener {
        calls: Cell<u32>,
        keep_registered: bool,
    }

    impl AppendListener for CountingListener {
        fn on_append(&self, _record: &Rc<Record>) -> bool {
            self.calls.set(self.calls.get() + 1);
            !self.keep_registered
        }
    }

    fn record(id: u64) -> Rc<Record> {
        Rc::new(Record {
            id,
            raw: bytes::Bytes::new(),
            summary: Summary {
                timestamp: None,
                site: None,
                log_type: LogType::Unspecified,
            },
        })
    }

    #[test]
    fn fires_and_removes_on_match() {
        let listener = Rc::new(CountingListener { calls: Cell::new(0), keep_registered: false });
        let mut set = AppendListenerSet::new();
        set.register(Rc::downgrade(&(listener.clone() as Rc<dyn AppendListener>)));

        set.fire(&record(1));
        assert_eq!(listener.calls.get(), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn stays_registered_when_listener_requests_it() {
        let listener = Rc::new(CountingListener { calls: Cell::new(0), keep_registered: true });
        let mut set = AppendListenerSet::new();
        set.register(Rc::downgrade(&(listener.clone() as Rc<dyn AppendListener>)));

        set.fire(&record(1));
        set.fire(&record(2));
        assert_eq!(listener.calls.get(), 2);
        assert!(!set.is_empty());
    }

    #[test]
    fn dropped_owner_auto_unregisters() {
        let listener = Rc::new(CountingListener { calls: Cell::new(0), keep_registered: true });
        let mut set = AppendListenerSet::new();
        set.register(Rc::downgrade(&(listener.clone() as Rc<dyn AppendListener>)));
        drop(listener);

        set.fire(&record(1));
        assert!(set.is_empty());
    }
}
