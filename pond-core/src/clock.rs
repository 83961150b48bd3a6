//! Clock sources as traits, so the token bucket (steady clock) and the
//! retention timer (system clock) are mockable in tests without sleeping.

use std::time::{Instant, SystemTime};

use pond_common::TimePoint;

pub trait SteadyClock {
    /// Seconds since an arbitrary fixed point, monotonic.
    fn now_seconds(&self) -> f64;
}

pub trait SystemClock {
    fn now(&self) -> TimePoint;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RealSteadyClock;

impl SteadyClock for RealSteadyClock {
    fn now_seconds(&self) -> f64 {
        thread_local! {
            static START: Instant = Instant::now();
        }
        START.with(|start| start.elapsed().as_secs_f64())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RealSystemClock;

impl SystemClock for RealSystemClock {
    fn now(&self) -> TimePoint {
        SystemTime::now().into()
    }
}

/// A clock driven entirely by the test that owns it, so token-bucket
/// refill amounts can be asserted exactly without sleeping.
#[derive(Debug, Clone)]
pub struct MockClock {
    seconds: std::cell::Cell<f64>,
    system: std::cell::Cell<TimePoint>,
}

impl MockClock {
    pub fn new(seconds: f64, system: TimePoint) -> Self {
        MockClock {
            seconds: std::cell::Cell::new(seconds),
            system: std::cell::Cell::new(system),
        }
    }

    pub fn advance_seconds(&self, delta: f64) {
        self.seconds.set(self.seconds.get() + delta);
    }

    pub fn advance_system(&self, delta: pond_common::Micros) {
        self.system.set(self.system.get().saturating_add(delta));
    }
}

impl SteadyClock for MockClock {
    fn now_seconds(&self) -> f64 {
        self.seconds.get()
    }
}

impl SystemClock for MockClock {
    fn now(&self) -> TimePoint {
        self.system.get()
    }
}
