use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Microseconds since the Unix epoch, as carried on the wire by
/// `FILTER_SINCE`/`FILTER_UNTIL` and inside a log datagram's timestamp field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimePoint(u64);

impl TimePoint {
    pub const MIN: TimePoint = TimePoint(0);
    pub const MAX: TimePoint = TimePoint(u64::MAX);

    pub const fn from_micros(micros: u64) -> Self {
        TimePoint(micros)
    }

    pub const fn as_micros(self) -> u64 {
        self.0
    }

    pub fn saturating_add(self, d: Micros) -> Self {
        TimePoint(self.0.saturating_add(d.0))
    }

    pub fn saturating_sub(self, d: Micros) -> Self {
        TimePoint(self.0.saturating_sub(d.0))
    }
}

impl From<SystemTime> for TimePoint {
    fn from(t: SystemTime) -> Self {
        let micros = t
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros().min(u64::MAX as u128) as u64)
            .unwrap_or(0);
        TimePoint(micros)
    }
}

impl From<TimePoint> for SystemTime {
    fn from(t: TimePoint) -> Self {
        UNIX_EPOCH + Duration::from_micros(t.0)
    }
}

/// A microsecond duration, used for `FILTER_DURATION_LONGER` and for the
/// selection "until offset" grace window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Micros(u64);

impl Micros {
    pub const ZERO: Micros = Micros(0);

    pub const fn from_micros(v: u64) -> Self {
        Micros(v)
    }

    pub const fn as_micros(self) -> u64 {
        self.0
    }

    pub const fn from_secs(s: u64) -> Self {
        Micros(s * 1_000_000)
    }
}

impl From<Duration> for Micros {
    fn from(d: Duration) -> Self {
        Micros(d.as_micros().min(u64::MAX as u128) as u64)
    }
}

impl From<Micros> for Duration {
    fn from(m: Micros) -> Self {
        Duration::from_micros(m.0)
    }
}

/// The grace window a `Selection` tolerates past `timestamp.until`, to
/// absorb producer clock jitter.
pub const UNTIL_GRACE: Micros = Micros::from_secs(10);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_system_time() {
        let t = TimePoint::from_micros(1_700_000_000_123_456);
        let st: SystemTime = t.into();
        let back: TimePoint = st.into();
        assert_eq!(t, back);
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        assert_eq!(TimePoint::MAX.saturating_add(Micros::from_secs(1)), TimePoint::MAX);
        assert_eq!(TimePoint::MIN.saturating_sub(Micros::from_secs(1)), TimePoint::MIN);
    }
}
