use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use sluice_core::Clock;

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct UtcClock;

impl Clock for UtcClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// # Example
///
/// ```rust,ignore
/// let clock = Arc::new(StubClock::new(start));
/// let schedule = EndpointSchedule::new(trigger, clock.clone());
/// clock.advance(TimeDelta::minutes(5));
/// ```
#[derive(Debug)]
pub struct StubClock {
    now: Mutex<DateTime<Utc>>,
}

impl StubClock {
    /// A clock frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Jump to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    /// Move forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock();
        *now += delta;
    }
}

impl Clock for StubClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
