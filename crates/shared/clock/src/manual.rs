use chrono::{Duration, Utc};
use oco_core::Timestamp;
use oco_ports::Clock;
use parking_lot::RwLock;
use std::sync::Arc;

/// Fixed clock that only advances when explicitly moved
///
/// Every call to [`Clock::now`] returns the same instant until
/// [`advance`](ManualClock::advance) or [`set_time`](ManualClock::set_time)
/// is called, which makes observation ordering fully deterministic.
pub struct ManualClock {
    current_time: RwLock<Timestamp>,
}

impl ManualClock {
    /// Create a manual clock starting at `initial_time`
    pub fn new(initial_time: Timestamp) -> Arc<Self> {
        Arc::new(Self {
            current_time: RwLock::new(initial_time),
        })
    }

    /// Create a manual clock frozen at the current wall time
    pub fn starting_now() -> Arc<Self> {
        Self::new(Utc::now())
    }

    /// Move time forward by `duration`
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current_time.write();
        *current += duration;
    }

    /// Explicitly set the time
    ///
    /// Warning: moving backwards makes later observations look stale.
    pub fn set_time(&self, time: Timestamp) {
        *self.current_time.write() = time;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current_time.read()
    }
}
