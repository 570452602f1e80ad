//! Wall-clock time source

use chrono::Utc;
use oco_core::Timestamp;
use oco_ports::Clock;

/// UTC wall clock, used for every live and simulated CLI run
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_current_utc() {
        let before = Utc::now();
        let now = SystemClock::new().now();
        let after = Utc::now();
        assert!(before <= now && now <= after);
    }
}
