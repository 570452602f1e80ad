//! Manager configuration

use rust_decimal::Decimal;
use std::time::Duration;

/// Timing and retry knobs for the OCO lifecycle manager
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Delay between two status polls of an active set
    pub poll_interval: Duration,
    /// Upper bound on any single gateway call
    pub call_timeout: Duration,
    /// Retries after the first attempt for inconclusive calls
    pub max_retries: u32,
    /// First backoff delay, doubled per retry
    pub retry_backoff: Duration,
    pub max_backoff: Duration,
    /// Consecutive inconclusive polls of one leg before giving up
    pub max_inconclusive_polls: u32,
    /// Stop monitoring after this long without an outcome
    pub monitor_deadline: Option<Duration>,
    /// Submit both legs as reduce-only
    pub reduce_only_legs: bool,
    /// Stop-limit default distance between stop and limit price (0.01 = 1%)
    pub stop_limit_offset: Decimal,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(3_000),
            call_timeout: Duration::from_millis(5_000),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(8_000),
            max_inconclusive_polls: 5,
            monitor_deadline: None,
            reduce_only_legs: false,
            stop_limit_offset: Decimal::new(1, 2),
        }
    }
}
