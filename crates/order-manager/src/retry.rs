//! Timeout and retry policy for gateway calls
//!
//! Every outbound call is bounded by `call_timeout`. An inconclusive failure
//! is retried up to `max_retries` times, sleeping `retry_backoff * 2^n`
//! (capped at `max_backoff`, or the venue's `Retry-After` when given).

use log::warn;
use oco_ports::{GatewayError, GatewayResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::config::ManagerConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub call_timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ManagerConfig) -> Self {
        Self {
            call_timeout: config.call_timeout,
            max_retries: config.max_retries,
            backoff: config.retry_backoff,
            max_backoff: config.max_backoff,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: u32, err: &GatewayError) -> Duration {
        if let Some(after) = err.retry_after() {
            return after.min(self.max_backoff);
        }
        let factor = 2u32.saturating_pow(attempt);
        self.backoff.saturating_mul(factor).min(self.max_backoff)
    }

    /// Run one attempt of `call` under the timeout
    pub async fn once<T, Fut>(&self, call: Fut) -> GatewayResult<T>
    where
        Fut: Future<Output = GatewayResult<T>>,
    {
        match timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        }
    }

    /// Retry transient failures
    pub async fn run<T, F, Fut>(&self, label: &str, call: F) -> GatewayResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        self.run_while(label, GatewayError::is_transient, call).await
    }

    /// Retry transient failures and `OrderNotFound`, for status polls
    /// against an eventually consistent venue
    pub async fn poll<T, F, Fut>(&self, label: &str, call: F) -> GatewayResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        self.run_while(label, is_inconclusive_poll, call).await
    }

    async fn run_while<T, F, Fut>(
        &self,
        label: &str,
        retryable: fn(&GatewayError) -> bool,
        mut call: F,
    ) -> GatewayResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match self.once(call()).await {
                Ok(value) => return Ok(value),
                Err(err) if retryable(&err) && attempt < self.max_retries => {
                    let delay = self.delay(attempt, &err);
                    warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        label,
                        err,
                        attempt + 1,
                        self.max_retries,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Whether a status poll failure says nothing definitive about the order
pub fn is_inconclusive_poll(err: &GatewayError) -> bool {
    err.is_transient() || err.is_not_found()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            call_timeout: Duration::from_secs(1),
            max_retries: 3,
            backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = policy();
        let err = GatewayError::Timeout;
        assert_eq!(policy.delay(0, &err), Duration::from_millis(500));
        assert_eq!(policy.delay(2, &err), Duration::from_millis(2000));
        assert_eq!(policy.delay(10, &err), Duration::from_secs(8));

        let limited = GatewayError::RateLimited {
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(policy.delay(0, &limited), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = policy()
            .run("submit", || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(GatewayError::Network("reset".to_string()))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: GatewayResult<()> = policy()
            .run("submit", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(GatewayError::Rejected {
                        code: -2019,
                        message: "Margin is insufficient.".to_string(),
                    })
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_call_times_out_and_exhausts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: GatewayResult<()> = policy()
            .poll("status", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    std::future::pending().await
                }
            })
            .await;
        assert_eq!(result, Err(GatewayError::Timeout));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
