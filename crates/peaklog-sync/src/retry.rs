//! Bounded retry with exponential backoff
//!
//! Remote operations are not retried by default: a failure surfaces as
//! `error` status and local state is kept. Configuring `sync.max_retries`
//! wraps every remote operation in this policy instead.
//!
//! Adapters do not retry internally, so every failure is treated as
//! transient here.

use std::future::Future;
use std::time::Duration;

use peaklog_core::config::SyncConfig;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Retry schedule for remote operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// `max_retries` additional attempts, waiting `base_delay * 2^attempt`
    /// between them
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// A single attempt, no retry
    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.retry_base_delay_ms),
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Runs `f` until it succeeds, the retries are exhausted, or `cancel`
    /// fires during a backoff
    ///
    /// An attempt that is already running is never interrupted.
    pub async fn run<F, Fut, T>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        f: F,
    ) -> anyhow::Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(operation, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt < self.max_retries => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Remote operation failed, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(err),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}
