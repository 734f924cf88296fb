//! Retry Policy
//!
//! Every gateway call goes through `with_retry`. A transient failure
//! (rate limit, timeout, dropped connection) is retried after a pause while
//! the policy has attempts left; anything else propagates immediately.
//! The default policy is one retry after a fixed 5 second pause.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;

use super::error::CrawlerError;
use crate::ports::LedgerError;

/// Pluggable retry strategy
pub trait RetryPolicy: Send + Sync + fmt::Debug {
    /// Total attempts, including the first call
    fn max_attempts(&self) -> u32;

    /// Pause before retry number `retry` (starting at 1)
    fn delay(&self, retry: u32) -> Duration;
}

/// Same pause before every retry
#[derive(Debug, Clone)]
pub struct FixedDelay {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: 2,
        }
    }
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }
}

impl RetryPolicy for FixedDelay {
    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn delay(&self, _retry: u32) -> Duration {
        self.delay
    }
}

/// Doubling pause capped at `max_delay`, optionally jittered down to half
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    pub jitter: bool,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            max_attempts: 4,
            jitter: true,
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        let delay = self.base.saturating_mul(factor).min(self.max_delay);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let millis = delay.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(millis / 2..=millis))
    }
}

/// Run a gateway call under `policy`
///
/// # Arguments
/// * `operation` - RPC method name, used in logs and errors
/// * `call` - Produces a fresh future for each attempt
pub async fn with_retry<T, F, Fut>(
    policy: &dyn RetryPolicy,
    operation: &'static str,
    mut call: F,
) -> Result<T, CrawlerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LedgerError>>,
{
    let max_attempts = policy.max_attempts().max(1);
    let mut attempt = 1;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.delay(attempt);
                tracing::warn!(
                    "{} failed ({}), retrying in {:?} (attempt {}/{})",
                    operation,
                    e,
                    delay,
                    attempt + 1,
                    max_attempts
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(CrawlerError::Rpc {
                    operation,
                    attempts: attempt,
                    source: e,
                })
            }
        }
    }
}
