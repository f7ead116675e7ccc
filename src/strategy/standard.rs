//! Token-bucket-backed retry strategy.
//!
//! Grants retries from a shared, partition-scoped capacity pool so a single
//! flapping destination cannot burn the retry budget of every other request.
//! Each granted retry withdraws from the partition's bucket (timeouts cost
//! more than ordinary failures) and a success refunds the last withdrawal, so
//! sustained failure drains the pool and quiet periods refill it.
//!
//! Delay per grant: the server's retry-after hint when it is the stricter
//! bound, otherwise exponential backoff with full jitter, using a slower base
//! once the server signalled throttling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::backoff::{ExponentialBackoff, DEFAULT_DELAY_BASE, THROTTLING_DELAY_BASE};
use crate::classify::ErrorKind;
use crate::clock::{SystemClock, WallClock};
use crate::config::{Dynamic, DEFAULT_MAX_ATTEMPTS};
use crate::error::RetryRefusal;
use crate::strategy::{RetryErrorInfo, TokenRetryStrategy};
use crate::token::RetryToken;

/// Capacity a fresh partition bucket starts with.
pub const INITIAL_RETRY_TOKENS: u32 = 500;

/// Capacity withdrawn per ordinary granted retry.
pub const RETRY_COST: u32 = 5;

/// Capacity withdrawn per granted retry of a timeout-flavored failure.
pub const TIMEOUT_RETRY_COST: u32 = 10;

/// Capacity trickled back by a success that needed no retry.
pub const NO_RETRY_INCREMENT: u32 = 1;

/// Token-bucket strategy with a per-request attempt ceiling.
#[derive(Debug)]
pub struct StandardRetryStrategy {
    max_attempts: Dynamic<u32>,
    buckets: Mutex<HashMap<String, u32>>,
    backoff: ExponentialBackoff,
    throttling_backoff: ExponentialBackoff,
    clock: Arc<dyn WallClock>,
}

impl Default for StandardRetryStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl StandardRetryStrategy {
    /// Strategy with a fixed total-attempt ceiling (initial try + retries).
    pub fn new(max_attempts: u32) -> Self {
        Self::with_shared_max_attempts(Dynamic::new(max_attempts))
    }

    /// Strategy reading its attempt ceiling through a live-updatable handle,
    /// so the ceiling can be shared with the middleware's configuration.
    pub fn with_shared_max_attempts(max_attempts: Dynamic<u32>) -> Self {
        Self {
            max_attempts,
            buckets: Mutex::new(HashMap::new()),
            backoff: ExponentialBackoff::new(DEFAULT_DELAY_BASE),
            throttling_backoff: ExponentialBackoff::new(THROTTLING_DELAY_BASE),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the backoff curve for ordinary retryable failures.
    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replace the backoff curve used after throttling.
    pub fn with_throttling_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.throttling_backoff = backoff;
        self
    }

    /// Replace the clock that anchors retry-after hints.
    pub fn with_clock(mut self, clock: Arc<dyn WallClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Remaining capacity of a partition's bucket.
    pub fn remaining_capacity(&self, partition: &str) -> u32 {
        let buckets = self.buckets.lock().unwrap();
        buckets.get(partition).copied().unwrap_or(INITIAL_RETRY_TOKENS)
    }

    fn withdraw(&self, partition: &str, cost: u32) -> Result<(), RetryRefusal> {
        let mut buckets = self.buckets.lock().unwrap();
        let capacity = buckets
            .entry(partition.to_string())
            .or_insert(INITIAL_RETRY_TOKENS);
        if *capacity < cost {
            return Err(RetryRefusal::QuotaExhausted { partition: partition.to_string() });
        }
        *capacity -= cost;
        Ok(())
    }

    fn refund(&self, partition: &str, amount: u32) {
        let mut buckets = self.buckets.lock().unwrap();
        let capacity = buckets
            .entry(partition.to_string())
            .or_insert(INITIAL_RETRY_TOKENS);
        *capacity = (*capacity + amount).min(INITIAL_RETRY_TOKENS);
    }

    fn next_delay(&self, token: &RetryToken, error_info: &RetryErrorInfo) -> Duration {
        let curve = match error_info.error_type {
            ErrorKind::Throttling => &self.throttling_backoff,
            _ => &self.backoff,
        };
        let computed = curve.delay(token.retry_count());
        match error_info.retry_after_hint {
            // The server's ask wins when it is the longer wait.
            Some(hint) => {
                let wait = (hint - self.clock.now()).to_std().unwrap_or(Duration::ZERO);
                wait.max(computed)
            }
            None => computed,
        }
    }
}

#[async_trait]
impl TokenRetryStrategy for StandardRetryStrategy {
    fn mode(&self) -> &str {
        "standard"
    }

    async fn acquire_initial_retry_token(
        &self,
        partition: &str,
    ) -> Result<RetryToken, RetryRefusal> {
        Ok(RetryToken::new(partition))
    }

    async fn refresh_retry_token_for_retry(
        &self,
        token: RetryToken,
        error_info: &RetryErrorInfo,
    ) -> Result<RetryToken, RetryRefusal> {
        if !error_info.error_type.is_retryable() {
            return Err(RetryRefusal::NotRetryable(error_info.error_type));
        }
        let max_attempts = *self.max_attempts.get();
        if token.retry_count() + 1 >= max_attempts {
            return Err(RetryRefusal::AttemptBudgetExhausted { max_attempts });
        }
        let cost = match error_info.error_type {
            ErrorKind::Transient => TIMEOUT_RETRY_COST,
            _ => RETRY_COST,
        };
        self.withdraw(token.partition(), cost)?;
        let delay = self.next_delay(&token, error_info);
        Ok(token.refreshed(delay, cost))
    }

    async fn record_success(&self, token: RetryToken) {
        let amount = token.last_cost().unwrap_or(NO_RETRY_INCREMENT);
        self.refund(token.partition(), amount);
    }
}
