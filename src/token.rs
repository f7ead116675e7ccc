//! Per-request retry accounting tokens.

use std::time::Duration;

/// Opaque value issued by a token strategy.
///
/// Tracks how many retries a request has been granted and the delay attached
/// to the most recent grant. The strategy that issued a token is the only
/// party that advances it; the middleware reads it and hands it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryToken {
    retry_count: u32,
    retry_delay: Duration,
    partition: String,
    last_cost: Option<u32>,
}

impl RetryToken {
    /// Fresh token for a request's first attempt, scoped to `partition`.
    pub fn new(partition: impl Into<String>) -> Self {
        Self {
            retry_count: 0,
            retry_delay: Duration::ZERO,
            partition: partition.into(),
            last_cost: None,
        }
    }

    /// Successor token authorizing one more attempt after `delay`, recording
    /// the capacity `cost` the grant withdrew.
    pub fn refreshed(&self, delay: Duration, cost: u32) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            retry_delay: delay,
            partition: self.partition.clone(),
            last_cost: Some(cost),
        }
    }

    /// Number of retries granted so far (0 for a fresh token).
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Delay attached to the most recent grant.
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Partition whose shared capacity this token draws from.
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Capacity withdrawn by the most recent grant, if any retry happened.
    pub fn last_cost(&self) -> Option<u32> {
        self.last_cost
    }
}
