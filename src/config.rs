//! Live-updatable retry configuration.
//!
//! The middleware reads `max_attempts` and the strategy once per logical
//! request, never caching across requests, so operators can swap either
//! between requests. [`Dynamic`] is the cell that makes those reads cheap and
//! the swaps atomic.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::strategy::{StandardRetryStrategy, StrategyKind, TokenRetryStrategy};

/// Default total attempt budget (initial try + retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Cheap-to-read, atomically replaceable configuration cell.
#[derive(Debug)]
pub struct Dynamic<T> {
    inner: Arc<ArcSwap<T>>,
}

impl<T> Clone for Dynamic<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> Dynamic<T> {
    pub fn new(value: T) -> Self {
        Self { inner: Arc::new(ArcSwap::from_pointee(value)) }
    }

    /// Snapshot the current value.
    pub fn get(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// Replace the value for every holder of this handle.
    pub fn set(&self, value: T) {
        self.inner.store(Arc::new(value));
    }
}

/// Errors produced while assembling a retry configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// `max_attempts` must be at least 1.
    #[error("max_attempts must be >= 1 (got {0})")]
    InvalidMaxAttempts(u32),
}

/// The configuration pair the retry middleware consumes.
///
/// Both halves are handles: cloning the config shares them, and updates made
/// through [`RetryConfig::max_attempts_handle`] or
/// [`RetryConfig::set_strategy`] are seen by the next request.
pub struct RetryConfig<R, T, E> {
    pub(crate) max_attempts: Dynamic<u32>,
    pub(crate) strategy: Dynamic<StrategyKind<R, T, E>>,
}

impl<R, T, E> std::fmt::Debug for RetryConfig<R, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl<R, T, E> Clone for RetryConfig<R, T, E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts.clone(),
            strategy: self.strategy.clone(),
        }
    }
}

impl<R, T, E> RetryConfig<R, T, E> {
    /// Configuration with an explicit attempt budget and strategy.
    pub fn new(max_attempts: u32, strategy: StrategyKind<R, T, E>) -> Result<Self, BuildError> {
        if max_attempts == 0 {
            return Err(BuildError::InvalidMaxAttempts(0));
        }
        Ok(Self {
            max_attempts: Dynamic::new(max_attempts),
            strategy: Dynamic::new(strategy),
        })
    }

    /// Default configuration: the token-bucket strategy with the default
    /// attempt budget, the ceiling shared between middleware and strategy so
    /// a live update moves both.
    pub fn standard() -> Self {
        let max_attempts = Dynamic::new(DEFAULT_MAX_ATTEMPTS);
        let strategy = StandardRetryStrategy::with_shared_max_attempts(max_attempts.clone());
        Self {
            max_attempts,
            strategy: Dynamic::new(StrategyKind::token(strategy)),
        }
    }

    /// Like [`RetryConfig::standard`] with an explicit attempt budget.
    pub fn standard_with_max_attempts(max_attempts: u32) -> Result<Self, BuildError> {
        if max_attempts == 0 {
            return Err(BuildError::InvalidMaxAttempts(0));
        }
        let handle = Dynamic::new(max_attempts);
        let strategy = StandardRetryStrategy::with_shared_max_attempts(handle.clone());
        Ok(Self {
            max_attempts: handle,
            strategy: Dynamic::new(StrategyKind::token(strategy)),
        })
    }

    /// Live handle to the attempt budget.
    pub fn max_attempts_handle(&self) -> Dynamic<u32> {
        self.max_attempts.clone()
    }

    /// Swap the configured strategy; the next request picks it up.
    pub fn set_strategy(&self, strategy: StrategyKind<R, T, E>) {
        self.strategy.set(strategy);
    }

    /// Swap in a token-generation strategy.
    pub fn set_token_strategy(&self, strategy: impl TokenRetryStrategy + 'static) {
        self.strategy.set(StrategyKind::token(strategy));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_get_set() {
        let cell = Dynamic::new(1);
        assert_eq!(*cell.get(), 1);
        cell.set(2);
        assert_eq!(*cell.get(), 2);

        let other = cell.clone();
        other.set(5);
        assert_eq!(*cell.get(), 5, "clones share the same cell");
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let config: Result<RetryConfig<(), (), ()>, _> = RetryConfig::new(
            0,
            StrategyKind::token(StandardRetryStrategy::default()),
        );
        assert_eq!(config.unwrap_err(), BuildError::InvalidMaxAttempts(0));

        let config: Result<RetryConfig<(), (), ()>, _> =
            RetryConfig::standard_with_max_attempts(0);
        assert!(config.is_err());
    }

    #[test]
    fn standard_config_shares_the_ceiling_with_the_strategy() {
        let config: RetryConfig<(), (), ()> = RetryConfig::standard();
        assert_eq!(*config.max_attempts.get(), DEFAULT_MAX_ATTEMPTS);

        config.max_attempts_handle().set(7);
        assert_eq!(*config.max_attempts.get(), 7);
        // The strategy reads the same handle; see the strategy tests for the
        // grant-side behavior.
        assert_eq!(config.strategy.get().mode(), "standard");
    }
}
