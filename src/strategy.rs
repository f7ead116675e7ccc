//! Retry strategy contracts.
//!
//! Two coexisting generations. [`RetryStrategy`] is the original opaque
//! contract: handed the send step and the request arguments, it owns the whole
//! attempt loop and the middleware stays out of the way. [`TokenRetryStrategy`]
//! is the newer contract: the middleware owns the loop and exchanges an opaque
//! [`RetryToken`] with the strategy on every decision, so capacity accounting
//! can be shared across requests.
//!
//! [`StrategyKind`] tags which generation a client configured; the middleware
//! dispatches on the tag once per request.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::classify::ErrorKind;
use crate::error::{RetryError, RetryRefusal};
use crate::pipeline::{FinalizeArgs, Output, SendHandler};
use crate::token::RetryToken;

pub mod standard;

pub use standard::StandardRetryStrategy;

/// What the middleware learned about a failed attempt, handed to the strategy
/// for the retry decision. Built fresh per failure and dropped with it; the
/// failure value itself stays with the middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryErrorInfo {
    /// Classification of the failure, in the fixed precedence order.
    pub error_type: ErrorKind,
    /// Server-suggested earliest time for the next attempt, when one was sent.
    pub retry_after_hint: Option<DateTime<Utc>>,
}

impl RetryErrorInfo {
    pub fn new(error_type: ErrorKind) -> Self {
        Self { error_type, retry_after_hint: None }
    }

    pub fn with_retry_after_hint(mut self, hint: DateTime<Utc>) -> Self {
        self.retry_after_hint = Some(hint);
        self
    }
}

/// Original-generation strategy: owns its whole attempt loop.
#[async_trait]
pub trait RetryStrategy<R, T, E>: Send + Sync {
    /// Short policy name surfaced through the context's user-agent annotations.
    fn mode(&self) -> &str;

    /// Drive the request to completion, retries included.
    async fn retry(
        &self,
        next: &dyn SendHandler<R, T, E>,
        args: &mut FinalizeArgs<R>,
    ) -> Result<Output<T>, RetryError<E>>;
}

/// Token-generation strategy: grants attempts one at a time.
///
/// Implementations share capacity state across in-flight requests, so every
/// operation must be safe under concurrent invocation. None of them may hold a
/// lock across an await; the middleware calls them between sends, never during
/// one.
#[async_trait]
pub trait TokenRetryStrategy: Send + Sync + fmt::Debug {
    /// Short policy name surfaced through telemetry.
    fn mode(&self) -> &str;

    /// Issue the token covering a request's first attempt, scoped to
    /// `partition`. Failure here is terminal: no attempt is made.
    async fn acquire_initial_retry_token(
        &self,
        partition: &str,
    ) -> Result<RetryToken, RetryRefusal>;

    /// Exchange `token` for one authorizing the next attempt, or refuse and
    /// end the loop. The refreshed token carries the delay to wait first.
    async fn refresh_retry_token_for_retry(
        &self,
        token: RetryToken,
        error_info: &RetryErrorInfo,
    ) -> Result<RetryToken, RetryRefusal>;

    /// Report that the attempt covered by `token` succeeded.
    async fn record_success(&self, token: RetryToken);
}

/// The configured strategy, tagged by generation.
pub enum StrategyKind<R, T, E> {
    /// Original opaque contract; the middleware delegates entirely.
    Legacy(Arc<dyn RetryStrategy<R, T, E>>),
    /// Token contract; the middleware drives the attempt loop.
    Token(Arc<dyn TokenRetryStrategy>),
}

impl<R, T, E> StrategyKind<R, T, E> {
    pub fn legacy(strategy: impl RetryStrategy<R, T, E> + 'static) -> Self {
        Self::Legacy(Arc::new(strategy))
    }

    pub fn token(strategy: impl TokenRetryStrategy + 'static) -> Self {
        Self::Token(Arc::new(strategy))
    }

    /// The configured policy's short name.
    pub fn mode(&self) -> &str {
        match self {
            Self::Legacy(strategy) => strategy.mode(),
            Self::Token(strategy) => strategy.mode(),
        }
    }
}

impl<R, T, E> Clone for StrategyKind<R, T, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Legacy(strategy) => Self::Legacy(strategy.clone()),
            Self::Token(strategy) => Self::Token(strategy.clone()),
        }
    }
}

impl<R, T, E> fmt::Debug for StrategyKind<R, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy(strategy) => {
                f.debug_tuple("Legacy").field(&strategy.mode()).finish()
            }
            Self::Token(strategy) => f.debug_tuple("Token").field(strategy).finish(),
        }
    }
}
