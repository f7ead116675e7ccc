//! Retry middleware: the attempt loop around the pipeline's send step.
//!
//! Semantics:
//! - The configured strategy and attempt budget are resolved once per logical
//!   request, never cached across requests.
//! - An original-generation strategy gets full control: the middleware
//!   annotates the context with the policy mode and delegates.
//! - A token-generation strategy is driven by the middleware: classify each
//!   failure, ask the strategy to refresh the token, wait out the granted
//!   delay, try again. A refusal ends the loop with the last attempt's own
//!   error decorated with attempt accounting.
//! - Wire headers for attempt correlation are injected only once a retry is
//!   about to go out, and only when the request is HTTP-shaped.
//!
//! Invariants:
//! - Headers for attempt N are in place strictly before send N starts.
//! - `total_retry_delay` is the sum of waits actually performed, in order.
//! - The loop never outlives a cancellation signal: waits are interrupted and
//!   the caller sees a cancellation error, not an exhaustion.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::header::{HeaderName, HeaderValue};
use uuid::Uuid;

use crate::classify::{classify, ErrorDetails};
use crate::clock::{SystemClock, WallClock};
use crate::config::RetryConfig;
use crate::error::RetryError;
use crate::pipeline::{
    AttemptMetadata, FinalizeArgs, FinalizeHandler, HandlerContext, HandlerMetadata, HttpPayload,
    MiddlewareStack, Output, Priority, SendHandler, Step,
};
use crate::retry_after::retry_after_hint_at;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::strategy::{RetryErrorInfo, StrategyKind, TokenRetryStrategy};

/// Header carrying the invocation id: stable across every attempt of one
/// logical request, so the target can de-duplicate replays.
pub const INVOCATION_ID_HEADER: &str = "amz-sdk-invocation-id";

/// Per-attempt header correlating attempt sequence with outcome, value
/// `attempt=<n>; max=<m>`.
pub const REQUEST_HEADER: &str = "amz-sdk-request";

/// User-agent annotation key naming the active retry policy.
pub const RETRY_MODE_ANNOTATION: &str = "cfg/retry-mode";

/// Partition used when the context does not name one.
pub const DEFAULT_PARTITION: &str = "default";

/// Registration metadata: after request construction, before transport send.
pub const RETRY_MIDDLEWARE_METADATA: HandlerMetadata = HandlerMetadata {
    name: "retryMiddleware",
    step: Step::FinalizeRequest,
    priority: Priority::High,
    tags: &["RETRY"],
    replace_existing: true,
};

/// The retry orchestrator. Wraps the send step of the pipeline.
pub struct RetryMiddleware<R, T, E> {
    config: RetryConfig<R, T, E>,
    sleeper: Arc<dyn Sleeper>,
    clock: Arc<dyn WallClock>,
}

impl<R, T, E> fmt::Debug for RetryMiddleware<R, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryMiddleware")
            .field("config", &self.config)
            .field("sleeper", &self.sleeper)
            .finish()
    }
}

impl<R, T, E> RetryMiddleware<R, T, E> {
    pub fn new(config: RetryConfig<R, T, E>) -> Self {
        Self {
            config,
            sleeper: Arc::new(TokioSleeper),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the sleeper that performs backoff waits.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replace the clock that anchors retry-after hints.
    pub fn with_clock(mut self, clock: Arc<dyn WallClock>) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl<R, T, E> FinalizeHandler<R, T, E> for RetryMiddleware<R, T, E>
where
    R: HttpPayload + Send,
    T: Send,
    E: ErrorDetails + Send,
{
    async fn handle(
        &self,
        context: &mut HandlerContext,
        args: &mut FinalizeArgs<R>,
        next: &dyn SendHandler<R, T, E>,
    ) -> Result<Output<T>, RetryError<E>> {
        let strategy = self.config.strategy.get();
        match &*strategy {
            StrategyKind::Legacy(strategy) => {
                context
                    .user_agent
                    .push((RETRY_MODE_ANNOTATION.to_owned(), strategy.mode().to_owned()));
                strategy.retry(next, args).await
            }
            StrategyKind::Token(strategy) => {
                self.retry_with_tokens(strategy.as_ref(), context, args, next)
                    .await
            }
        }
    }
}

impl<R, T, E> RetryMiddleware<R, T, E>
where
    R: HttpPayload + Send,
    T: Send,
    E: ErrorDetails + Send,
{
    async fn retry_with_tokens(
        &self,
        strategy: &dyn TokenRetryStrategy,
        context: &HandlerContext,
        args: &mut FinalizeArgs<R>,
        next: &dyn SendHandler<R, T, E>,
    ) -> Result<Output<T>, RetryError<E>> {
        let max_attempts = *self.config.max_attempts.get();
        let partition = context
            .partition_id
            .clone()
            .unwrap_or_else(|| DEFAULT_PARTITION.to_owned());
        let mut token = strategy
            .acquire_initial_retry_token(&partition)
            .await
            .map_err(RetryError::TokenAcquisition)?;

        let invocation_id = HeaderValue::from_str(&Uuid::new_v4().to_string()).ok();
        let mut attempts: u32 = 0;
        let mut total_retry_delay = Duration::ZERO;

        loop {
            if context.is_cancelled() {
                return Err(RetryError::Cancelled {
                    metadata: AttemptMetadata { attempts, total_retry_delay },
                });
            }

            // A retry is about to go out: stamp the correlation headers on the
            // request object the transport will see. First attempts go bare.
            if attempts > 0 {
                if let Some(headers) = args.request.http_headers_mut() {
                    if let Some(id) = &invocation_id {
                        headers.insert(HeaderName::from_static(INVOCATION_ID_HEADER), id.clone());
                    }
                    let attempt_info = format!("attempt={}; max={}", attempts + 1, max_attempts);
                    if let Ok(value) = HeaderValue::from_str(&attempt_info) {
                        headers.insert(HeaderName::from_static(REQUEST_HEADER), value);
                    }
                }
            }

            match next.send(args).await {
                Ok(value) => {
                    attempts += 1;
                    strategy.record_success(token).await;
                    return Ok(Output {
                        output: value,
                        metadata: AttemptMetadata { attempts, total_retry_delay },
                    });
                }
                Err(error) => {
                    attempts += 1;
                    let error_type = classify(&error);
                    let mut error_info = RetryErrorInfo::new(error_type);
                    if let Some(hint) = retry_after_hint_at(&error, self.clock.now()) {
                        error_info = error_info.with_retry_after_hint(hint);
                    }

                    token = match strategy.refresh_retry_token_for_retry(token, &error_info).await {
                        Ok(refreshed) => refreshed,
                        Err(refusal) => {
                            tracing::debug!(%refusal, attempts, "giving up");
                            return Err(RetryError::Attempt {
                                source: error,
                                metadata: AttemptMetadata { attempts, total_retry_delay },
                            });
                        }
                    };

                    let delay = token.retry_delay();
                    tracing::debug!(
                        attempt = attempts + 1,
                        delay_ms = delay.as_millis() as u64,
                        class = %error_type,
                        "retrying"
                    );
                    if !delay.is_zero() {
                        match &context.cancellation {
                            Some(signal) => {
                                tokio::select! {
                                    _ = signal.cancelled() => {
                                        return Err(RetryError::Cancelled {
                                            metadata: AttemptMetadata { attempts, total_retry_delay },
                                        });
                                    }
                                    _ = self.sleeper.sleep(delay) => {}
                                }
                            }
                            None => self.sleeper.sleep(delay).await,
                        }
                    }
                    // The wait completed, so it counts.
                    total_retry_delay += delay;
                }
            }
        }
    }
}

/// Pluggable registration of the retry middleware.
pub struct RetryPlugin<R, T, E> {
    middleware: Arc<RetryMiddleware<R, T, E>>,
}

impl<R, T, E> RetryPlugin<R, T, E>
where
    R: HttpPayload + Send + 'static,
    T: Send + 'static,
    E: ErrorDetails + Send + 'static,
{
    /// Insert the middleware into `stack` at the finalize step.
    pub fn apply_to_stack<S: MiddlewareStack<R, T, E> + ?Sized>(&self, stack: &mut S) {
        stack.add(self.middleware.clone(), RETRY_MIDDLEWARE_METADATA);
    }
}

/// Build the plugin a client registers into its pipeline.
pub fn retry_plugin<R, T, E>(config: RetryConfig<R, T, E>) -> RetryPlugin<R, T, E>
where
    R: HttpPayload + Send + 'static,
    T: Send + 'static,
    E: ErrorDetails + Send + 'static,
{
    RetryPlugin {
        middleware: Arc::new(RetryMiddleware::new(config)),
    }
}
