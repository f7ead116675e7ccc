//! Convenient re-exports for common Second Wind types.
pub use crate::{
    backoff::{ExponentialBackoff, DEFAULT_DELAY_BASE, MAX_RETRY_DELAY, THROTTLING_DELAY_BASE},
    classify::{classify, ErrorDetails, ErrorKind},
    clock::{FixedClock, SystemClock, WallClock},
    config::{BuildError, Dynamic, RetryConfig, DEFAULT_MAX_ATTEMPTS},
    credentials::{
        extend_credentials, Credentials, ExtendedCredentials, IssuedCredentials, Logger,
        ProvideCredentials, StabilityGuard, TracingLogger,
    },
    error::{RetryError, RetryRefusal},
    middleware::{
        retry_plugin, RetryMiddleware, RetryPlugin, INVOCATION_ID_HEADER, REQUEST_HEADER,
        RETRY_MIDDLEWARE_METADATA,
    },
    pipeline::{
        AttemptMetadata, FinalizeArgs, FinalizeHandler, HandlerContext, HandlerMetadata,
        HttpPayload, MiddlewareStack, Output, Priority, SendHandler, Step,
    },
    retry_after::retry_after_hint,
    sleeper::{NoopSleeper, RecordingSleeper, Sleeper, TokioSleeper},
    strategy::{
        RetryErrorInfo, RetryStrategy, StandardRetryStrategy, StrategyKind, TokenRetryStrategy,
    },
    token::RetryToken,
};
