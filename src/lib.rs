#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Second Wind 🌬️
//!
//! Retry orchestration for async HTTP API clients: a middleware that wraps
//! the pipeline's send step, decides whether and when to retry through a
//! pluggable strategy, and accounts for every attempt.
//!
//! ## Features
//!
//! - **Retry middleware** driving a sequential, cancellable attempt loop
//! - **Two strategy generations**: an opaque contract that owns its own loop,
//!   and a token contract the middleware drives decision by decision
//! - **Token-bucket retry budgets** scoped per destination partition
//! - **Failure classification** with a fixed precedence (throttling over
//!   transient over server error)
//! - **Retry-after aware backoff** with full jitter
//! - **Degraded-mode credential extension** for flaky credential sources
//!
//! ## Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use secondwind::{
//!     ErrorDetails, FinalizeArgs, FinalizeHandler, HandlerContext, RetryConfig, RetryMiddleware,
//!     SendHandler,
//! };
//!
//! #[derive(Debug)]
//! struct SendError;
//!
//! impl std::fmt::Display for SendError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "send failed")
//!     }
//! }
//!
//! impl std::error::Error for SendError {}
//! impl ErrorDetails for SendError {}
//!
//! struct Transport;
//!
//! #[async_trait]
//! impl SendHandler<http::Request<()>, &'static str, SendError> for Transport {
//!     async fn send(
//!         &self,
//!         _args: &mut FinalizeArgs<http::Request<()>>,
//!     ) -> Result<&'static str, SendError> {
//!         Ok("hello")
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let middleware = RetryMiddleware::new(RetryConfig::standard());
//! let mut context = HandlerContext::new().with_partition_id("api.example.com");
//! let mut args = FinalizeArgs::new(http::Request::new(()));
//!
//! let result = middleware.handle(&mut context, &mut args, &Transport).await.unwrap();
//! assert_eq!(result.output, "hello");
//! assert_eq!(result.metadata.attempts, 1);
//! # });
//! ```

pub mod backoff;
pub mod classify;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod middleware;
pub mod pipeline;
pub mod prelude;
pub mod retry_after;
pub mod sleeper;
pub mod strategy;
pub mod token;

// Re-exports
pub use backoff::ExponentialBackoff;
pub use classify::{classify, ErrorDetails, ErrorKind};
pub use clock::{FixedClock, SystemClock, WallClock};
pub use config::{BuildError, Dynamic, RetryConfig, DEFAULT_MAX_ATTEMPTS};
pub use credentials::{
    extend_credentials, Credentials, ExtendedCredentials, Logger, ProvideCredentials,
    StabilityGuard, TracingLogger,
};
pub use error::{RetryError, RetryRefusal};
pub use middleware::{
    retry_plugin, RetryMiddleware, RetryPlugin, INVOCATION_ID_HEADER, REQUEST_HEADER,
};
pub use pipeline::{
    AttemptMetadata, FinalizeArgs, FinalizeHandler, HandlerContext, HandlerMetadata, HttpPayload,
    MiddlewareStack, Output, SendHandler,
};
pub use retry_after::retry_after_hint;
pub use sleeper::{NoopSleeper, RecordingSleeper, Sleeper, TokioSleeper};
pub use strategy::{
    RetryErrorInfo, RetryStrategy, StandardRetryStrategy, StrategyKind, TokenRetryStrategy,
};
pub use token::RetryToken;
