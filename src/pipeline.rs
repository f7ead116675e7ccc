//! Contracts between this crate and the surrounding request pipeline.
//!
//! The pipeline engine itself lives elsewhere; this module defines the shapes
//! it exchanges with handlers: the per-request context, the send step, the
//! structured output with attempt accounting, the HTTP capability query, and
//! the registration metadata a stack needs to slot a handler in.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::HeaderMap;
use tokio_util::sync::CancellationToken;

use crate::error::RetryError;

/// Per-request context threaded through the pipeline.
#[derive(Debug, Default, Clone)]
pub struct HandlerContext {
    /// Scopes shared retry capacity to a logical destination.
    pub partition_id: Option<String>,
    /// Accumulating user-agent annotations; handlers append, telemetry reads.
    pub user_agent: Vec<(String, String)>,
    /// Caller-supplied cancellation signal covering the whole request.
    pub cancellation: Option<CancellationToken>,
}

impl HandlerContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partition_id(mut self, partition_id: impl Into<String>) -> Self {
        self.partition_id = Some(partition_id.into());
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// Arguments flowing into the send step.
///
/// Handlers mutate the request in place; the object handed to `send` is the
/// object the transport serializes, never a retained copy.
#[derive(Debug)]
pub struct FinalizeArgs<R> {
    pub request: R,
}

impl<R> FinalizeArgs<R> {
    pub fn new(request: R) -> Self {
        Self { request }
    }
}

/// Capability query answered by the request representation in use.
///
/// HTTP-shaped requests expose their headers for mutation; anything else
/// answers `None` and wire-header features are skipped for it.
pub trait HttpPayload {
    fn http_headers_mut(&mut self) -> Option<&mut HeaderMap>;
}

impl<B> HttpPayload for http::Request<B> {
    fn http_headers_mut(&mut self) -> Option<&mut HeaderMap> {
        Some(self.headers_mut())
    }
}

/// The next handler in the pipeline: one transport send.
#[async_trait]
pub trait SendHandler<R, T, E>: Send + Sync {
    async fn send(&self, args: &mut FinalizeArgs<R>) -> Result<T, E>;
}

/// Attempt accounting attached to outputs and terminal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptMetadata {
    /// Total attempts sent: 1 + retries performed.
    pub attempts: u32,
    /// Sum of the delays actually waited before each retry.
    pub total_retry_delay: Duration,
}

/// Successful pipeline output with attempt accounting attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output<T> {
    pub output: T,
    pub metadata: AttemptMetadata,
}

/// A handler wrapping the send step of the pipeline.
#[async_trait]
pub trait FinalizeHandler<R, T, E>: Send + Sync {
    async fn handle(
        &self,
        context: &mut HandlerContext,
        args: &mut FinalizeArgs<R>,
        next: &dyn SendHandler<R, T, E>,
    ) -> Result<Output<T>, RetryError<E>>;
}

/// Pipeline steps a handler can register at, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Initialize,
    Serialize,
    Build,
    FinalizeRequest,
    Deserialize,
}

/// Ordering weight relative to other handlers at the same step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Normal,
    Low,
}

/// Where and how a handler slots into the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerMetadata {
    pub name: &'static str,
    pub step: Step,
    pub priority: Priority,
    pub tags: &'static [&'static str],
    /// Replace a previously registered handler of the same name.
    pub replace_existing: bool,
}

/// Ordered handler pipeline this crate registers into. Execution of the
/// handlers is the engine's business, not ours.
pub trait MiddlewareStack<R, T, E> {
    fn add(&mut self, handler: Arc<dyn FinalizeHandler<R, T, E>>, metadata: HandlerMetadata);
}
