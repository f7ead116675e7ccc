#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use http::header::{HeaderMap, HeaderValue};
use http::StatusCode;
use secondwind::{
    ErrorDetails, FinalizeArgs, HttpPayload, RetryErrorInfo, RetryRefusal, RetryToken,
    SendHandler, TokenRetryStrategy, INVOCATION_ID_HEADER, REQUEST_HEADER,
};

/// Failure with a scriptable classification surface.
#[derive(Debug, Clone, PartialEq)]
pub struct TestError {
    pub message: &'static str,
    pub status: Option<StatusCode>,
    pub code: Option<&'static str>,
    pub throttling: bool,
    pub connection: bool,
    pub headers: Option<HeaderMap>,
}

impl TestError {
    pub fn new(message: &'static str) -> Self {
        Self {
            message,
            status: None,
            code: None,
            throttling: false,
            connection: false,
            headers: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = StatusCode::from_u16(status).ok();
        self
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn throttling(mut self) -> Self {
        self.throttling = true;
        self
    }

    pub fn connection(mut self) -> Self {
        self.connection = true;
        self
    }

    /// Attach a response with a `retry-after` header.
    pub fn with_retry_after(mut self, value: &str) -> Self {
        let mut headers = self.headers.unwrap_or_default();
        headers.insert(
            http::header::RETRY_AFTER,
            HeaderValue::from_str(value).unwrap(),
        );
        self.headers = Some(headers);
        self
    }

    /// Attach a response with no interesting headers.
    pub fn with_empty_response(mut self) -> Self {
        self.headers = Some(HeaderMap::new());
        self
    }
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TestError {}

impl ErrorDetails for TestError {
    fn status(&self) -> Option<StatusCode> {
        self.status
    }

    fn error_code(&self) -> Option<&str> {
        self.code
    }

    fn is_connection_error(&self) -> bool {
        self.connection
    }

    fn throttling_hint(&self) -> bool {
        self.throttling
    }

    fn response_headers(&self) -> Option<&HeaderMap> {
        self.headers.as_ref()
    }
}

/// A request shape that is not HTTP at all.
#[derive(Debug, Default)]
pub struct OpaqueRequest;

impl HttpPayload for OpaqueRequest {
    fn http_headers_mut(&mut self) -> Option<&mut HeaderMap> {
        None
    }
}

/// Retry headers observed on one outgoing send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSnapshot {
    pub invocation_id: Option<String>,
    pub attempt: Option<String>,
}

impl HeaderSnapshot {
    pub fn bare() -> Self {
        Self { invocation_id: None, attempt: None }
    }
}

/// Send step replaying a script of outcomes, recording per-call retry headers.
/// Once the script runs out it keeps failing with the template error if one
/// was set, otherwise it keeps succeeding.
pub struct ScriptedSend {
    outcomes: Mutex<VecDeque<Result<&'static str, TestError>>>,
    failure_template: Mutex<Option<TestError>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<HeaderSnapshot>>,
}

impl ScriptedSend {
    pub fn script(
        outcomes: impl IntoIterator<Item = Result<&'static str, TestError>>,
    ) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            failure_template: Mutex::new(None),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::script([Ok("ok")])
    }

    /// Fails with clones of `error` forever.
    pub fn always_failing(error: TestError) -> Self {
        let send = Self::script([]);
        *send.failure_template.lock().unwrap() = Some(error);
        send
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn snapshots(&self) -> Vec<HeaderSnapshot> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl<R: HttpPayload + Send> SendHandler<R, &'static str, TestError> for ScriptedSend {
    async fn send(&self, args: &mut FinalizeArgs<R>) -> Result<&'static str, TestError> {
        let snapshot = match args.request.http_headers_mut() {
            Some(headers) => HeaderSnapshot {
                invocation_id: headers
                    .get(INVOCATION_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned),
                attempt: headers
                    .get(REQUEST_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned),
            },
            None => HeaderSnapshot::bare(),
        };
        self.seen.lock().unwrap().push(snapshot);
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(outcome) = self.outcomes.lock().unwrap().pop_front() {
            return outcome;
        }
        match &*self.failure_template.lock().unwrap() {
            Some(error) => Err(error.clone()),
            None => Ok("ok"),
        }
    }
}

/// Token strategy granting a fixed delay per refresh, recording every call.
#[derive(Debug)]
pub struct RecordingStrategy {
    delay: Duration,
    grant_limit: Option<u32>,
    refuse_acquire: bool,
    acquired_partitions: Mutex<Vec<String>>,
    refreshes: Mutex<Vec<RetryErrorInfo>>,
    successes: AtomicUsize,
}

impl RecordingStrategy {
    /// Grants every refresh.
    pub fn granting(delay: Duration) -> Self {
        Self {
            delay,
            grant_limit: None,
            refuse_acquire: false,
            acquired_partitions: Mutex::new(Vec::new()),
            refreshes: Mutex::new(Vec::new()),
            successes: AtomicUsize::new(0),
        }
    }

    /// Grants the first `grants` refreshes, then refuses.
    pub fn granting_up_to(grants: u32, delay: Duration) -> Self {
        Self { grant_limit: Some(grants), ..Self::granting(delay) }
    }

    /// Refuses to issue even the initial token.
    pub fn refusing_acquire() -> Self {
        Self { refuse_acquire: true, ..Self::granting(Duration::ZERO) }
    }

    pub fn acquired_partitions(&self) -> Vec<String> {
        self.acquired_partitions.lock().unwrap().clone()
    }

    pub fn refreshes(&self) -> Vec<RetryErrorInfo> {
        self.refreshes.lock().unwrap().clone()
    }

    pub fn success_count(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRetryStrategy for RecordingStrategy {
    fn mode(&self) -> &str {
        "recording"
    }

    async fn acquire_initial_retry_token(
        &self,
        partition: &str,
    ) -> Result<RetryToken, RetryRefusal> {
        if self.refuse_acquire {
            return Err(RetryRefusal::QuotaExhausted { partition: partition.to_owned() });
        }
        self.acquired_partitions.lock().unwrap().push(partition.to_owned());
        Ok(RetryToken::new(partition))
    }

    async fn refresh_retry_token_for_retry(
        &self,
        token: RetryToken,
        error_info: &RetryErrorInfo,
    ) -> Result<RetryToken, RetryRefusal> {
        self.refreshes.lock().unwrap().push(*error_info);
        if let Some(limit) = self.grant_limit {
            if token.retry_count() >= limit {
                return Err(RetryRefusal::AttemptBudgetExhausted { max_attempts: limit + 1 });
            }
        }
        Ok(token.refreshed(self.delay, 5))
    }

    async fn record_success(&self, _token: RetryToken) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }
}
