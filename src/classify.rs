//! Failure classification for retry decisions.
//!
//! Three pure predicates over a failed attempt, composed by [`classify`] with
//! a fixed precedence: throttling wins over transient, transient over server
//! error, and anything left is a client error. The predicates are stateless;
//! calling them twice on the same failure yields the same answer.
//!
//! How a failure exposes its status, error code, or transport condition is the
//! business of the HTTP representation in use — it implements [`ErrorDetails`]
//! and every accessor defaults to "unknown", so an opaque transport error
//! classifies as a client error and is left alone.

use http::{HeaderMap, StatusCode};

/// Error classes a failed attempt can fall into, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The server asked us to slow down.
    Throttling,
    /// Timeout- or connection-flavored failure likely to clear on its own.
    Transient,
    /// A 5xx the server owns but did not flag as transient.
    ServerError,
    /// Everything else; retrying will not help.
    ClientError,
}

impl ErrorKind {
    /// Whether a strategy may authorize another attempt for this class.
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::ClientError)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Throttling => "throttling",
            ErrorKind::Transient => "transient",
            ErrorKind::ServerError => "server error",
            ErrorKind::ClientError => "client error",
        };
        f.write_str(name)
    }
}

/// Capabilities the classifier and the retry-after parser need from a failure.
pub trait ErrorDetails {
    /// Status of the response that produced this failure, if it was HTTP-shaped.
    fn status(&self) -> Option<StatusCode> {
        None
    }

    /// Service-reported error code, if any.
    fn error_code(&self) -> Option<&str> {
        None
    }

    /// True when the failure came from the connection layer (reset, refused).
    fn is_connection_error(&self) -> bool {
        false
    }

    /// Explicit throttling marker carried by the error itself.
    fn throttling_hint(&self) -> bool {
        false
    }

    /// Headers of the response that produced this failure, if it was HTTP-shaped.
    fn response_headers(&self) -> Option<&HeaderMap> {
        None
    }
}

/// Error codes services use to signal throttling.
const THROTTLING_ERROR_CODES: &[&str] = &[
    "BandwidthLimitExceeded",
    "EC2ThrottledException",
    "LimitExceededException",
    "PriorRequestNotComplete",
    "ProvisionedThroughputExceededException",
    "RequestLimitExceeded",
    "RequestThrottled",
    "RequestThrottledException",
    "SlowDown",
    "ThrottledException",
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "TransactionInProgressException",
];

/// Error codes that describe a timed-out exchange.
const TIMEOUT_ERROR_CODES: &[&str] = &["RequestTimeout", "RequestTimeoutException", "TimeoutError"];

/// Status codes the server owns that are worth retrying quickly.
const TRANSIENT_STATUS_CODES: &[u16] = &[500, 502, 503, 504];

/// True when the failure is the server telling us to back off.
pub fn is_throttling_error<E: ErrorDetails + ?Sized>(error: &E) -> bool {
    if error.status() == Some(StatusCode::TOO_MANY_REQUESTS) {
        return true;
    }
    if error.throttling_hint() {
        return true;
    }
    error
        .error_code()
        .is_some_and(|code| THROTTLING_ERROR_CODES.contains(&code))
}

/// True when the failure is timeout- or connection-flavored.
pub fn is_transient_error<E: ErrorDetails + ?Sized>(error: &E) -> bool {
    error.is_connection_error()
        || error
            .error_code()
            .is_some_and(|code| TIMEOUT_ERROR_CODES.contains(&code))
        || error
            .status()
            .is_some_and(|status| TRANSIENT_STATUS_CODES.contains(&status.as_u16()))
}

/// True for 5xx responses not already covered by the transient set.
pub fn is_server_error<E: ErrorDetails + ?Sized>(error: &E) -> bool {
    error
        .status()
        .is_some_and(|status| status.is_server_error() && !is_transient_error(error))
}

/// Classify a failed attempt. Precedence: throttling, then transient, then
/// server error; anything else is a client error.
pub fn classify<E: ErrorDetails + ?Sized>(error: &E) -> ErrorKind {
    if is_throttling_error(error) {
        ErrorKind::Throttling
    } else if is_transient_error(error) {
        ErrorKind::Transient
    } else if is_server_error(error) {
        ErrorKind::ServerError
    } else {
        ErrorKind::ClientError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Failure {
        status: Option<u16>,
        code: Option<&'static str>,
        connection: bool,
        throttling: bool,
    }

    impl ErrorDetails for Failure {
        fn status(&self) -> Option<StatusCode> {
            self.status.and_then(|s| StatusCode::from_u16(s).ok())
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
    }

    #[test]
    fn status_429_is_throttling() {
        let error = Failure { status: Some(429), ..Default::default() };
        assert!(is_throttling_error(&error));
        assert_eq!(classify(&error), ErrorKind::Throttling);
    }

    #[test]
    fn throttling_codes_are_throttling() {
        let error = Failure { code: Some("SlowDown"), ..Default::default() };
        assert!(is_throttling_error(&error));
        let error = Failure { code: Some("ThrottlingException"), ..Default::default() };
        assert!(is_throttling_error(&error));
    }

    #[test]
    fn explicit_hint_is_throttling() {
        let error = Failure { throttling: true, ..Default::default() };
        assert_eq!(classify(&error), ErrorKind::Throttling);
    }

    #[test]
    fn timeouts_and_resets_are_transient() {
        let error = Failure { code: Some("RequestTimeout"), ..Default::default() };
        assert!(is_transient_error(&error));
        let error = Failure { connection: true, ..Default::default() };
        assert!(is_transient_error(&error));
        for status in [500, 502, 503, 504] {
            let error = Failure { status: Some(status), ..Default::default() };
            assert!(is_transient_error(&error), "status {status}");
        }
    }

    #[test]
    fn other_5xx_are_server_errors() {
        for status in [501, 505, 599] {
            let error = Failure { status: Some(status), ..Default::default() };
            assert!(!is_transient_error(&error), "status {status}");
            assert!(is_server_error(&error), "status {status}");
            assert_eq!(classify(&error), ErrorKind::ServerError);
        }
    }

    #[test]
    fn unknown_failures_are_client_errors() {
        let error = Failure::default();
        assert_eq!(classify(&error), ErrorKind::ClientError);
        let error = Failure { status: Some(404), ..Default::default() };
        assert_eq!(classify(&error), ErrorKind::ClientError);
    }

    #[test]
    fn throttling_takes_precedence_over_server_error() {
        let error = Failure { status: Some(429), throttling: true, ..Default::default() };
        assert_eq!(classify(&error), ErrorKind::Throttling);

        // 503 alone would be transient; a throttling code wins.
        let error = Failure { status: Some(503), code: Some("Throttling"), ..Default::default() };
        assert_eq!(classify(&error), ErrorKind::Throttling);
    }

    #[test]
    fn transient_takes_precedence_over_server_error() {
        let error = Failure { status: Some(500), ..Default::default() };
        assert_eq!(classify(&error), ErrorKind::Transient);
    }

    #[test]
    fn classification_is_pure() {
        let error = Failure { status: Some(502), code: Some("Whatever"), ..Default::default() };
        assert_eq!(classify(&error), classify(&error));
        assert_eq!(is_transient_error(&error), is_transient_error(&error));
    }

    #[test]
    fn retryability_follows_the_class() {
        assert!(ErrorKind::Throttling.is_retryable());
        assert!(ErrorKind::Transient.is_retryable());
        assert!(ErrorKind::ServerError.is_retryable());
        assert!(!ErrorKind::ClientError.is_retryable());
    }
}
