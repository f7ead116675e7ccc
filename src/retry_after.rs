//! Server-suggested retry delays.
//!
//! Extracts a `retry-after` header from the response attached to a failed
//! attempt and normalizes it into an absolute instant. Accepts RFC 3339 and
//! HTTP-date timestamps as well as a plain count of seconds. Malformed or
//! absent values simply produce no hint; nothing in here panics or errors.

use chrono::{DateTime, TimeDelta, Utc};

use crate::classify::ErrorDetails;

/// Extract a retry-after hint from the failure's response, if it carries one.
///
/// The header lookup is case-insensitive (`Retry-After` and friends all
/// match). Failures without an HTTP-shaped response produce no hint.
pub fn retry_after_hint<E: ErrorDetails + ?Sized>(error: &E) -> Option<DateTime<Utc>> {
    retry_after_hint_at(error, Utc::now())
}

/// Deterministic variant of [`retry_after_hint`]; `now` anchors values given
/// as a count of seconds.
pub fn retry_after_hint_at<E: ErrorDetails + ?Sized>(
    error: &E,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let headers = error.response_headers()?;
    let value = headers.get(http::header::RETRY_AFTER)?.to_str().ok()?;
    parse_value(value.trim(), now)
}

fn parse_value(value: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    let seconds: f64 = value.parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    // `as` saturates, so absurd values fall out via checked_add_signed below.
    let millis = (seconds * 1000.0) as i64;
    now.checked_add_signed(TimeDelta::milliseconds(millis))
}
