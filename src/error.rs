//! Terminal error shapes for the retry middleware.

use std::fmt;

use crate::classify::ErrorKind;
use crate::pipeline::AttemptMetadata;

/// Terminal failure surfaced by the retry middleware.
///
/// `Attempt` preserves the last attempt's own error so callers can tell
/// "this happened and we gave up after N tries" apart from a first-attempt
/// failure; the middleware never substitutes a synthetic exhaustion error.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The last attempt's own failure, decorated with attempt accounting.
    Attempt {
        source: E,
        metadata: AttemptMetadata,
    },
    /// The strategy refused to issue an initial token; no attempt was made.
    TokenAcquisition(RetryRefusal),
    /// The caller's cancellation signal fired before the request settled.
    Cancelled { metadata: AttemptMetadata },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attempt { source, metadata } => {
                write!(
                    f,
                    "request failed after {} attempt(s): {}",
                    metadata.attempts, source
                )
            }
            Self::TokenAcquisition(refusal) => {
                write!(f, "retry strategy refused an initial token: {}", refusal)
            }
            Self::Cancelled { metadata } => {
                write!(f, "request cancelled after {} attempt(s)", metadata.attempts)
            }
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Attempt { source, .. } => Some(source),
            Self::TokenAcquisition(refusal) => Some(refusal),
            Self::Cancelled { .. } => None,
        }
    }
}

impl<E> RetryError<E> {
    /// Attempt accounting, when any attempt was made.
    pub fn metadata(&self) -> Option<&AttemptMetadata> {
        match self {
            Self::Attempt { metadata, .. } | Self::Cancelled { metadata } => Some(metadata),
            Self::TokenAcquisition(_) => None,
        }
    }

    /// Borrow the last attempt's own error, if this failure carries one.
    pub fn as_source(&self) -> Option<&E> {
        match self {
            Self::Attempt { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Take the last attempt's own error, if this failure carries one.
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::Attempt { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Check whether the caller's cancellation signal ended the request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// A strategy's terminal decline: no further attempt is authorized.
///
/// Never surfaced as the request's failure on its own — the middleware
/// responds to a refusal by decorating the last attempt's error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryRefusal {
    /// The per-request attempt ceiling was reached.
    #[error("attempt budget exhausted ({max_attempts} attempts)")]
    AttemptBudgetExhausted { max_attempts: u32 },
    /// The partition's shared retry capacity is spent.
    #[error("retry quota exhausted for partition {partition:?}")]
    QuotaExhausted { partition: String },
    /// The failure class is one retrying will not help.
    #[error("{0} failures are not retryable")]
    NotRetryable(ErrorKind),
}
