//! Degraded-mode credential handling.
//!
//! When a credential source cannot be reached in time, failing every request
//! on the spot is worse than briefly running on the previous credential set.
//! [`extend_credentials`] synthesizes a short, randomized validity extension
//! for a set whose source-reported lifetime has run out, and
//! [`StabilityGuard`] wraps a source with exactly that fallback.
//!
//! The extension is a single-shot computation plus a warning through the
//! injected [`Logger`]; it performs no I/O and no retries of its own. How the
//! source is refreshed (and when to call this) is the provider's business.

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use rand::{rng, Rng};

use crate::clock::{SystemClock, WallClock};

/// Floor of the synthetic validity extension.
const EXTENSION_FLOOR_SECS: i64 = 5 * 60;

/// Width of the randomized window added on top of the floor.
const EXTENSION_JITTER_SECS: i64 = 5 * 60;

/// Minimal logging capability injected by the caller.
pub trait Logger: Send + Sync {
    fn warn(&self, message: &str);
}

/// Production logger routing warnings into `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }
}

/// A credential set as reported by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    /// Expiration the source reported, if the credentials expire at all.
    pub expiration: Option<DateTime<Utc>>,
}

/// A credential set whose validity was synthetically extended.
///
/// `expiration` is the value downstream validity checks must use;
/// `original_expiration` records what the source last reported and is
/// informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub expiration: DateTime<Utc>,
    pub original_expiration: Option<DateTime<Utc>>,
}

/// Extend `credentials` past their reported lifetime by 5–10 minutes from
/// now, warning through `logger` so an operator can see why stale credentials
/// are still in use.
pub fn extend_credentials(credentials: &Credentials, logger: &dyn Logger) -> ExtendedCredentials {
    extend_credentials_with(credentials, logger, &SystemClock, &mut rng())
}

/// Deterministic variant of [`extend_credentials`]: the clock pins "now" and
/// the RNG drives the jitter draw.
pub fn extend_credentials_with<R: Rng>(
    credentials: &Credentials,
    logger: &dyn Logger,
    clock: &dyn WallClock,
    rng: &mut R,
) -> ExtendedCredentials {
    extend_parts(
        credentials.clone(),
        credentials.expiration,
        logger,
        clock,
        rng,
    )
}

/// The extension itself: offset = floor + ⌊draw * window⌋, draw in [0, 1).
fn extend_parts<R: Rng>(
    credentials: Credentials,
    original_expiration: Option<DateTime<Utc>>,
    logger: &dyn Logger,
    clock: &dyn WallClock,
    rng: &mut R,
) -> ExtendedCredentials {
    let jitter_secs = (rng.random::<f64>() * EXTENSION_JITTER_SECS as f64).floor() as i64;
    let expiration = clock.now() + TimeDelta::seconds(EXTENSION_FLOOR_SECS + jitter_secs);

    let reported = match original_expiration {
        Some(original) => original.to_rfc3339(),
        None => "unknown".to_owned(),
    };
    logger.warn(&format!(
        "Attempting credential expiration extension due to a credential service availability \
         issue. The reported expiration was {reported}; a refresh of these credentials will be \
         attempted after {}.",
        expiration.to_rfc3339(),
    ));

    ExtendedCredentials {
        access_key_id: credentials.access_key_id,
        secret_access_key: credentials.secret_access_key,
        session_token: credentials.session_token,
        expiration,
        original_expiration,
    }
}

/// Errors surfaced by credential sources.
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    /// The source could not produce credentials in time.
    #[error("credential source unavailable: {source}")]
    SourceUnavailable {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CredentialsError {
    pub fn unavailable(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::SourceUnavailable { source: Box::new(source) }
    }
}

/// An async credential source. The network call behind it is not ours.
#[async_trait]
pub trait ProvideCredentials: Send + Sync {
    async fn provide_credentials(&self) -> Result<Credentials, CredentialsError>;
}

/// What the guard hands to consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuedCredentials {
    /// The source's own set, returned as-is.
    Fresh(Credentials),
    /// A set running on a synthetic validity extension.
    Extended(ExtendedCredentials),
}

impl IssuedCredentials {
    pub fn access_key_id(&self) -> &str {
        match self {
            Self::Fresh(credentials) => &credentials.access_key_id,
            Self::Extended(extended) => &extended.access_key_id,
        }
    }

    /// The expiration validity checks must use.
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Fresh(credentials) => credentials.expiration,
            Self::Extended(extended) => Some(extended.expiration),
        }
    }

    pub fn is_extended(&self) -> bool {
        matches!(self, Self::Extended(_))
    }
}

/// Wraps a credential source with the degraded-mode fallback: remember the
/// last good set and serve a short extension of it when a refresh fails.
pub struct StabilityGuard<P> {
    source: P,
    logger: Arc<dyn Logger>,
    clock: Arc<dyn WallClock>,
    last_good: Mutex<Option<IssuedCredentials>>,
}

impl<P> fmt::Debug for StabilityGuard<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StabilityGuard")
            .field("clock", &self.clock)
            .finish()
    }
}

impl<P: ProvideCredentials> StabilityGuard<P> {
    pub fn new(source: P) -> Self {
        Self {
            source,
            logger: Arc::new(TracingLogger),
            clock: Arc::new(SystemClock),
            last_good: Mutex::new(None),
        }
    }

    /// Replace the logger receiving extension warnings.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Replace the clock used for staleness checks and extension math.
    pub fn with_clock(mut self, clock: Arc<dyn WallClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Refresh through the source, falling back to an extension of the last
    /// good set when the source fails and history exists.
    pub async fn provide(&self) -> Result<IssuedCredentials, CredentialsError> {
        match self.source.provide_credentials().await {
            Ok(credentials) => {
                // Sources occasionally answer with an already-expired set;
                // serve it on an extension rather than bouncing the caller.
                let issued = if credentials
                    .expiration
                    .is_some_and(|expiration| expiration < self.clock.now())
                {
                    IssuedCredentials::Extended(extend_credentials_with(
                        &credentials,
                        self.logger.as_ref(),
                        self.clock.as_ref(),
                        &mut rng(),
                    ))
                } else {
                    IssuedCredentials::Fresh(credentials)
                };
                *self.last_good.lock().unwrap() = Some(issued.clone());
                Ok(issued)
            }
            Err(error) => {
                let cached = self.last_good.lock().unwrap().clone();
                let Some(previous) = cached else {
                    return Err(error);
                };
                self.logger.warn(&format!("Credential renew failed: {error}"));
                let extended = match previous {
                    IssuedCredentials::Fresh(credentials) => extend_credentials_with(
                        &credentials,
                        self.logger.as_ref(),
                        self.clock.as_ref(),
                        &mut rng(),
                    ),
                    // Keep the first reported expiration across repeated
                    // extensions so staleness diagnostics stay honest.
                    IssuedCredentials::Extended(extended) => extend_parts(
                        Credentials {
                            access_key_id: extended.access_key_id,
                            secret_access_key: extended.secret_access_key,
                            session_token: extended.session_token,
                            expiration: Some(extended.expiration),
                        },
                        extended.original_expiration,
                        self.logger.as_ref(),
                        self.clock.as_ref(),
                        &mut rng(),
                    ),
                };
                let issued = IssuedCredentials::Extended(extended);
                *self.last_good.lock().unwrap() = Some(issued.clone());
                Ok(issued)
            }
        }
    }
}
