//! Error types for the guard layer.
//!
//! Every rejection or failure resolves with a distinguishable kind so
//! callers can branch between retrying later and surfacing the failure to
//! the end user.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using `GuardError`
pub type GuardResult<T> = Result<T, GuardError>;

/// Error raised by the guarded downstream source.
///
/// This is the only error shape the core accepts from a [`StreamSource`];
/// transport-specific failures must be mapped into it at the boundary.
///
/// [`StreamSource`]: crate::source::StreamSource
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SourceError {
    message: String,
    retryable: bool,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SourceError {
    /// Create a non-retryable source error
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
            source: None,
        }
    }

    /// Create a retryable source error
    #[must_use]
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
            source: None,
        }
    }

    /// Attach an underlying cause
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Check if the caller may reasonably retry
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

/// Guard error covering every admission and streaming outcome
#[derive(Debug, Error)]
pub enum GuardError {
    /// Admission rejected by the rate limiter
    #[error("rate limit exceeded: {limit} requests per {window:?}")]
    RateLimitExceeded {
        /// Maximum admissions per window
        limit: u32,
        /// Window length
        window: Duration,
    },

    /// Admission rejected by the circuit breaker
    #[error("circuit breaker open")]
    CircuitOpen {
        /// Time remaining until the breaker admits a probe, when known
        retry_after: Option<Duration>,
    },

    /// The downstream stream failed, possibly after partial output
    #[error("stream failed")]
    StreamFailed {
        /// The downstream cause
        #[source]
        source: SourceError,
    },

    /// The caller withdrew interest before the stream completed
    #[error("stream cancelled by caller")]
    Cancelled,
}

impl GuardError {
    /// Create a rate limit exceeded error
    #[must_use]
    pub fn rate_limit_exceeded(limit: u32, window: Duration) -> Self {
        Self::RateLimitExceeded { limit, window }
    }

    /// Create a circuit open error
    #[must_use]
    pub fn circuit_open(retry_after: Option<Duration>) -> Self {
        Self::CircuitOpen { retry_after }
    }

    /// Create a stream failed error wrapping the downstream cause
    #[must_use]
    pub fn stream_failed(source: SourceError) -> Self {
        Self::StreamFailed { source }
    }

    /// Get the error code for programmatic handling
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::StreamFailed { .. } => "stream_failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Check if this error is retryable
    ///
    /// Admission rejections are always retryable; a failed stream is
    /// retryable only when the downstream cause says it is. A cancelled
    /// request reflects the caller's own choice and is not retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimitExceeded { .. } | Self::CircuitOpen { .. } => true,
            Self::StreamFailed { source } => source.is_retryable(),
            Self::Cancelled => false,
        }
    }

    /// Check if this error is an admission rejection.
    ///
    /// Rejections resolve before any pool work is scheduled; no partial
    /// output can have reached the sink.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::RateLimitExceeded { .. } | Self::CircuitOpen { .. })
    }
}

impl From<SourceError> for GuardError {
    fn from(source: SourceError) -> Self {
        Self::StreamFailed { source }
    }
}
