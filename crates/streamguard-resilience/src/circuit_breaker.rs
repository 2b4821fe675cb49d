//! Circuit breaking for the guarded downstream call.
//!
//! Tracks consecutive failures and stops admitting requests once the
//! failure threshold is reached. After the open timeout elapses a single
//! trial request is admitted in the half-open state; its outcome decides
//! whether the circuit closes again or re-opens for another full timeout.

use crate::clock::{Clock, SystemClock};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use streamguard_core::{GuardError, GuardResult};
use tracing::{debug, warn};

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures required to open the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open before admitting a probe
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
        }
    }
}

/// Circuit state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Admitting all requests
    Closed,
    /// Rejecting all requests until the open timeout elapses
    Open,
    /// Admitting requests while a recovery probe is in flight
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Mutable breaker state, transitioned as one group under the lock
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
}

/// Circuit breaker guarding a single downstream resource
#[derive(Debug)]
pub struct CircuitBreaker {
    id: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    #[must_use]
    pub fn new(id: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(id, config, Arc::new(SystemClock))
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(id: impl Into<String>) -> Self {
        Self::new(id, CircuitBreakerConfig::default())
    }

    /// Create with an explicit clock
    #[must_use]
    pub fn with_clock(
        id: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            id: id.into(),
            config,
            clock,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at: None,
            }),
        }
    }

    /// Get the breaker ID
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Consecutive failures recorded since the last success
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Check whether a request may proceed.
    ///
    /// While open, the first call after the timeout elapses moves the
    /// circuit to half-open and is admitted as the recovery probe. Further
    /// arrivals while half-open are also admitted; the probe policy does
    /// not serialize concurrent callers.
    #[must_use]
    pub fn allow(&self) -> bool {
        self.try_admit().is_ok()
    }

    /// Like [`allow`](Self::allow), mapping refusal to a typed error
    /// carrying the remaining open time.
    ///
    /// # Errors
    /// Returns `GuardError::CircuitOpen` while the circuit is rejecting
    pub fn check(&self) -> GuardResult<()> {
        self.try_admit().map_err(|remaining| {
            warn!(
                breaker = %self.id,
                retry_after_ms = remaining.as_millis(),
                "request rejected, circuit open"
            );
            GuardError::circuit_open(Some(remaining))
        })
    }

    /// Record a successful downstream call.
    ///
    /// Unconditionally resets the failure count and closes the circuit.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            debug!(breaker = %self.id, from = %inner.state, "circuit closed");
        }
        inner.failure_count = 0;
        inner.state = CircuitState::Closed;
    }

    /// Record a failed downstream call.
    ///
    /// A failure observed while half-open re-opens the circuit immediately
    /// and restarts the open timeout, regardless of the numeric threshold.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_at = Some(self.clock.now());

        match inner.state {
            CircuitState::HalfOpen => {
                warn!(breaker = %self.id, "recovery probe failed, circuit re-opened");
                inner.state = CircuitState::Open;
            }
            CircuitState::Closed if inner.failure_count >= self.config.failure_threshold => {
                warn!(
                    breaker = %self.id,
                    failures = inner.failure_count,
                    "failure threshold reached, circuit opened"
                );
                inner.state = CircuitState::Open;
            }
            _ => {}
        }
    }

    fn try_admit(&self) -> Result<(), Duration> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => match inner.last_failure_at {
                Some(at) => {
                    let elapsed = self.clock.now().duration_since(at);
                    if elapsed > self.config.open_timeout {
                        debug!(breaker = %self.id, "open timeout elapsed, admitting recovery probe");
                        inner.state = CircuitState::HalfOpen;
                        Ok(())
                    } else {
                        Err(self.config.open_timeout - elapsed)
                    }
                }
                // Open without a recorded failure cannot arise; treat the
                // timeout as already elapsed.
                None => {
                    inner.state = CircuitState::HalfOpen;
                    Ok(())
                }
            },
        }
    }
}
