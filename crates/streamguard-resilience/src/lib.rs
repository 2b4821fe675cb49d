//! # StreamGuard Resilience
//!
//! Admission guards protecting a slow, failure-prone streaming downstream:
//! - Circuit breaker with a half-open recovery probe
//! - Sliding-window rate limiter
//! - Bulkhead bounding concurrent in-flight streams
//! - Clock abstraction so time-driven behavior stays testable

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bulkhead;
pub mod circuit_breaker;
pub mod clock;
pub mod rate_limiter;

// Re-export main types
pub use bulkhead::{Bulkhead, BulkheadConfig, BulkheadPermit};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
