//! # StreamGuard Dispatch
//!
//! Orchestration for guarded streaming requests. Every request passes the
//! rate limiter and then the circuit breaker before a pooled worker opens
//! the downstream stream and forwards its chunks, in production order, to
//! the caller's sink. The caller holds a [`Completion`] that resolves
//! exactly once and can request early termination of the in-flight
//! stream.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod completion;
pub mod dispatcher;

// Re-export main types
pub use completion::Completion;
pub use dispatcher::{Dispatcher, DispatcherBuilder, DispatcherConfig};
