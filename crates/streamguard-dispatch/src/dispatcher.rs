//! Guarded dispatch of streaming requests.
//!
//! Admission runs on the caller's task: the rate limiter is consulted
//! first, then the circuit breaker, and a refusal resolves the completion
//! immediately with no pool submission and no breaker interaction. Only
//! admitted requests reach the worker pool, so a caller learns about
//! overload without waiting for a pool slot.

use crate::completion::{Completion, CompletionResolver};
use futures::StreamExt;
use std::sync::Arc;
use streamguard_core::{ChunkSink, GuardError, StreamSource, StreamSummary};
use streamguard_resilience::{Bulkhead, BulkheadConfig, CircuitBreaker, RateLimiter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Hard upper bound on concurrently in-flight downstream streams
    pub max_concurrent_streams: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_streams: 5,
        }
    }
}

/// Guarded entry point for streaming requests
pub struct Dispatcher {
    rate_limiter: Arc<RateLimiter>,
    circuit_breaker: Arc<CircuitBreaker>,
    bulkhead: Arc<Bulkhead>,
    source: Arc<dyn StreamSource>,
}

impl Dispatcher {
    /// Create a new dispatcher builder
    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// The rate limiter guarding admission
    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// The circuit breaker guarding admission
    #[must_use]
    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }

    /// The pool bounding in-flight streams
    #[must_use]
    pub fn bulkhead(&self) -> &Arc<Bulkhead> {
        &self.bulkhead
    }

    /// Dispatch a prompt, forwarding produced chunks to `sink`.
    ///
    /// Chunks reach the sink in production order, on the worker driving
    /// the stream. The returned handle resolves exactly once; the breaker
    /// already reflects the outcome by the time it does. Must be called
    /// from within a Tokio runtime.
    pub fn request(&self, prompt: impl Into<String>, sink: Arc<dyn ChunkSink>) -> Completion {
        let prompt = prompt.into();
        let request_id = Uuid::new_v4();

        if let Err(err) = self.rate_limiter.check() {
            return Completion::rejected(err);
        }
        if let Err(err) = self.circuit_breaker.check() {
            return Completion::rejected(err);
        }

        let cancel = CancellationToken::new();
        let (resolver, completion) = Completion::pending(cancel.clone());

        let bulkhead = Arc::clone(&self.bulkhead);
        let breaker = Arc::clone(&self.circuit_breaker);
        let source = Arc::clone(&self.source);
        tokio::spawn(async move {
            let _permit = bulkhead.acquire().await;
            run_stream(request_id, source, breaker, prompt, sink, cancel, resolver).await;
        });

        completion
    }
}

/// Drive one admitted stream to its single resolution.
///
/// The breaker update always happens before the completion resolves, so
/// an observer of the outcome can rely on the breaker already reflecting
/// it.
async fn run_stream(
    request_id: Uuid,
    source: Arc<dyn StreamSource>,
    breaker: Arc<CircuitBreaker>,
    prompt: String,
    sink: Arc<dyn ChunkSink>,
    cancel: CancellationToken,
    resolver: CompletionResolver,
) {
    debug!(%request_id, "stream worker started");

    let opened = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!(%request_id, "cancelled before the stream opened");
            resolver.resolve(Err(GuardError::Cancelled));
            return;
        }
        opened = source.open(&prompt) => opened,
    };

    let mut stream = match opened {
        Ok(stream) => stream,
        Err(cause) => {
            breaker.record_failure();
            warn!(%request_id, error = %cause, "stream failed to open");
            resolver.resolve(Err(GuardError::stream_failed(cause)));
            return;
        }
    };

    let mut delivered: u32 = 0;
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(%request_id, delivered, "stream cancelled by caller");
                resolver.resolve(Err(GuardError::Cancelled));
                return;
            }
            item = stream.next() => match item {
                Some(Ok(chunk)) => {
                    sink.deliver(chunk);
                    delivered += 1;
                }
                Some(Err(cause)) => {
                    breaker.record_failure();
                    warn!(%request_id, delivered, error = %cause, "stream failed");
                    resolver.resolve(Err(GuardError::stream_failed(cause)));
                    return;
                }
                None => {
                    breaker.record_success();
                    debug!(%request_id, delivered, "stream completed");
                    resolver.resolve(Ok(StreamSummary {
                        chunk_count: delivered,
                    }));
                    return;
                }
            },
        }
    }
}

/// Builder for [`Dispatcher`]
#[derive(Default)]
pub struct DispatcherBuilder {
    source: Option<Arc<dyn StreamSource>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    bulkhead: Option<Arc<Bulkhead>>,
    config: DispatcherConfig,
}

impl DispatcherBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the downstream stream source (required)
    #[must_use]
    pub fn source(mut self, source: Arc<dyn StreamSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Use a pre-built rate limiter, e.g. one shared across dispatchers
    #[must_use]
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Use a pre-built circuit breaker
    #[must_use]
    pub fn circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    /// Use a pre-built bulkhead
    #[must_use]
    pub fn bulkhead(mut self, bulkhead: Arc<Bulkhead>) -> Self {
        self.bulkhead = Some(bulkhead);
        self
    }

    /// Set the bound on concurrently in-flight streams
    #[must_use]
    pub fn max_concurrent_streams(mut self, max: usize) -> Self {
        self.config.max_concurrent_streams = max;
        self
    }

    /// Build the dispatcher
    ///
    /// # Panics
    /// Panics if no stream source was set
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn build(self) -> Dispatcher {
        let source = self.source.expect("stream source is required");

        Dispatcher {
            rate_limiter: self
                .rate_limiter
                .unwrap_or_else(|| Arc::new(RateLimiter::with_defaults("dispatcher"))),
            circuit_breaker: self
                .circuit_breaker
                .unwrap_or_else(|| Arc::new(CircuitBreaker::with_defaults("dispatcher"))),
            bulkhead: self.bulkhead.unwrap_or_else(|| {
                Arc::new(Bulkhead::new(
                    "dispatcher",
                    BulkheadConfig {
                        max_concurrent: self.config.max_concurrent_streams,
                    },
                ))
            }),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamguard_core::ScriptedSource;

    #[test]
    fn test_builder_defaults() {
        let dispatcher = Dispatcher::builder()
            .source(Arc::new(ScriptedSource::new(["a"])))
            .build();

        assert_eq!(dispatcher.bulkhead().max_concurrent(), 5);
        assert_eq!(dispatcher.rate_limiter().config().max_per_window, 60);
        assert_eq!(dispatcher.circuit_breaker().config().failure_threshold, 5);
    }

    #[test]
    fn test_builder_pool_size_override() {
        let dispatcher = Dispatcher::builder()
            .source(Arc::new(ScriptedSource::new(["a"])))
            .max_concurrent_streams(2)
            .build();

        assert_eq!(dispatcher.bulkhead().max_concurrent(), 2);
    }

    #[test]
    #[should_panic(expected = "stream source is required")]
    fn test_builder_requires_source() {
        let _ = Dispatcher::builder().build();
    }
}
