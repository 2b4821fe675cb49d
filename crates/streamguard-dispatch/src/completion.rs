//! Completion handle for a dispatched stream.

use streamguard_core::{GuardError, GuardResult, SourceError, StreamSummary};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Sending half held by the stream worker; resolves the handle once.
#[derive(Debug)]
pub(crate) struct CompletionResolver {
    tx: oneshot::Sender<GuardResult<StreamSummary>>,
}

impl CompletionResolver {
    /// Resolve the completion. A dropped handle is not an error.
    pub(crate) fn resolve(self, outcome: GuardResult<StreamSummary>) {
        let _ = self.tx.send(outcome);
    }
}

/// Handle observing the outcome of one dispatched request.
///
/// Resolves exactly once, to either a summary of the delivered stream or
/// one typed failure. Dropping the handle does not stop the stream; call
/// [`cancel`](Self::cancel) to withdraw interest explicitly.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<GuardResult<StreamSummary>>,
    cancel: CancellationToken,
}

impl Completion {
    /// Create a pending completion and the resolver for its worker
    pub(crate) fn pending(cancel: CancellationToken) -> (CompletionResolver, Self) {
        let (tx, rx) = oneshot::channel();
        (CompletionResolver { tx }, Self { rx, cancel })
    }

    /// Create a completion already resolved with an admission rejection
    pub(crate) fn rejected(err: GuardError) -> Self {
        let (resolver, completion) = Self::pending(CancellationToken::new());
        resolver.resolve(Err(err));
        completion
    }

    /// Request early termination of the in-flight stream.
    ///
    /// The worker ceases chunk delivery and the handle resolves with
    /// `GuardError::Cancelled`. Cancelling an already resolved request
    /// has no effect.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the request to resolve.
    ///
    /// # Errors
    /// Returns the typed failure the request resolved with
    pub async fn wait(self) -> GuardResult<StreamSummary> {
        match self.rx.await {
            Ok(outcome) => outcome,
            // The worker resolves before dropping its sender; reaching
            // this arm means the worker task itself died.
            Err(_) => Err(GuardError::stream_failed(SourceError::new(
                "stream worker terminated before resolving",
            ))),
        }
    }
}
