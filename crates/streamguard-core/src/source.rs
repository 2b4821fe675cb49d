//! The downstream stream-source boundary.
//!
//! The guard layer treats the generative backend as an opaque collaborator
//! that, given a prompt, produces a lazy, finite, non-restartable sequence
//! of text chunks and may fail at any point after producing zero or more
//! of them.

use crate::error::SourceError;
use crate::streaming::StreamChunk;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::time::Duration;
use tracing::debug;

/// Chunk sequence produced by one downstream call
pub type ChunkStream = BoxStream<'static, Result<StreamChunk, SourceError>>;

/// Downstream producer of streamed text.
///
/// Implementations surface at most one terminal error per call, either at
/// open or as the final stream item; a sequence never resumes after it.
#[async_trait]
pub trait StreamSource: Send + Sync + 'static {
    /// Start a stream for the given prompt
    ///
    /// # Errors
    /// Returns `SourceError` when the stream cannot be opened at all
    async fn open(&self, prompt: &str) -> Result<ChunkStream, SourceError>;
}

/// In-process source yielding a fixed chunk list.
///
/// Serves as the demo backend and as the test double for every guard-layer
/// scenario: chunks can be delayed to simulate generation latency, and a
/// failure can be injected at open or after a given number of chunks.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    chunks: Vec<String>,
    chunk_delay: Duration,
    fail_after: Option<usize>,
    fail_on_open: bool,
}

impl ScriptedSource {
    /// Create a source yielding the given chunks with no delay
    #[must_use]
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            chunk_delay: Duration::ZERO,
            fail_after: None,
            fail_on_open: false,
        }
    }

    /// A small fixed-token source for demos and smoke tests
    #[must_use]
    pub fn demo() -> Self {
        Self::new(["This ", "is ", "a ", "streaming ", "response"])
            .with_chunk_delay(Duration::from_millis(100))
    }

    /// Pause this long before yielding each chunk
    #[must_use]
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Yield `n` chunks, then end the stream with an error
    #[must_use]
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Fail every call before producing any chunk
    #[must_use]
    pub fn failing_on_open(mut self) -> Self {
        self.fail_on_open = true;
        self
    }
}

#[async_trait]
impl StreamSource for ScriptedSource {
    async fn open(&self, prompt: &str) -> Result<ChunkStream, SourceError> {
        if self.fail_on_open {
            return Err(SourceError::new("scripted source refused to open"));
        }

        debug!(prompt, chunks = self.chunks.len(), "opening scripted stream");

        let take = self
            .fail_after
            .map_or(self.chunks.len(), |n| n.min(self.chunks.len()));
        let mut items: Vec<Result<StreamChunk, SourceError>> = self
            .chunks
            .iter()
            .take(take)
            .enumerate()
            .map(|(index, text)| Ok(StreamChunk::new(index as u32, text.clone())))
            .collect();
        if self.fail_after.is_some() {
            items.push(Err(SourceError::new("scripted stream failure")));
        }

        let delay = self.chunk_delay;
        let stream = stream::iter(items)
            .then(move |item| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                item
            })
            .boxed();
        Ok(stream)
    }
}
