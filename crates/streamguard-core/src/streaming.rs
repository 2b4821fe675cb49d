//! Chunk and sink types for ordered streaming delivery.
//!
//! Chunks reach the sink in production order for a single request; across
//! concurrent requests there is no ordering relationship.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One unit of partial output from a streaming call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Position of this chunk in the produced sequence, starting at 0
    pub index: u32,

    /// Text payload
    pub text: String,
}

impl StreamChunk {
    /// Create a new chunk
    #[must_use]
    pub fn new(index: u32, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// Summary of a stream that ran to completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSummary {
    /// Number of chunks delivered to the sink
    pub chunk_count: u32,
}

/// Consumer of stream chunks.
///
/// `deliver` is invoked on the worker driving the stream, not on the
/// thread that issued the request, and must not block: the guard layer
/// applies no backpressure, so a sink that cannot keep up has to buffer
/// or apply its own flow control.
pub trait ChunkSink: Send + Sync {
    /// Accept the next chunk in production order
    fn deliver(&self, chunk: StreamChunk);
}

impl<F> ChunkSink for F
where
    F: Fn(StreamChunk) + Send + Sync,
{
    fn deliver(&self, chunk: StreamChunk) {
        self(chunk);
    }
}

/// Sink forwarding chunks into an unbounded channel.
///
/// The channel is unbounded: chunks are pushed as fast as the source
/// produces them and a slow consumer buffers. Delivery after the receiver
/// is dropped is a no-op; cancellation is the explicit way to stop an
/// in-flight stream.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StreamChunk>,
}

impl ChannelSink {
    /// Create a sink and the receiving half handed to the caller
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamChunk>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ChunkSink for ChannelSink {
    fn deliver(&self, chunk: StreamChunk) {
        let _ = self.tx.send(chunk);
    }
}
