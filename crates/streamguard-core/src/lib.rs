//! # StreamGuard Core
//!
//! Shared types for the stream-guard stack:
//! - Error taxonomy covering admission rejections and downstream failures
//! - Chunk and sink types for ordered streaming delivery
//! - The `StreamSource` trait the guarded downstream implements

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod source;
pub mod streaming;

// Re-export main types
pub use error::{GuardError, GuardResult, SourceError};
pub use source::{ChunkStream, ScriptedSource, StreamSource};
pub use streaming::{ChannelSink, ChunkSink, StreamChunk, StreamSummary};
