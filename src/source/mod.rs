//! Chunk transports: one trait with a live USB backend and an offline
//! capture-replay backend, plus the write-through recorder.

pub mod live;
pub mod offline;
pub mod record;

use crate::error::StreamError;
use crate::types::Chunk;

/// A sequence of fixed-size byte buffers with strictly increasing, gap-free
/// sequence indices. `Ok(None)` is end-of-stream (an exhausted offline
/// source); the live backend never ends on its own and instead yields a
/// chunk, a zero-length heartbeat on read timeout, or a fatal transport
/// error.
pub trait ChunkSource {
    fn next_chunk(&mut self) -> Result<Option<Chunk>, StreamError>;

    /// Sequence index the next chunk will carry.
    fn position(&self) -> u64;

    /// Release transport resources. Idempotent.
    fn close(&mut self) {}
}
