//! Chunk encoding.

/// Placeholder fixed-span chunk encoder.
pub mod chunk;

pub use chunk::{Chunk, ChunkPushError};
