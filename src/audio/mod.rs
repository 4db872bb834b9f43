//! Audio payload preparation: sizing, lossy compression, chunk planning.
//!
//! Nothing in this module is codec-aware. Compression is a deterministic
//! byte-level approximation and chunk boundaries are proportional byte
//! ranges, sized so each chunk stays under the model's per-call payload cap.

pub mod chunker;
pub mod payload;

pub use chunker::{AudioChunk, ChunkPlan, plan, split};
pub use payload::{AudioFormat, AudioPayload};
