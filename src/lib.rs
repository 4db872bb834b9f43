//! meetscribe: resilient ingestion of recorded meetings through a
//! generative transcription model.
//!
//! A recording goes in as raw bytes plus meeting metadata; a transcript
//! with a structured summary comes out. Everything between is built to
//! survive a hostile upstream: oversized audio is stride-compressed and
//! chunked, model calls retry with classified backoff, responses are
//! parsed by a strategy cascade that never panics, and low-quality parses
//! are scored and repaired before delivery.
//!
//! Entry point is [`pipeline::MeetingPipeline`]; everything else is the
//! machinery underneath it, exposed for reuse and testing.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod audio;
pub mod config;
pub mod defaults;
pub mod error;
pub mod model;
pub mod parse;
pub mod pipeline;
pub mod quality;
pub mod trace;

pub use config::Config;
pub use error::{MeetscribeError, Result};
pub use pipeline::{MeetingInfo, MeetingPipeline, ProcessedMeeting, RecordingInput};
