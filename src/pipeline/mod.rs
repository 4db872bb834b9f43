//! Pipeline orchestration: per-recording coordination and final assembly.

pub mod assembler;
pub mod coordinator;

pub use assembler::{ProcessedMeeting, merge_chunk_results};
pub use coordinator::{MeetingInfo, MeetingPipeline, RecordingInput};
