//! Default configuration constants for meetscribe.
//!
//! This module provides shared constants used across different configuration
//! types to ensure consistency and eliminate duplication.

/// Effective payload cap in megabytes before stride compression kicks in.
///
/// Kept below the upstream 20 MB hard limit so that base64 expansion and
/// prompt text still fit comfortably in one request.
pub const TARGET_SIZE_MB: f64 = 18.0;

/// Upstream hard limit on a single inline-audio request, in megabytes.
pub const HARD_LIMIT_MB: f64 = 20.0;

/// Safety factor applied to the compression target: we aim at 80% of the
/// target size so one pass of stride downsampling is always enough.
pub const COMPRESSION_HEADROOM: f64 = 0.8;

/// Minimum retained chunk duration in seconds. Shorter slices carry too
/// little speech for the model and are dropped from the plan.
pub const MIN_CHUNK_SECONDS: f64 = 5.0;

/// Chunks whose non-zero-byte ratio falls below this are treated as
/// silence or corruption and excluded from the plan.
pub const MIN_NONZERO_RATIO: f64 = 0.01;

/// Floor applied to estimated meeting duration, in seconds (5 minutes).
/// Size-based estimates for tiny payloads are unreliable below this.
pub const MIN_ESTIMATED_DURATION_SECS: f64 = 300.0;

/// Estimated MB per minute of audio, by detected format.
pub const WAV_MB_PER_MINUTE: f64 = 10.0;
pub const MP3_MB_PER_MINUTE: f64 = 1.0;
pub const M4A_MB_PER_MINUTE: f64 = 0.5;

/// Minimum transcription length (characters) for a parse strategy to count
/// as a success, and below which the quality evaluator flags the field.
pub const MIN_TRANSCRIPTION_CHARS: usize = 50;

/// Default number of dispatch attempts before giving up.
pub const MAX_RETRIES: u32 = 5;

/// Base backoff wait for retriable service errors, in milliseconds.
/// 35s keeps us safely inside free-tier per-minute quota windows.
pub const BACKOFF_BASE_MS: u64 = 35_000;

/// Additional wait added per attempt for retriable service errors.
pub const BACKOFF_INCREMENT_MS: u64 = 10_000;

/// Base/increment for unclassified errors; the 35s floor still applies.
pub const UNKNOWN_BACKOFF_BASE_MS: u64 = 30_000;
pub const UNKNOWN_BACKOFF_INCREMENT_MS: u64 = 5_000;

/// Floor enforced on every backoff wait regardless of classification.
pub const BACKOFF_FLOOR_MS: u64 = 35_000;

/// Quality score below which a parsed result is sent to reprocessing.
pub const REPROCESS_SCORE_THRESHOLD: u32 = 70;

/// Default generation parameters for the model call.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 65_536;
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_TOP_P: f32 = 0.95;
pub const DEFAULT_TOP_K: u32 = 40;

/// Default model name for the generative endpoint.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default API base for the generative endpoint.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Sentinel written into the transcription field when every parse strategy
/// fails. Downstream consumers can match on this string to surface the
/// failure instead of silently storing plausible-looking garbage.
pub const PARSE_FAILURE_MARKER: &str =
    "[TRANSCRIPTION UNAVAILABLE: model response could not be parsed]";

/// Placeholder substituted when field repair would leave an empty string.
pub const REPAIR_PLACEHOLDER: &str = "(removed during processing: content error)";
