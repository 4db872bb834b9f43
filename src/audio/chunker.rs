//! Chunk planning and splitting for oversized payloads.
//!
//! A chunk plan maps estimated recording time onto proportional byte
//! ranges. Chunks are validated before they are allowed into the plan:
//! too-short slices, silent/corrupted slices, and slices that fail the
//! base64 sanity check are excluded outright; they are never sent to the
//! model and leave no placeholder behind.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, warn};

use crate::audio::payload::AudioPayload;
use crate::config::AudioConfig;

/// Derived slicing strategy for one payload. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPlan {
    pub chunk_duration_seconds: f64,
    pub chunk_size_bytes: usize,
    pub estimated_total_duration_seconds: f64,
    pub total_chunks: usize,
}

/// A time-bounded slice of the payload, sized to fit one model call.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub data: Vec<u8>,
    /// Start offset in seconds from the beginning of the recording.
    pub start_time: f64,
    /// End offset in seconds.
    pub end_time: f64,
    /// Position in the original plan (gaps possible where chunks were excluded).
    pub index: usize,
    pub is_first: bool,
    pub is_last: bool,
    /// 0.0–1.0 heuristic; retained chunks are always above the floor.
    pub quality_score: f64,
    pub quality_issues: Vec<String>,
    pub corrupted: bool,
}

impl AudioChunk {
    pub fn duration_seconds(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Pick a chunk duration for the estimated total recording length.
///
/// Short meetings just split in two; longer recordings use progressively
/// shorter chunks so each slice's byte size stays under the payload cap.
fn chunk_duration_for(total_seconds: f64) -> f64 {
    if total_seconds <= 1800.0 {
        (total_seconds / 2.0).max(1.0)
    } else if total_seconds <= 3600.0 {
        900.0
    } else if total_seconds <= 5400.0 {
        720.0
    } else {
        600.0
    }
}

/// Build a chunk plan for the payload.
pub fn plan(payload: &AudioPayload, duration_hint_minutes: Option<f64>) -> ChunkPlan {
    let total_seconds = payload.estimate_duration_seconds(duration_hint_minutes);
    let chunk_duration = chunk_duration_for(total_seconds);
    let total_chunks = (total_seconds / chunk_duration).ceil().max(1.0) as usize;
    let chunk_size_bytes =
        ((payload.size_bytes as f64) * (chunk_duration / total_seconds)).ceil() as usize;

    debug!(
        total_seconds = format!("{total_seconds:.0}"),
        chunk_duration = format!("{chunk_duration:.0}"),
        total_chunks,
        chunk_size_bytes,
        "chunk plan built"
    );

    ChunkPlan {
        chunk_duration_seconds: chunk_duration,
        chunk_size_bytes: chunk_size_bytes.max(1),
        estimated_total_duration_seconds: total_seconds,
        total_chunks,
    }
}

/// Split the payload according to the plan, validating each chunk.
///
/// Returns only the retained chunks: their time ranges are non-overlapping
/// and strictly increasing. The source payload is never mutated.
pub fn split(payload: &AudioPayload, plan: &ChunkPlan, config: &AudioConfig) -> Vec<AudioChunk> {
    let mut retained: Vec<AudioChunk> = Vec::with_capacity(plan.total_chunks);

    for index in 0..plan.total_chunks {
        let byte_start = index * plan.chunk_size_bytes;
        if byte_start >= payload.bytes.len() {
            break;
        }
        let byte_end = ((index + 1) * plan.chunk_size_bytes).min(payload.bytes.len());
        let data = payload.bytes[byte_start..byte_end].to_vec();

        let start_time = index as f64 * plan.chunk_duration_seconds;
        let end_time = ((index + 1) as f64 * plan.chunk_duration_seconds)
            .min(plan.estimated_total_duration_seconds);

        match validate_chunk(&data, start_time, end_time, config) {
            Ok((quality_score, quality_issues)) => {
                retained.push(AudioChunk {
                    data,
                    start_time,
                    end_time,
                    index,
                    is_first: false,
                    is_last: false,
                    quality_score,
                    quality_issues,
                    corrupted: false,
                });
            }
            Err(reason) => {
                warn!(
                    index,
                    start_time = format!("{start_time:.0}"),
                    end_time = format!("{end_time:.0}"),
                    reason, "chunk excluded from plan"
                );
            }
        }
    }

    // First/last flags apply to the retained sequence, not the raw plan.
    let count = retained.len();
    for (pos, chunk) in retained.iter_mut().enumerate() {
        chunk.is_first = pos == 0;
        chunk.is_last = pos + 1 == count;
    }

    retained
}

/// Validate one candidate chunk. Returns its quality score and any non-fatal
/// issues, or the exclusion reason.
fn validate_chunk(
    data: &[u8],
    start_time: f64,
    end_time: f64,
    config: &AudioConfig,
) -> std::result::Result<(f64, Vec<String>), String> {
    let duration = end_time - start_time;
    if duration < config.min_chunk_seconds {
        return Err(format!(
            "duration {duration:.1}s below minimum {:.1}s",
            config.min_chunk_seconds
        ));
    }

    if data.is_empty() {
        return Err("empty byte range".to_string());
    }

    let nonzero = data.iter().filter(|b| **b != 0).count();
    let nonzero_ratio = nonzero as f64 / data.len() as f64;
    if nonzero_ratio < config.min_nonzero_ratio {
        return Err(format!(
            "non-zero byte ratio {nonzero_ratio:.4} below {:.2}, treating as silence/corruption",
            config.min_nonzero_ratio
        ));
    }

    // Base64 sanity check: encoded form must exist and have the expected
    // expansion, since this is exactly what dispatch will send inline.
    let encoded = BASE64.encode(data);
    let expected_len = data.len().div_ceil(3) * 4;
    if encoded.is_empty() || encoded.len() != expected_len {
        return Err("base64 encoding sanity check failed".to_string());
    }

    let mut issues = Vec::new();
    let mut score = 1.0;
    if nonzero_ratio < 0.10 {
        issues.push(format!("low non-zero ratio {nonzero_ratio:.3}"));
        score = 0.5;
    }

    Ok((score, issues))
}
