//! Audio payload sizing and best-effort compression.
//!
//! The "compression" here is a deterministic stride-based downsampling of
//! the raw byte stream: it keeps every step-th byte until the payload fits
//! the configured cap. It is lossy and format-oblivious, good enough to
//! get an oversized recording under the upstream request limit, never a
//! substitute for real transcoding.

use tracing::{debug, info, warn};

use crate::config::AudioConfig;
use crate::defaults;
use crate::error::{MeetscribeError, Result};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Container format detected from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    M4a,
}

impl AudioFormat {
    /// Sniff the container format from the first bytes of the payload.
    ///
    /// RIFF/WAVE → wav, `ftyp` at offset 4 → m4a, MP3 frame sync or an
    /// ID3 tag → mp3. Unknown payloads default to m4a, the most common
    /// meeting-recorder output.
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            return AudioFormat::Wav;
        }
        if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
            return AudioFormat::M4a;
        }
        if bytes.len() >= 3 && &bytes[0..3] == b"ID3" {
            return AudioFormat::Mp3;
        }
        // MP3 frame sync: 11 set bits across the first two bytes.
        if bytes.len() >= 2 && bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0 {
            return AudioFormat::Mp3;
        }
        AudioFormat::M4a
    }

    /// Rough storage rate used for size-based duration estimation.
    pub fn mb_per_minute(&self) -> f64 {
        match self {
            AudioFormat::Wav => defaults::WAV_MB_PER_MINUTE,
            AudioFormat::Mp3 => defaults::MP3_MB_PER_MINUTE,
            AudioFormat::M4a => defaults::M4A_MB_PER_MINUTE,
        }
    }

    /// Canonical MIME type for the detected format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a => "audio/mp4",
        }
    }
}

/// A prepared audio payload. Immutable once built: chunking and dispatch
/// read from it but never modify it.
#[derive(Debug, Clone)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub size_bytes: usize,
    pub detected_format: AudioFormat,
}

impl AudioPayload {
    /// Prepare a payload for dispatch: detect the format and, when the raw
    /// bytes exceed the configured cap, apply stride compression.
    pub fn prepare(raw_bytes: &[u8], mime_type: &str, config: &AudioConfig) -> Result<Self> {
        if raw_bytes.is_empty() {
            return Err(MeetscribeError::AudioEmpty);
        }

        let detected_format = AudioFormat::detect(raw_bytes);
        let size_mb = raw_bytes.len() as f64 / BYTES_PER_MB;

        let bytes = if size_mb > config.target_size_mb {
            info!(
                size_mb = format!("{size_mb:.1}"),
                target_mb = config.target_size_mb,
                "payload over cap, applying stride compression"
            );
            stride_compress(raw_bytes, config.target_size_mb)?
        } else {
            raw_bytes.to_vec()
        };

        let mime = if mime_type.is_empty() {
            detected_format.mime_type().to_string()
        } else {
            mime_type.to_string()
        };

        debug!(
            format = ?detected_format,
            size_bytes = bytes.len(),
            "audio payload prepared"
        );

        Ok(Self {
            size_bytes: bytes.len(),
            bytes,
            mime_type: mime,
            detected_format,
        })
    }

    /// Payload size in megabytes.
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_MB
    }

    /// Estimate total recording duration in seconds.
    ///
    /// A caller-supplied duration hint (in minutes) always wins. Otherwise
    /// the estimate comes from the payload size and the detected format's
    /// storage rate, floored at 5 minutes. Large payloads with implausibly
    /// short estimates fall back to one minute per megabyte so the chunk
    /// plan is never grossly undersized.
    pub fn estimate_duration_seconds(&self, duration_hint_minutes: Option<f64>) -> f64 {
        if let Some(minutes) = duration_hint_minutes
            && minutes > 0.0
        {
            return minutes * 60.0;
        }

        let size_mb = self.size_mb();
        let mut estimate = (size_mb / self.detected_format.mb_per_minute()) * 60.0;

        if estimate < defaults::MIN_ESTIMATED_DURATION_SECS {
            estimate = defaults::MIN_ESTIMATED_DURATION_SECS;
        }

        // Sanity fallback: a >30MB recording is essentially never under 30
        // minutes; the rate table must be wrong for this payload.
        if size_mb > 30.0 && estimate < 1800.0 {
            warn!(
                size_mb = format!("{size_mb:.1}"),
                estimate_secs = format!("{estimate:.0}"),
                "duration estimate implausible for payload size, refalling back"
            );
            estimate = size_mb * 60.0;
        }

        estimate
    }
}

/// Stride-based downsampling: keep every step-th byte so the output lands
/// at ~80% of the target size. Lossy and best-effort.
fn stride_compress(bytes: &[u8], target_size_mb: f64) -> Result<Vec<u8>> {
    let original_mb = bytes.len() as f64 / BYTES_PER_MB;
    let ratio = (target_size_mb * defaults::COMPRESSION_HEADROOM) / original_mb;
    let new_len = (bytes.len() as f64 * ratio).floor() as usize;

    if new_len == 0 {
        return Err(MeetscribeError::AudioCompression {
            message: format!(
                "compression ratio {ratio:.4} produced zero-length output from {} bytes",
                bytes.len()
            ),
        });
    }

    let step = bytes.len() / new_len;
    if step == 0 {
        // ratio >= 1.0: nothing to do
        return Ok(bytes.to_vec());
    }

    let compressed: Vec<u8> = bytes.iter().step_by(step).copied().take(new_len).collect();

    info!(
        original_bytes = bytes.len(),
        compressed_bytes = compressed.len(),
        step,
        "stride compression complete"
    );

    Ok(compressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_header() -> Vec<u8> {
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(b"WAVE");
        bytes
    }

    #[test]
    fn test_detect_wav() {
        let mut bytes = wav_header();
        bytes.extend_from_slice(&[1; 100]);
        assert_eq!(AudioFormat::detect(&bytes), AudioFormat::Wav);
    }

    #[test]
    fn test_detect_m4a_ftyp() {
        let mut bytes = vec![0, 0, 0, 32];
        bytes.extend_from_slice(b"ftyp");
        bytes.extend_from_slice(b"M4A ");
        assert_eq!(AudioFormat::detect(&bytes), AudioFormat::M4a);
    }

    #[test]
    fn test_detect_mp3_frame_sync() {
        let bytes = vec![0xFF, 0xFB, 0x90, 0x00];
        assert_eq!(AudioFormat::detect(&bytes), AudioFormat::Mp3);
    }

    #[test]
    fn test_detect_mp3_id3_tag() {
        let mut bytes = b"ID3".to_vec();
        bytes.extend_from_slice(&[4, 0, 0, 0, 0, 0, 0]);
        assert_eq!(AudioFormat::detect(&bytes), AudioFormat::Mp3);
    }

    #[test]
    fn test_detect_unknown_defaults_to_m4a() {
        let bytes = vec![0x42; 64];
        assert_eq!(AudioFormat::detect(&bytes), AudioFormat::M4a);
    }

    #[test]
    fn test_prepare_empty_payload_fails() {
        let config = AudioConfig::default();
        let result = AudioPayload::prepare(&[], "audio/wav", &config);
        assert!(matches!(result, Err(MeetscribeError::AudioEmpty)));
    }

    #[test]
    fn test_prepare_small_payload_unchanged() {
        let config = AudioConfig::default();
        let mut bytes = wav_header();
        bytes.extend_from_slice(&[7; 1000]);

        let payload = AudioPayload::prepare(&bytes, "audio/wav", &config).unwrap();
        assert_eq!(payload.bytes, bytes);
        assert_eq!(payload.size_bytes, bytes.len());
        assert_eq!(payload.detected_format, AudioFormat::Wav);
        assert_eq!(payload.mime_type, "audio/wav");
    }

    #[test]
    fn test_prepare_fills_missing_mime_from_format() {
        let config = AudioConfig::default();
        let bytes = vec![0xFF, 0xFB, 0x90, 0x00, 1, 2, 3];
        let payload = AudioPayload::prepare(&bytes, "", &config).unwrap();
        assert_eq!(payload.mime_type, "audio/mpeg");
    }

    #[test]
    fn test_prepare_compresses_oversized_payload() {
        let config = AudioConfig {
            target_size_mb: 1.0,
            ..AudioConfig::default()
        };
        // 3MB of data, well over the 1MB target
        let bytes = vec![0x55u8; 3 * 1024 * 1024];

        let payload = AudioPayload::prepare(&bytes, "audio/mp4", &config).unwrap();

        // Target is 80% of 1MB; stride arithmetic can undershoot slightly
        let target_bytes = (1.0 * 0.8 * 1024.0 * 1024.0) as usize;
        assert!(payload.size_bytes <= target_bytes);
        assert!(payload.size_bytes > target_bytes / 2);
    }

    #[test]
    fn test_stride_compress_ratio_arithmetic() {
        // 100 bytes down to a 0.00004768 MB target: exercises the formula
        // ratio = target*0.8/original, new_len = floor(len*ratio)
        let bytes: Vec<u8> = (0..=99).collect();
        let target_mb = 50.0 / (1024.0 * 1024.0); // 50 "bytes" worth

        let out = stride_compress(&bytes, target_mb).unwrap();
        // ratio = 40/100 = 0.4 → new_len = 40, step = 2
        assert_eq!(out.len(), 40);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 2);
        assert_eq!(out[2], 4);
    }

    #[test]
    fn test_stride_compress_never_mutates_source() {
        let bytes = vec![9u8; 4096];
        let before = bytes.clone();
        let _ = stride_compress(&bytes, 0.001).unwrap();
        assert_eq!(bytes, before);
    }

    #[test]
    fn test_duration_hint_wins() {
        let config = AudioConfig::default();
        let payload = AudioPayload::prepare(&[1u8; 100], "audio/mp4", &config).unwrap();
        assert_eq!(payload.estimate_duration_seconds(Some(45.0)), 2700.0);
    }

    #[test]
    fn test_duration_floor_for_tiny_payload() {
        let config = AudioConfig::default();
        let payload = AudioPayload::prepare(&[1u8; 100], "audio/mp4", &config).unwrap();
        // 100 bytes of "m4a" estimates to essentially nothing: 5 minute floor
        assert_eq!(payload.estimate_duration_seconds(None), 300.0);
    }

    #[test]
    fn test_duration_size_based_estimate() {
        let config = AudioConfig {
            target_size_mb: 100.0,
            ..AudioConfig::default()
        };
        // 10MB of mp3 at 1 MB/min → 600 seconds
        let mut bytes = vec![0xFF, 0xFB];
        bytes.extend_from_slice(&vec![3u8; 10 * 1024 * 1024 - 2]);
        let payload = AudioPayload::prepare(&bytes, "audio/mpeg", &config).unwrap();

        let secs = payload.estimate_duration_seconds(None);
        assert!((599.0..=601.0).contains(&secs), "got {secs}");
    }

    #[test]
    fn test_duration_sanity_refallback_for_large_payload() {
        let config = AudioConfig {
            target_size_mb: 100.0,
            ..AudioConfig::default()
        };
        // 35MB detected as wav → 10 MB/min gives 210s, which is implausible
        // for 35MB; the refallback uses size_mb * 60 instead.
        let mut bytes = wav_header();
        bytes.extend_from_slice(&vec![1u8; 35 * 1024 * 1024]);
        let payload = AudioPayload::prepare(&bytes, "audio/wav", &config).unwrap();

        let secs = payload.estimate_duration_seconds(None);
        let size_mb = payload.size_mb();
        assert!((secs - size_mb * 60.0).abs() < 1.0, "got {secs}");
    }
}
