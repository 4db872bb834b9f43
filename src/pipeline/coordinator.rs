//! The pipeline coordinator: drives one recording from raw bytes to the
//! assembled result, and runs batches with per-recording fault isolation.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::audio::{self, AudioChunk, AudioPayload};
use crate::config::Config;
use crate::error::{MeetscribeError, Result};
use crate::model::{
    GenerationConfig, InlineAudio, ModelClient, ModelRequest, RequestDispatcher, UNIFIED_SYSTEM,
    unified_user_prompt,
};
use crate::parse::{self, ParsedResult};
use crate::pipeline::assembler::{self, ProcessedMeeting};
use crate::quality;

/// Metadata for one recorded meeting.
#[derive(Debug, Clone, Default)]
pub struct MeetingInfo {
    pub topic: String,
    /// Wall-clock start, already formatted for the prompt.
    pub start_time: String,
    /// Scheduled length in minutes, when the calendar knows it.
    pub duration_minutes: Option<f64>,
    pub host_name: String,
}

/// One unit of work: the recording bytes plus meeting metadata.
#[derive(Debug, Clone)]
pub struct RecordingInput {
    pub audio_bytes: Vec<u8>,
    pub mime_type: String,
    pub meeting: MeetingInfo,
}

/// Phase a recording is in, for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Preparing,
    Dispatching,
    Evaluating,
    Repairing,
    Assembling,
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Preparing => "preparing",
            Self::Dispatching => "dispatching",
            Self::Evaluating => "evaluating",
            Self::Repairing => "repairing",
            Self::Assembling => "assembling",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Drives recordings through preparation, model calls, parsing, quality
/// evaluation, repair and assembly.
pub struct MeetingPipeline {
    config: Config,
    dispatcher: RequestDispatcher,
}

impl MeetingPipeline {
    pub fn new(config: Config, client: Arc<dyn ModelClient>) -> Self {
        let dispatcher = RequestDispatcher::new(client, config.retry.clone());
        Self { config, dispatcher }
    }

    /// Use an external cancellation token; cancelling it aborts in-flight
    /// retry waits across all recordings sharing this pipeline.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.dispatcher = self.dispatcher.with_cancellation(cancel);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.dispatcher.cancellation_token()
    }

    /// Process one recording end to end.
    ///
    /// Failures before the model call (empty audio, compression) and
    /// terminal dispatch outcomes surface as errors; everything after a
    /// successful call degrades instead of failing, so a malformed model
    /// response still yields a delivery object.
    pub async fn process(&self, input: RecordingInput) -> Result<ProcessedMeeting> {
        let started = Instant::now();
        let topic = input.meeting.topic.clone();

        info!(topic = %topic, state = %PipelineState::Preparing, bytes = input.audio_bytes.len(), "processing recording");
        let payload =
            AudioPayload::prepare(&input.audio_bytes, &input.mime_type, &self.config.audio)?;
        let plan = audio::plan(&payload, input.meeting.duration_minutes);
        let chunks = audio::split(&payload, &plan, &self.config.audio);
        if chunks.is_empty() {
            return Err(MeetscribeError::AudioInsufficient {
                message: "no usable audio remained after chunk validation".to_string(),
            });
        }
        let duration_minutes =
            payload.estimate_duration_seconds(input.meeting.duration_minutes) / 60.0;

        info!(topic = %topic, state = %PipelineState::Dispatching, chunks = chunks.len(), "sending to model");
        let chunk_count = chunks.len();
        let mut parsed_chunks: Vec<ParsedResult> = Vec::with_capacity(chunk_count);
        for (position, chunk) in chunks.iter().enumerate() {
            let request = self.build_request(
                &input.meeting,
                duration_minutes,
                &payload.mime_type,
                chunk,
                position,
                chunk_count,
            );
            let response = self.dispatcher.dispatch(&request).await?;
            parsed_chunks.push(parse::parse(&response.text));
        }

        info!(topic = %topic, state = %PipelineState::Evaluating, "scoring parsed result");
        let mut merged = assembler::merge_chunk_results(parsed_chunks);
        let mut report = quality::evaluate(&merged);

        if report.needs_reprocessing && !merged.is_parse_failure() {
            info!(
                topic = %topic,
                state = %PipelineState::Repairing,
                score = report.overall_score,
                issues = report.issues.len(),
                "quality below threshold, attempting repair"
            );
            let outcome = quality::repair(&merged, &report);
            if outcome.success {
                info!(
                    topic = %topic,
                    original = outcome.original_score,
                    improved = outcome.improved_score,
                    "repair improved result"
                );
                merged = outcome.repaired_result;
                report = quality::evaluate(&merged);
            } else {
                warn!(topic = %topic, score = report.overall_score, "repair did not improve result, keeping original");
            }
        }

        info!(topic = %topic, state = %PipelineState::Assembling, "building delivery object");
        let meeting = assembler::assemble(
            merged,
            self.dispatcher.model_name(),
            report,
            started.elapsed().as_millis() as u64,
            chunk_count,
        );

        info!(
            topic = %topic,
            state = %PipelineState::Done,
            quality_score = meeting.quality_score,
            elapsed_ms = meeting.processing_time_ms,
            "recording processed"
        );
        Ok(meeting)
    }

    /// Process a batch concurrently. Each recording fails or succeeds on
    /// its own; the output vector matches the input order.
    pub async fn process_many(
        self: Arc<Self>,
        inputs: Vec<RecordingInput>,
    ) -> Vec<Result<ProcessedMeeting>> {
        let total = inputs.len();
        let mut set = JoinSet::new();
        for (index, input) in inputs.into_iter().enumerate() {
            let pipeline = Arc::clone(&self);
            set.spawn(async move { (index, pipeline.process(input).await) });
        }

        let mut slots: Vec<Option<Result<ProcessedMeeting>>> =
            std::iter::repeat_with(|| None).take(total).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(join_error) => warn!(error = %join_error, "recording task aborted"),
            }
        }
        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(MeetscribeError::Other(
                        "recording task aborted before completion".to_string(),
                    ))
                })
            })
            .collect()
    }

    fn build_request(
        &self,
        meeting: &MeetingInfo,
        duration_minutes: f64,
        mime_type: &str,
        chunk: &AudioChunk,
        position: usize,
        total: usize,
    ) -> ModelRequest {
        let user = unified_user_prompt(
            &meeting.topic,
            &meeting.start_time,
            duration_minutes,
            &meeting.host_name,
            (total > 1).then_some((position, total)),
        );
        let mut request = ModelRequest::new(
            vec![UNIFIED_SYSTEM.to_string(), user],
            GenerationConfig::from(&self.config.model),
        );
        request.inline_audio = Some(InlineAudio {
            mime_type: mime_type.to_string(),
            data: BASE64.encode(&chunk.data),
        });
        request
    }
}
