//! End-to-end pipeline tests against a scripted mock model.
//!
//! Short recordings split into two chunks, so each full run consumes two
//! scripted responses.

use std::sync::Arc;
use std::time::Duration;

use meetscribe::model::MockModelClient;
use meetscribe::{Config, MeetingInfo, MeetingPipeline, MeetscribeError, RecordingInput};

fn model_json(transcription: &str, overview: &str) -> String {
    serde_json::json!({
        "transcription": transcription,
        "summary": {
            "overview": overview,
            "meetingPurpose": "weekly sync",
            "clientName": "Acme",
            "attendeesAndCompanies": [
                {"name": "Sato", "company": "Acme", "role": "PM"}
            ],
            "materials": ["roadmap deck"],
            "discussionsByTopic": [
                {
                    "topic": "release planning",
                    "timeRange": {"start": "00:00", "end": "12:30"},
                    "points": ["freeze on Friday"]
                }
            ],
            "decisions": ["proceed with rollout"],
            "nextActionsWithDueDate": [
                {"action": "send notes", "owner": "Sato", "dueDate": "2026/09/01"}
            ],
            "audioQuality": {
                "clarity": "clear",
                "issues": [],
                "transcriptionConfidence": "high"
            }
        }
    })
    .to_string()
}

fn long_transcription() -> String {
    "We reviewed the release schedule and agreed on the remaining work. ".repeat(3)
}

fn recording() -> RecordingInput {
    RecordingInput {
        audio_bytes: vec![0x55u8; 4096],
        mime_type: "audio/wav".to_string(),
        meeting: MeetingInfo {
            topic: "Release planning".to_string(),
            start_time: "2026/08/29 10:00".to_string(),
            duration_minutes: Some(30.0),
            host_name: "Sato".to_string(),
        },
    }
}

fn pipeline_with(client: MockModelClient) -> MeetingPipeline {
    MeetingPipeline::new(Config::default(), Arc::new(client))
}

#[tokio::test]
async fn test_clean_response_produces_full_result() {
    let response = model_json(&long_transcription(), "Quarterly release planning session.");
    let client = MockModelClient::new("mock-model")
        .with_response(&response)
        .with_response(&response);
    let pipeline = pipeline_with(client);

    let meeting = pipeline.process(recording()).await.unwrap();
    assert!(meeting.transcription.contains("release schedule"));
    assert_eq!(meeting.structured_summary.client_name, "Acme");
    assert_eq!(meeting.quality_score, 100);
    assert_eq!(meeting.chunk_count, 2);
    assert_eq!(meeting.model, "mock-model");
}

#[tokio::test]
async fn test_aliases_mirror_structured_summary() {
    let response = model_json(&long_transcription(), "Overview text for the meeting.");
    let client = MockModelClient::new("mock-model")
        .with_response(&response)
        .with_response(&response);
    let pipeline = pipeline_with(client);

    let meeting = pipeline.process(recording()).await.unwrap();
    assert_eq!(meeting.summary, meeting.structured_summary.overview);
    assert_eq!(
        meeting.participants,
        meeting.structured_summary.attendees_and_companies
    );
    assert_eq!(
        meeting.action_items,
        meeting.structured_summary.next_actions_with_due_date
    );
    assert_eq!(meeting.decisions, meeting.structured_summary.decisions);
}

#[tokio::test]
async fn test_fenced_response_still_parses() {
    let fenced = format!(
        "```json\n{}\n```",
        model_json(&long_transcription(), "Fenced overview.")
    );
    let client = MockModelClient::new("mock-model")
        .with_response(&fenced)
        .with_response(&fenced);
    let pipeline = pipeline_with(client);

    let meeting = pipeline.process(recording()).await.unwrap();
    assert_eq!(meeting.structured_summary.overview, "Fenced overview.");
}

#[tokio::test]
async fn test_mixed_json_overview_is_repaired() {
    // Overview with an embedded JSON fragment: scored down, then repaired
    // before assembly.
    let dirty = model_json(
        &long_transcription(),
        r#"real overview text {"leaked": "fragment"} trailing"#,
    );
    let client = MockModelClient::new("mock-model")
        .with_response(&dirty)
        .with_response(&dirty);
    let pipeline = pipeline_with(client);

    let meeting = pipeline.process(recording()).await.unwrap();
    assert!(!meeting.structured_summary.overview.contains('{'));
    assert!(meeting.structured_summary.overview.contains("real overview text"));
    assert_eq!(meeting.quality_score, 100);
    assert!(!meeting.quality_report.json_mixed_detected);
}

#[tokio::test]
async fn test_unparseable_response_delivers_sentinel() {
    let client = MockModelClient::new("mock-model")
        .with_response("complete nonsense, nothing like a transcript here")
        .with_response("still nothing usable from the model");
    let pipeline = pipeline_with(client);

    let meeting = pipeline.process(recording()).await.unwrap();
    assert!(meeting.transcription.contains("TRANSCRIPTION UNAVAILABLE"));
    assert!(meeting.summary.contains("TRANSCRIPTION UNAVAILABLE"));
}

#[tokio::test]
async fn test_empty_audio_is_rejected() {
    let client = MockModelClient::new("mock-model");
    let pipeline = pipeline_with(client);
    let mut input = recording();
    input.audio_bytes.clear();

    let error = pipeline.process(input).await.unwrap_err();
    assert!(matches!(error, MeetscribeError::AudioEmpty));
}

#[tokio::test(start_paused = true)]
async fn test_overload_recovers_after_full_backoff() {
    // First chunk hits two 503s (35s then 45s waits) before succeeding.
    let response = model_json(&long_transcription(), "Recovered overview.");
    let client = MockModelClient::new("mock-model")
        .with_failure(Some(503), "The model is overloaded. Please try again later.")
        .with_failure(Some(503), "The model is overloaded. Please try again later.")
        .with_response(&response)
        .with_response(&response);
    let pipeline = pipeline_with(client);

    let started = tokio::time::Instant::now();
    let meeting = pipeline.process(recording()).await.unwrap();
    assert_eq!(meeting.structured_summary.overview, "Recovered overview.");
    assert!(started.elapsed() >= Duration::from_secs(80));
}

#[tokio::test]
async fn test_exhausted_retries_surface_classified_error() {
    let mut client = MockModelClient::new("mock-model");
    for _ in 0..5 {
        client = client.with_failure(Some(503), "overloaded");
    }
    let mut config = Config::default();
    config.retry.backoff_base_ms = 1;
    config.retry.backoff_increment_ms = 1;
    config.retry.backoff_floor_ms = 0;
    let pipeline = MeetingPipeline::new(config, Arc::new(client));

    let error = pipeline.process(recording()).await.unwrap_err();
    match &error {
        MeetscribeError::RetriesExhausted { attempts, .. } => assert_eq!(*attempts, 5),
        other => panic!("unexpected error: {other}"),
    }
    assert!(error.to_string().contains("SERVICE_OVERLOAD"));
}

#[tokio::test]
async fn test_process_many_isolates_failures() {
    let response = model_json(&long_transcription(), "Batch overview.");
    let client = MockModelClient::new("mock-model")
        .with_response(&response)
        .with_response(&response);
    let pipeline = Arc::new(pipeline_with(client));

    let mut broken = recording();
    broken.audio_bytes.clear();
    let results = pipeline.process_many(vec![broken, recording()]).await;

    assert_eq!(results.len(), 2);
    assert!(matches!(results[0], Err(MeetscribeError::AudioEmpty)));
    let ok = results[1].as_ref().unwrap();
    assert_eq!(ok.structured_summary.overview, "Batch overview.");
}
