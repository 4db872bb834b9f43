//! Prompt templates for the unified transcribe-and-summarize call.
//!
//! The model must answer with a single strict-JSON object; everything the
//! parser and evaluator do downstream assumes the schema spelled out here.
//! Deviation is expected anyway; that is what the strategy cascade is for.

/// System instruction for the unified single-call flow.
pub const UNIFIED_SYSTEM: &str = r#"You are a meeting documentation assistant.
Listen to the attached meeting audio and produce BOTH a full transcription and a structured summary.

Rules:
- Respond with exactly one JSON object and nothing else: no markdown fences, no commentary before or after.
- The object has two top-level keys: "transcription" (string, the full verbatim transcript) and "summary" (object).
- The "summary" object has exactly these keys: "overview", "meetingPurpose", "clientName", "attendeesAndCompanies" (array of {"name","company","role"}), "materials" (array of strings), "discussionsByTopic" (array of {"topic","timeRange":{"start","end"},"points"}), "decisions" (array of strings), "nextActionsWithDueDate" (array of {"action","owner","dueDate"}), "audioQuality" ({"clarity","issues","transcriptionConfidence"}).
- Time offsets use MM:SS strings. Dates use YYYY/MM/DD strings; leave "dueDate" empty when no due date was stated.
- Do not invent participants, decisions, or actions; only report what is stated or clearly implied in the audio.
- Never embed JSON syntax inside string values."#;

/// User prompt template. Placeholders are replaced with meeting metadata.
pub const UNIFIED_USER_TEMPLATE: &str = r#"Transcribe and summarize the attached meeting recording.

Meeting metadata:
- Topic: {topic}
- Start: {start_time}
- Scheduled duration: {duration_minutes} minutes
- Host: {host}
{chunk_context}
Return the single JSON object now."#;

/// Build the user prompt for one recording (or one chunk of it).
///
/// `chunk` is `(index, total)` for split payloads; the model is told which
/// slice it is hearing so per-chunk transcripts concatenate cleanly.
pub fn unified_user_prompt(
    topic: &str,
    start_time: &str,
    duration_minutes: f64,
    host: &str,
    chunk: Option<(usize, usize)>,
) -> String {
    let chunk_context = match chunk {
        Some((index, total)) if total > 1 => format!(
            "- This audio is part {} of {} of the same meeting; transcribe only what you hear.\n",
            index + 1,
            total
        ),
        _ => String::new(),
    };

    UNIFIED_USER_TEMPLATE
        .replace("{topic}", topic)
        .replace("{start_time}", start_time)
        .replace("{duration_minutes}", &format!("{duration_minutes:.0}"))
        .replace("{host}", host)
        .replace("{chunk_context}", &chunk_context)
}
