//! Merging per-chunk parses and assembling the final delivery object.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::parse::{ActionItem, Attendee, ParsedResult, StructuredSummary};
use crate::quality::QualityReport;

/// Final output of the pipeline, serialized camelCase for downstream
/// consumers. `summary`, `participants`, `actionItems` and `decisions`
/// are aliases of fields inside `structuredSummary`, kept for callers
/// that predate the structured shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedMeeting {
    pub transcription: String,
    pub structured_summary: StructuredSummary,
    pub summary: String,
    pub participants: Vec<Attendee>,
    pub action_items: Vec<ActionItem>,
    pub decisions: Vec<String>,
    pub model: String,
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: u64,
    pub quality_score: u32,
    pub quality_report: QualityReport,
    pub chunk_count: usize,
}

/// Build the delivery object from the (repaired) parse. The aliases are
/// copies, never references, so mutating one view later cannot skew the
/// other.
pub fn assemble(
    parsed: ParsedResult,
    model: &str,
    quality_report: QualityReport,
    processing_time_ms: u64,
    chunk_count: usize,
) -> ProcessedMeeting {
    let summary = parsed.summary.overview.clone();
    let participants = parsed.summary.attendees_and_companies.clone();
    let action_items = parsed.summary.next_actions_with_due_date.clone();
    let decisions = parsed.summary.decisions.clone();
    ProcessedMeeting {
        transcription: parsed.transcription,
        structured_summary: parsed.summary,
        summary,
        participants,
        action_items,
        decisions,
        model: model.to_string(),
        timestamp: Utc::now(),
        processing_time_ms,
        quality_score: quality_report.overall_score,
        quality_report,
        chunk_count,
    }
}

/// Merge per-chunk parses into one result.
///
/// Transcriptions concatenate in chunk order. The summary scaffold comes
/// from the first chunk whose parse carried a real overview or purpose
/// (the model usually front-loads these), falling back to the last chunk;
/// list fields are unioned across all chunks so later discussion topics
/// and action items survive. An empty input yields the failure sentinel.
pub fn merge_chunk_results(mut results: Vec<ParsedResult>) -> ParsedResult {
    if results.is_empty() {
        return ParsedResult::parse_failure();
    }
    if results.len() == 1 {
        return results.remove(0);
    }

    let transcription = results
        .iter()
        .map(|r| r.transcription.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    let base_index = results
        .iter()
        .position(|r| {
            !r.summary.overview.trim().is_empty() || !r.summary.meeting_purpose.trim().is_empty()
        })
        .unwrap_or(results.len().saturating_sub(1));
    let mut summary = results[base_index].summary.clone();

    for (index, result) in results.iter().enumerate() {
        if index == base_index {
            continue;
        }
        extend_unique_attendees(&mut summary.attendees_and_companies, result);
        extend_unique(&mut summary.materials, &result.summary.materials);
        extend_unique(&mut summary.decisions, &result.summary.decisions);
        for topic in &result.summary.discussions_by_topic {
            if !summary.discussions_by_topic.contains(topic) {
                summary.discussions_by_topic.push(topic.clone());
            }
        }
        for action in &result.summary.next_actions_with_due_date {
            if !summary.next_actions_with_due_date.contains(action) {
                summary.next_actions_with_due_date.push(action.clone());
            }
        }
    }

    ParsedResult {
        transcription,
        summary,
    }
}

fn extend_unique(target: &mut Vec<String>, source: &[String]) {
    for item in source {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

fn extend_unique_attendees(target: &mut Vec<Attendee>, source: &ParsedResult) {
    for attendee in &source.summary.attendees_and_companies {
        if !target.iter().any(|a| a.name == attendee.name) {
            target.push(attendee.clone());
        }
    }
}
