//! Structured result types produced by the response parser.
//!
//! Every field carries `#[serde(default)]` so a partial or truncated model
//! response still deserializes; missing content is caught later by the
//! quality evaluator, not by the parser.

use serde::{Deserialize, Serialize};

use crate::defaults;

/// The parser's output: raw transcript plus the fixed-shape summary.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ParsedResult {
    pub transcription: String,
    pub summary: StructuredSummary,
}

/// Fixed-shape meeting summary. Time fields inside use `MM:SS` strings;
/// dates use `YYYY/MM/DD`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StructuredSummary {
    /// Free-prose overview of the meeting; mirrored into the assembled
    /// result's legacy `summary` alias.
    pub overview: String,
    pub meeting_purpose: String,
    pub client_name: String,
    pub attendees_and_companies: Vec<Attendee>,
    pub materials: Vec<String>,
    pub discussions_by_topic: Vec<TopicDiscussion>,
    pub decisions: Vec<String>,
    pub next_actions_with_due_date: Vec<ActionItem>,
    pub audio_quality: AudioQuality,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Attendee {
    pub name: String,
    pub company: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TopicDiscussion {
    pub topic: String,
    pub time_range: TimeRange,
    /// Ordered argument chain for the topic.
    pub points: Vec<String>,
}

/// `MM:SS` offsets into the recording.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ActionItem {
    pub action: String,
    pub owner: String,
    /// `YYYY/MM/DD`, empty when no due date was stated.
    pub due_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AudioQuality {
    pub clarity: String,
    pub issues: Vec<String>,
    pub transcription_confidence: String,
}

impl ParsedResult {
    /// Minimal explicit-failure result returned when every parse strategy
    /// fails. The sentinel marker keeps the failure machine-detectable all
    /// the way to the document store instead of crashing the batch.
    pub fn parse_failure() -> Self {
        let mut result = ParsedResult {
            transcription: defaults::PARSE_FAILURE_MARKER.to_string(),
            ..ParsedResult::default()
        };
        result.summary.overview = defaults::PARSE_FAILURE_MARKER.to_string();
        result
    }

    /// True when this result carries the explicit parse-failure sentinel.
    pub fn is_parse_failure(&self) -> bool {
        self.transcription.contains(defaults::PARSE_FAILURE_MARKER)
    }
}
