//! Content-quality scoring for parsed results.
//!
//! The evaluator serializes the parsed result into a `serde_json::Value`
//! tree and walks every string field recursively, so new summary fields are
//! covered automatically. The headline defect it hunts is JSON leakage: one
//! generation step's raw JSON echoed verbatim inside a prose field.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::defaults::{MIN_TRANSCRIPTION_CHARS, REPROCESS_SCORE_THRESHOLD};
use crate::parse::result::ParsedResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    JsonMixedContent,
    EmptyContent,
    InsufficientContent,
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueType::JsonMixedContent => write!(f, "JSON_MIXED_CONTENT"),
            IssueType::EmptyContent => write!(f, "EMPTY_CONTENT"),
            IssueType::InsufficientContent => write!(f, "INSUFFICIENT_CONTENT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One defect found in one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    /// Dotted path from the result root, array indices inline:
    /// `summary.attendeesAndCompanies.0.name`.
    pub field_path: String,
    pub severity: Severity,
}

/// Aggregate quality verdict for a parsed result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    /// 0-100; starts at 100 and drops per issue, floored at 0.
    pub overall_score: u32,
    pub issues: Vec<Issue>,
    pub json_mixed_detected: bool,
    pub needs_reprocessing: bool,
}

const JSON_MIXED_PENALTY: i64 = 25;
const EMPTY_PENALTY: i64 = 10;
const INSUFFICIENT_PENALTY: i64 = 20;

static BARE_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // hardcoded pattern
    Regex::new(r#"\{[^{}]*"[^"]*"\s*:\s*"[^"]*"[^{}]*\}"#).unwrap()
});

static NESTED_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // hardcoded pattern
    Regex::new(r"\{[^{}]*\{[^{}]*\}[^{}]*\}").unwrap()
});

static STRING_ARRAY: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // hardcoded pattern
    Regex::new(r#"\[\s*"[^"]*"\s*(?:,\s*"[^"]*"\s*)*\]"#).unwrap()
});

static TRANSCRIPTION_LEAK: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // hardcoded pattern
    Regex::new(r#""transcription"\s*:\s*""#).unwrap()
});

/// True when the string looks like it contains raw JSON syntax.
///
/// The `"transcription":"` check is deliberate: it identifies the known
/// failure mode where a whole model response is echoed inside another
/// response's field.
pub fn contains_json_fragment(text: &str) -> bool {
    TRANSCRIPTION_LEAK.is_match(text)
        || BARE_OBJECT.is_match(text)
        || NESTED_OBJECT.is_match(text)
        || STRING_ARRAY.is_match(text)
}

/// Score a parsed result. Pure; never fails.
pub fn evaluate(parsed: &ParsedResult) -> QualityReport {
    let value = match serde_json::to_value(parsed) {
        Ok(v) => v,
        // ParsedResult is plain data; serialization cannot realistically
        // fail, but stay total regardless.
        Err(_) => Value::Null,
    };

    let mut issues = Vec::new();
    walk(&value, String::new(), &mut issues);

    let mut score: i64 = 100;
    for issue in &issues {
        score -= match issue.issue_type {
            IssueType::JsonMixedContent => JSON_MIXED_PENALTY,
            IssueType::EmptyContent => EMPTY_PENALTY,
            IssueType::InsufficientContent => INSUFFICIENT_PENALTY,
        };
    }
    let overall_score = score.clamp(0, 100) as u32;

    let json_mixed_detected = issues
        .iter()
        .any(|i| i.issue_type == IssueType::JsonMixedContent);
    let any_high = issues.iter().any(|i| i.severity == Severity::High);
    let needs_reprocessing =
        json_mixed_detected || overall_score < REPROCESS_SCORE_THRESHOLD || any_high;

    QualityReport {
        overall_score,
        issues,
        json_mixed_detected,
        needs_reprocessing,
    }
}

fn walk(value: &Value, path: String, issues: &mut Vec<Issue>) {
    match value {
        Value::String(text) => check_string(text, &path, issues),
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                walk(child, child_path, issues);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                walk(child, format!("{path}.{index}"), issues);
            }
        }
        _ => {}
    }
}

fn check_string(text: &str, path: &str, issues: &mut Vec<Issue>) {
    if text.is_empty() {
        issues.push(Issue {
            issue_type: IssueType::EmptyContent,
            field_path: path.to_string(),
            severity: Severity::Medium,
        });
    } else if contains_json_fragment(text) {
        issues.push(Issue {
            issue_type: IssueType::JsonMixedContent,
            field_path: path.to_string(),
            severity: Severity::High,
        });
    }

    // An empty transcription is both empty and insufficient; the high
    // severity is what forces reprocessing to substitute the placeholder.
    if path == "transcription" && text.trim().chars().count() < MIN_TRANSCRIPTION_CHARS {
        issues.push(Issue {
            issue_type: IssueType::InsufficientContent,
            field_path: path.to_string(),
            severity: Severity::High,
        });
    }
}
