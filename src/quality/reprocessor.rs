//! Targeted repair of fields flagged by the quality evaluator.
//!
//! Best-effort string surgery: leaked JSON fragments are stripped
//! innermost-first over multiple passes, escapes unescaped, whitespace
//! collapsed. Repair never fails: when it cannot improve the result the
//! caller keeps the original.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::defaults::REPAIR_PLACEHOLDER;
use crate::parse::result::ParsedResult;
use crate::quality::evaluator::{self, IssueType, QualityReport};

/// Outcome of one repair pass.
#[derive(Debug, Clone)]
pub struct ReprocessResult {
    /// True when the repaired result scored strictly higher than the original.
    pub success: bool,
    pub original_score: u32,
    pub improved_score: u32,
    pub improvements_made: Vec<String>,
    pub repaired_result: ParsedResult,
}

// Innermost JSON object with a quoted key; repeated passes peel nesting.
static INNER_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // hardcoded pattern
    Regex::new(r#"\{[^{}]*"\s*:[^{}]*\}"#).unwrap()
});

static INNER_STRING_ARRAY: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // hardcoded pattern
    Regex::new(r#"\[\s*"[^\[\]]*"\s*(?:,\s*"[^\[\]]*"\s*)*\]"#).unwrap()
});

// Leaked key/value remnant left behind once braces are gone.
static KV_REMNANT: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // hardcoded pattern
    Regex::new(r#""[A-Za-z_][A-Za-z0-9_]*"\s*:\s*"[^"]*",?"#).unwrap()
});

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // hardcoded pattern
    Regex::new(r"\s+").unwrap()
});

/// Nesting depth is bounded in practice; more passes than this means the
/// field is garbage rather than a recoverable leak.
const MAX_STRIP_PASSES: usize = 10;

/// Repair the fields named in the report, then re-score. Never errors.
pub fn repair(parsed: &ParsedResult, report: &QualityReport) -> ReprocessResult {
    let original_score = report.overall_score;

    let mut value = match serde_json::to_value(parsed) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "could not lift result into value tree, keeping original");
            return no_op_result(parsed, original_score);
        }
    };

    let mut improvements_made = Vec::new();

    for issue in &report.issues {
        let Some(field) = field_mut(&mut value, &issue.field_path) else {
            debug!(path = %issue.field_path, "flagged field not found, skipping");
            continue;
        };
        let Value::String(text) = field else {
            continue;
        };

        match issue.issue_type {
            IssueType::JsonMixedContent => {
                let cleaned = clean_field(text);
                if cleaned != *text {
                    improvements_made
                        .push(format!("{}: stripped leaked JSON fragment", issue.field_path));
                    *text = cleaned;
                }
            }
            IssueType::EmptyContent => {
                *text = REPAIR_PLACEHOLDER.to_string();
                improvements_made
                    .push(format!("{}: substituted error placeholder", issue.field_path));
            }
            // No local transform can conjure missing content.
            IssueType::InsufficientContent => {}
        }
    }

    let repaired_result: ParsedResult = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "repaired value tree no longer deserializes, keeping original");
            return no_op_result(parsed, original_score);
        }
    };

    let improved_score = evaluator::evaluate(&repaired_result).overall_score;
    let success = improved_score > original_score;

    debug!(
        original_score,
        improved_score,
        repairs = improvements_made.len(),
        "reprocessing complete"
    );

    ReprocessResult {
        success,
        original_score,
        improved_score,
        improvements_made,
        repaired_result,
    }
}

fn no_op_result(parsed: &ParsedResult, original_score: u32) -> ReprocessResult {
    ReprocessResult {
        success: false,
        original_score,
        improved_score: original_score,
        improvements_made: Vec::new(),
        repaired_result: parsed.clone(),
    }
}

/// Field-local cleaning transform for JSON-mixed content.
fn clean_field(text: &str) -> String {
    let mut current = text.to_string();

    // Strip objects/arrays innermost-first; nesting needs multiple passes.
    for _ in 0..MAX_STRIP_PASSES {
        let stripped = INNER_OBJECT.replace_all(&current, "");
        let stripped = INNER_STRING_ARRAY.replace_all(&stripped, "");
        if stripped == current {
            break;
        }
        current = stripped.into_owned();
    }

    current = KV_REMNANT.replace_all(&current, "").into_owned();
    current = current.replace("\\\"", "\"").replace("\\n", " ");
    current = WHITESPACE_RUN.replace_all(&current, " ").trim().to_string();

    if current.is_empty() {
        REPAIR_PLACEHOLDER.to_string()
    } else {
        current
    }
}

/// Walk a dotted path (`summary.attendeesAndCompanies.0.name`) through the
/// value tree: object keys by name, array elements by numeric index.
fn field_mut<'a>(value: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
