//! Quality evaluation and targeted repair of parsed results.

pub mod evaluator;
pub mod reprocessor;

pub use evaluator::{Issue, IssueType, QualityReport, Severity, evaluate};
pub use reprocessor::{ReprocessResult, repair};
