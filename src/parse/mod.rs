//! Response parsing: raw model text → structured transcript-and-summary.

pub mod result;
pub mod strategies;

pub use result::{
    ActionItem, Attendee, AudioQuality, ParsedResult, StructuredSummary, TimeRange,
    TopicDiscussion,
};
pub use strategies::{ParseError, balance_braces, parse};
