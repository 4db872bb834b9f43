//! Model-facing side of the pipeline: request shapes, prompt templates,
//! the client trait with its HTTP and mock implementations, and the
//! classifying retry dispatcher.

pub mod client;
pub mod dispatch;
pub mod prompt;
pub mod request;

pub use client::{HttpModelClient, MockModelClient, ModelCallError, ModelClient};
pub use dispatch::{DispatchErrorKind, RequestDispatcher, backoff_delay, classify};
pub use prompt::{UNIFIED_SYSTEM, unified_user_prompt};
pub use request::{GenerationConfig, InlineAudio, ModelRequest, RawModelResponse};
