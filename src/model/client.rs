//! The model-client seam: one trait, a real HTTP implementation, a mock.
//!
//! Client configuration is an immutable value built once at pipeline start;
//! there is no lazy model auto-selection and nothing mutates after
//! construction, so one client is safe to share across concurrent units.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ModelConfig;
use crate::model::request::{GenerationConfig, InlineAudio, ModelRequest, RawModelResponse};

/// Unclassified failure from the model endpoint. The dispatcher's error
/// classifier turns this into a retry decision.
#[derive(Debug, Clone)]
pub struct ModelCallError {
    pub status: Option<u16>,
    pub message: String,
}

impl ModelCallError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl fmt::Display for ModelCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "model call failed ({status}): {}", self.message),
            None => write!(f, "model call failed: {}", self.message),
        }
    }
}

impl std::error::Error for ModelCallError {}

/// Trait for the generative model call.
///
/// This trait allows swapping implementations (real endpoint vs mock).
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Execute one model call. No retry here; that is the dispatcher's job.
    async fn generate(&self, request: &ModelRequest) -> Result<RawModelResponse, ModelCallError>;

    /// Name of the configured model, for logging and result metadata.
    fn model_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// HTTP implementation (Gemini-style generateContent endpoint)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineAudio>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Client for a `models/{name}:generateContent` endpoint.
pub struct HttpModelClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl HttpModelClient {
    /// Long timeout: a one-hour recording legitimately takes minutes to
    /// transcribe server-side.
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

    pub fn new(config: &ModelConfig, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.name.clone(),
        }
    }

    fn build_body(request: &ModelRequest) -> GenerateContentRequest {
        let mut parts: Vec<Part> = request
            .prompt_parts
            .iter()
            .map(|text| Part {
                text: Some(text.clone()),
                inline_data: None,
            })
            .collect();
        if let Some(audio) = &request.inline_audio {
            parts.push(Part {
                text: None,
                inline_data: Some(audio.clone()),
            });
        }
        GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: request.generation_config.clone(),
        }
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn generate(&self, request: &ModelRequest) -> Result<RawModelResponse, ModelCallError> {
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let body = Self::build_body(request);

        debug!(
            model = %self.model,
            prompt_parts = request.prompt_parts.len(),
            has_audio = request.inline_audio.is_some(),
            "sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelCallError::new(None, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ModelCallError::new(Some(status.as_u16()), text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ModelCallError::new(None, format!("invalid response: {e}")))?;

        let text: String = parsed
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ModelCallError::new(
                None,
                "invalid response: no candidate text",
            ));
        }

        debug!(chars = text.len(), "generateContent response received");
        Ok(RawModelResponse { text })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Mock implementation for tests
// ---------------------------------------------------------------------------

/// Mock model client scripted with a sequence of outcomes.
pub struct MockModelClient {
    model_name: String,
    script: Mutex<VecDeque<Result<String, ModelCallError>>>,
    calls: AtomicUsize,
}

impl MockModelClient {
    /// Create a new mock with an empty script.
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue a successful response.
    pub fn with_response(self, text: &str) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(text.to_string()));
        }
        self
    }

    /// Queue a failure with an optional HTTP status.
    pub fn with_failure(self, status: Option<u16>, message: &str) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(ModelCallError::new(status, message)));
        }
        self
    }

    /// Number of generate() calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn generate(&self, _request: &ModelRequest) -> Result<RawModelResponse, ModelCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(Ok(text)) => Ok(RawModelResponse { text }),
            Some(Err(error)) => Err(error),
            None => Err(ModelCallError::new(None, "mock script exhausted")),
        }
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
