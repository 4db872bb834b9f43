//! Classified retry around the model client.
//!
//! Every failure is classified into a [`DispatchErrorKind`] which decides
//! whether the call is retried and how long to wait before the next attempt.
//! Waits are generous on purpose: free-tier quota windows recover on the
//! order of half a minute, and hammering an overloaded endpoint only extends
//! the outage.

use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RetryConfig;
use crate::defaults;
use crate::error::{MeetscribeError, Result};
use crate::model::client::{ModelCallError, ModelClient};
use crate::model::request::{ModelRequest, RawModelResponse};

/// Failure class of one model call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchErrorKind {
    /// The model judged the audio too short or empty. Never retried.
    InsufficientAudio,
    /// 503, the service is overloaded.
    ServiceOverload,
    /// 429, rate limit or quota window exhausted.
    QuotaExceeded,
    /// 500, transient server fault.
    InternalError,
    /// 401 or 403, key missing or rejected.
    AuthFailed,
    /// 400, the request itself was malformed.
    InvalidFormat,
    /// The call succeeded at the HTTP level but the body was unusable.
    ResponseInvalid,
    /// The upload is still being processed server-side.
    Processing,
    Unknown,
}

impl DispatchErrorKind {
    /// Stable code used in logs and exhaustion errors.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientAudio => "INSUFFICIENT_AUDIO",
            Self::ServiceOverload => "SERVICE_OVERLOAD",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::AuthFailed => "AUTH_FAILED",
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::ResponseInvalid => "RESPONSE_INVALID",
            Self::Processing => "PROCESSING",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for DispatchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Classify a raw call failure. Status codes win; message substrings cover
/// errors that arrive without one (transport faults, body-level errors).
pub fn classify(error: &ModelCallError) -> DispatchErrorKind {
    let message = error.message.to_lowercase();

    // The model reports unusably short audio as a plain 400-family message.
    if message.contains("too short") || message.contains("audio is empty") {
        return DispatchErrorKind::InsufficientAudio;
    }

    match error.status {
        Some(503) => return DispatchErrorKind::ServiceOverload,
        Some(429) => return DispatchErrorKind::QuotaExceeded,
        Some(500) => return DispatchErrorKind::InternalError,
        Some(401) | Some(403) => return DispatchErrorKind::AuthFailed,
        Some(400) => return DispatchErrorKind::InvalidFormat,
        _ => {}
    }

    if message.contains("overload") || message.contains("unavailable") {
        DispatchErrorKind::ServiceOverload
    } else if message.contains("quota") || message.contains("rate limit") {
        DispatchErrorKind::QuotaExceeded
    } else if message.contains("api key") || message.contains("unauthorized") {
        DispatchErrorKind::AuthFailed
    } else if message.contains("invalid response") {
        DispatchErrorKind::ResponseInvalid
    } else if message.contains("still processing") || message.contains("not ready") {
        DispatchErrorKind::Processing
    } else {
        DispatchErrorKind::Unknown
    }
}

static RETRY_DELAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // hardcoded pattern
    Regex::new(r#""retryDelay"\s*:\s*"(\d+)s?""#).unwrap()
});
static RETRY_AFTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // hardcoded pattern
    Regex::new(r"(?i)retry.after[:\s]+(\d+)").unwrap()
});

/// Extract a server-suggested wait from a quota error body, if present.
pub fn suggested_retry_delay(error: &ModelCallError) -> Option<Duration> {
    for re in [&*RETRY_DELAY_RE, &*RETRY_AFTER_RE] {
        if let Some(caps) = re.captures(&error.message)
            && let Some(seconds) = caps.get(1)
            && let Ok(seconds) = seconds.as_str().parse::<u64>()
        {
            return Some(Duration::from_secs(seconds));
        }
    }
    None
}

/// Wait before retry `attempt` (1-based) for an error of `kind`.
///
/// Quota errors honor a server-suggested delay; everything (including the
/// suggestion) is clamped to the configured floor so a short hint never
/// causes a burst back into the same quota window.
pub fn backoff_delay(
    retry: &RetryConfig,
    kind: DispatchErrorKind,
    attempt: u32,
    suggested: Option<Duration>,
) -> Duration {
    let step = attempt.saturating_sub(1) as u64;
    let ms = match kind {
        DispatchErrorKind::QuotaExceeded => match suggested {
            Some(hint) => hint.as_millis() as u64,
            None => retry.backoff_base_ms + step * retry.backoff_increment_ms,
        },
        DispatchErrorKind::Unknown => {
            defaults::UNKNOWN_BACKOFF_BASE_MS + step * defaults::UNKNOWN_BACKOFF_INCREMENT_MS
        }
        _ => retry.backoff_base_ms + step * retry.backoff_increment_ms,
    };
    Duration::from_millis(ms.max(retry.backoff_floor_ms))
}

/// Retrying wrapper around a [`ModelClient`].
pub struct RequestDispatcher {
    client: Arc<dyn ModelClient>,
    retry: RetryConfig,
    cancel: CancellationToken,
}

impl RequestDispatcher {
    pub fn new(client: Arc<dyn ModelClient>, retry: RetryConfig) -> Self {
        Self {
            client,
            retry,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an external cancellation token instead of the dispatcher's own.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    /// Execute the request, retrying retriable failures up to the configured
    /// attempt limit. Short-audio rejections abort immediately; exhaustion
    /// surfaces the last failure with its classification and timing.
    pub async fn dispatch(&self, request: &ModelRequest) -> Result<RawModelResponse> {
        let started = Instant::now();
        let max_attempts = self.retry.max_retries.max(1);
        let mut last_failure: Option<(DispatchErrorKind, ModelCallError)> = None;

        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                return Err(MeetscribeError::Cancelled);
            }

            match self.client.generate(request).await {
                Ok(response) => {
                    debug!(attempt, "model call succeeded");
                    return Ok(response);
                }
                Err(call_error) => {
                    let kind = classify(&call_error);

                    if kind == DispatchErrorKind::InsufficientAudio {
                        warn!(attempt, "model rejected audio as too short, not retrying");
                        return Err(MeetscribeError::AudioInsufficient {
                            message: call_error.message,
                        });
                    }
                    if kind == DispatchErrorKind::AuthFailed {
                        error!(code = %kind, error = %call_error, "authentication failure, check API key");
                    } else {
                        warn!(attempt, code = %kind, error = %call_error, "model call failed");
                    }

                    if attempt < max_attempts {
                        let suggested = suggested_retry_delay(&call_error);
                        let delay = backoff_delay(&self.retry, kind, attempt, suggested);
                        info!(
                            attempt,
                            code = %kind,
                            wait_ms = delay.as_millis() as u64,
                            "waiting before retry"
                        );
                        tokio::select! {
                            _ = sleep(delay) => {}
                            _ = self.cancel.cancelled() => return Err(MeetscribeError::Cancelled),
                        }
                    }
                    last_failure = Some((kind, call_error));
                }
            }
        }

        let (kind, call_error) = match last_failure {
            Some(failure) => failure,
            None => (
                DispatchErrorKind::Unknown,
                ModelCallError::new(None, "no attempts executed".to_string()),
            ),
        };
        Err(MeetscribeError::RetriesExhausted {
            kind,
            attempts: max_attempts,
            elapsed_ms: started.elapsed().as_millis() as u64,
            message: call_error.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::client::MockModelClient;
    use crate::model::request::{GenerationConfig, ModelRequest};

    fn err(status: Option<u16>, message: &str) -> ModelCallError {
        ModelCallError::new(status, message)
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            backoff_base_ms: 10,
            backoff_increment_ms: 5,
            backoff_floor_ms: 0,
        }
    }

    fn request() -> ModelRequest {
        ModelRequest::new(vec!["prompt".to_string()], GenerationConfig::default())
    }

    #[test]
    fn test_classify_by_status() {
        assert_eq!(
            classify(&err(Some(503), "")),
            DispatchErrorKind::ServiceOverload
        );
        assert_eq!(
            classify(&err(Some(429), "")),
            DispatchErrorKind::QuotaExceeded
        );
        assert_eq!(
            classify(&err(Some(500), "")),
            DispatchErrorKind::InternalError
        );
        assert_eq!(classify(&err(Some(401), "")), DispatchErrorKind::AuthFailed);
        assert_eq!(classify(&err(Some(403), "")), DispatchErrorKind::AuthFailed);
        assert_eq!(
            classify(&err(Some(400), "bad request")),
            DispatchErrorKind::InvalidFormat
        );
    }

    #[test]
    fn test_classify_by_message() {
        assert_eq!(
            classify(&err(None, "the model is overloaded")),
            DispatchErrorKind::ServiceOverload
        );
        assert_eq!(
            classify(&err(None, "Quota exceeded for requests per minute")),
            DispatchErrorKind::QuotaExceeded
        );
        assert_eq!(
            classify(&err(None, "API key not valid")),
            DispatchErrorKind::AuthFailed
        );
        assert_eq!(
            classify(&err(None, "invalid response: no candidate text")),
            DispatchErrorKind::ResponseInvalid
        );
        assert_eq!(
            classify(&err(None, "file is still processing")),
            DispatchErrorKind::Processing
        );
        assert_eq!(
            classify(&err(None, "something odd")),
            DispatchErrorKind::Unknown
        );
    }

    #[test]
    fn test_classify_short_audio_beats_status() {
        // 400 body, but the short-audio signal must win.
        assert_eq!(
            classify(&err(Some(400), "Audio is too short to transcribe")),
            DispatchErrorKind::InsufficientAudio
        );
    }

    #[test]
    fn test_suggested_retry_delay_parsing() {
        let body = r#"{"error": {"details": [{"retryDelay": "22s"}]}}"#;
        assert_eq!(
            suggested_retry_delay(&err(Some(429), body)),
            Some(Duration::from_secs(22))
        );
        assert_eq!(
            suggested_retry_delay(&err(Some(429), "Retry-After: 17")),
            Some(Duration::from_secs(17))
        );
        assert_eq!(suggested_retry_delay(&err(Some(429), "no hint here")), None);
    }

    #[test]
    fn test_backoff_grows_linearly() {
        let retry = RetryConfig::default();
        for attempt in 1..=5u32 {
            let expected = 35_000 + (attempt as u64 - 1) * 10_000;
            let delay = backoff_delay(&retry, DispatchErrorKind::ServiceOverload, attempt, None);
            assert_eq!(delay.as_millis() as u64, expected);
        }
    }

    #[test]
    fn test_quota_backoff_floor_holds() {
        let retry = RetryConfig::default();
        for attempt in 1..=5u32 {
            let no_hint = backoff_delay(&retry, DispatchErrorKind::QuotaExceeded, attempt, None);
            assert!(no_hint.as_millis() as u64 >= 35_000 + (attempt as u64 - 1) * 10_000);

            let short_hint = backoff_delay(
                &retry,
                DispatchErrorKind::QuotaExceeded,
                attempt,
                Some(Duration::from_secs(5)),
            );
            assert_eq!(short_hint, Duration::from_millis(35_000));
        }
    }

    #[test]
    fn test_quota_backoff_honors_long_hint() {
        let retry = RetryConfig::default();
        let delay = backoff_delay(
            &retry,
            DispatchErrorKind::QuotaExceeded,
            1,
            Some(Duration::from_secs(90)),
        );
        assert_eq!(delay, Duration::from_secs(90));
    }

    #[test]
    fn test_unknown_backoff_floored() {
        let retry = RetryConfig::default();
        // 30s base would undercut the floor on the first attempt.
        let first = backoff_delay(&retry, DispatchErrorKind::Unknown, 1, None);
        assert_eq!(first, Duration::from_millis(35_000));
        let third = backoff_delay(&retry, DispatchErrorKind::Unknown, 3, None);
        assert_eq!(third, Duration::from_millis(40_000));
    }

    #[tokio::test]
    async fn test_dispatch_returns_first_success() {
        let client = Arc::new(MockModelClient::new("mock").with_response("hello"));
        let dispatcher = RequestDispatcher::new(client.clone(), fast_retry());
        let response = dispatcher.dispatch(&request()).await.unwrap();
        assert_eq!(response.text, "hello");
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_retries_overload_with_full_waits() {
        // Two 503s then success: the two waits are 35s and 45s, so the
        // paused clock must have advanced at least 80s in total.
        let client = Arc::new(
            MockModelClient::new("mock")
                .with_failure(Some(503), "overloaded")
                .with_failure(Some(503), "overloaded")
                .with_response("recovered"),
        );
        let dispatcher = RequestDispatcher::new(client.clone(), RetryConfig::default());

        let started = Instant::now();
        let response = dispatcher.dispatch(&request()).await.unwrap();
        assert_eq!(response.text, "recovered");
        assert_eq!(client.call_count(), 3);
        assert!(started.elapsed() >= Duration::from_secs(80));
    }

    #[tokio::test]
    async fn test_dispatch_short_audio_aborts_immediately() {
        let client = Arc::new(
            MockModelClient::new("mock")
                .with_failure(Some(400), "Audio is too short to transcribe"),
        );
        let dispatcher = RequestDispatcher::new(client.clone(), fast_retry());
        let error = dispatcher.dispatch(&request()).await.unwrap_err();
        assert!(matches!(error, MeetscribeError::AudioInsufficient { .. }));
        assert!(error.is_terminal());
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_exhaustion_reports_last_failure() {
        let client = Arc::new(
            MockModelClient::new("mock")
                .with_failure(Some(500), "boom one")
                .with_failure(Some(503), "boom two")
                .with_failure(Some(429), "quota out"),
        );
        let dispatcher = RequestDispatcher::new(client.clone(), fast_retry());
        let error = dispatcher.dispatch(&request()).await.unwrap_err();
        match error {
            MeetscribeError::RetriesExhausted {
                kind,
                attempts,
                message,
                ..
            } => {
                assert_eq!(kind, DispatchErrorKind::QuotaExceeded);
                assert_eq!(attempts, 3);
                assert_eq!(message, "quota out");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(client.call_count(), 3);
        assert!(error_display_mentions_code());
    }

    fn error_display_mentions_code() -> bool {
        let error = MeetscribeError::RetriesExhausted {
            kind: DispatchErrorKind::ServiceOverload,
            attempts: 5,
            elapsed_ms: 1234,
            message: "overloaded".to_string(),
        };
        error.to_string().contains("SERVICE_OVERLOAD")
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_cancelled_during_wait() {
        let client = Arc::new(
            MockModelClient::new("mock")
                .with_failure(Some(503), "overloaded")
                .with_response("never reached"),
        );
        let cancel = CancellationToken::new();
        let dispatcher = RequestDispatcher::new(client.clone(), RetryConfig::default())
            .with_cancellation(cancel.clone());

        let handle = tokio::spawn({
            let req = request();
            async move { dispatcher.dispatch(&req).await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(MeetscribeError::Cancelled)));
        assert_eq!(client.call_count(), 1);
    }
}
