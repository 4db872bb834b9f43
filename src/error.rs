//! Error types for meetscribe.

use thiserror::Error;

use crate::model::dispatch::DispatchErrorKind;

#[derive(Error, Debug)]
pub enum MeetscribeError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio preparation errors
    #[error("Audio payload is empty")]
    AudioEmpty,

    #[error("Audio compression failed: {message}")]
    AudioCompression { message: String },

    #[error("Audio too short or insufficient for processing: {message}")]
    AudioInsufficient { message: String },

    // Dispatch errors
    #[error(
        "Model call failed after {attempts} attempts ({elapsed_ms}ms elapsed), last error [{kind}]: {message}"
    )]
    RetriesExhausted {
        kind: DispatchErrorKind,
        attempts: u32,
        elapsed_ms: u64,
        message: String,
    },

    #[error("Dispatch cancelled during backoff wait")]
    Cancelled,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, MeetscribeError>;

impl MeetscribeError {
    /// True when the error is terminal for the whole unit: the caller should
    /// surface it and move on to the next recording rather than retry.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MeetscribeError::AudioInsufficient { .. }
                | MeetscribeError::RetriesExhausted { .. }
                | MeetscribeError::Cancelled
        )
    }
}
