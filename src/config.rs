//! Pipeline configuration loaded from TOML.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::defaults;
use crate::error::{MeetscribeError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub model: ModelConfig,
    pub retry: RetryConfig,
}

/// Audio sizing and chunk-validation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Compression trigger: payloads above this are stride-downsampled.
    pub target_size_mb: f64,
    /// Upstream hard limit per request; chunk plans must stay under this.
    pub hard_limit_mb: f64,
    /// Chunks shorter than this many seconds are excluded from the plan.
    pub min_chunk_seconds: f64,
    /// Chunks with a lower non-zero-byte ratio are treated as silent.
    pub min_nonzero_ratio: f64,
}

/// Generative model endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub api_base: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

/// Dispatch retry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_increment_ms: u64,
    pub backoff_floor_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            target_size_mb: defaults::TARGET_SIZE_MB,
            hard_limit_mb: defaults::HARD_LIMIT_MB,
            min_chunk_seconds: defaults::MIN_CHUNK_SECONDS,
            min_nonzero_ratio: defaults::MIN_NONZERO_RATIO,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: defaults::DEFAULT_MODEL.to_string(),
            api_base: defaults::DEFAULT_API_BASE.to_string(),
            max_output_tokens: defaults::DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: defaults::DEFAULT_TEMPERATURE,
            top_p: defaults::DEFAULT_TOP_P,
            top_k: defaults::DEFAULT_TOP_K,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            backoff_base_ms: defaults::BACKOFF_BASE_MS,
            backoff_increment_ms: defaults::BACKOFF_INCREMENT_MS,
            backoff_floor_ms: defaults::BACKOFF_FLOOR_MS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MeetscribeError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                MeetscribeError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file
    /// doesn't exist. Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(MeetscribeError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.audio.target_size_mb <= 0.0 || self.audio.target_size_mb > self.audio.hard_limit_mb
        {
            return Err(MeetscribeError::ConfigInvalidValue {
                key: "audio.target_size_mb".to_string(),
                message: format!(
                    "must be positive and at most hard_limit_mb ({})",
                    self.audio.hard_limit_mb
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.audio.min_nonzero_ratio) {
            return Err(MeetscribeError::ConfigInvalidValue {
                key: "audio.min_nonzero_ratio".to_string(),
                message: "must be within 0.0..=1.0".to_string(),
            });
        }
        if self.retry.max_retries == 0 {
            return Err(MeetscribeError::ConfigInvalidValue {
                key: "retry.max_retries".to_string(),
                message: "at least one attempt is required".to_string(),
            });
        }
        if self.model.name.is_empty() {
            return Err(MeetscribeError::ConfigInvalidValue {
                key: "model.name".to_string(),
                message: "model name must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - MEETSCRIBE_MODEL → model.name
    /// - MEETSCRIBE_API_BASE → model.api_base
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("MEETSCRIBE_MODEL")
            && !model.is_empty()
        {
            self.model.name = model;
        }

        if let Ok(base) = std::env::var("MEETSCRIBE_API_BASE")
            && !base.is_empty()
        {
            self.model.api_base = base;
        }

        self
    }
}
