//! Request types for the generative model call.

use serde::{Deserialize, Serialize};

use crate::audio::payload::AudioPayload;
use crate::config::ModelConfig;
use crate::defaults;

/// Inline audio attached to a request, already base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineAudio {
    pub mime_type: String,
    /// Base64-encoded audio bytes.
    pub data: String,
}

/// Sampling parameters forwarded verbatim to the model endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: defaults::DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: defaults::DEFAULT_TEMPERATURE,
            top_p: defaults::DEFAULT_TOP_P,
            top_k: defaults::DEFAULT_TOP_K,
        }
    }
}

impl From<&ModelConfig> for GenerationConfig {
    fn from(config: &ModelConfig) -> Self {
        Self {
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
        }
    }
}

/// One prepared model call: prompt text parts plus optional inline audio.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub prompt_parts: Vec<String>,
    pub inline_audio: Option<InlineAudio>,
    pub generation_config: GenerationConfig,
}

impl ModelRequest {
    pub fn new(prompt_parts: Vec<String>, generation_config: GenerationConfig) -> Self {
        Self {
            prompt_parts,
            inline_audio: None,
            generation_config,
        }
    }

    pub fn with_inline_audio(mut self, payload: &AudioPayload, encoded: String) -> Self {
        self.inline_audio = Some(InlineAudio {
            mime_type: payload.mime_type.clone(),
            data: encoded,
        });
        self
    }
}

/// Raw text returned by the model. Opaque until parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawModelResponse {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioConfig;

    #[test]
    fn test_generation_config_defaults() {
        let config = GenerationConfig::default();
        assert_eq!(config.max_output_tokens, 65_536);
        assert_eq!(config.top_k, 40);
    }

    #[test]
    fn test_generation_config_from_model_config() {
        let model = ModelConfig {
            temperature: 0.9,
            top_k: 16,
            ..ModelConfig::default()
        };
        let config = GenerationConfig::from(&model);
        assert_eq!(config.temperature, 0.9);
        assert_eq!(config.top_k, 16);
        assert_eq!(config.max_output_tokens, model.max_output_tokens);
    }

    #[test]
    fn test_inline_audio_attachment() {
        let payload =
            AudioPayload::prepare(&[1u8; 64], "audio/mp4", &AudioConfig::default()).unwrap();
        let request = ModelRequest::new(vec!["prompt".to_string()], GenerationConfig::default())
            .with_inline_audio(&payload, "QUJD".to_string());

        let audio = request.inline_audio.unwrap();
        assert_eq!(audio.mime_type, "audio/mp4");
        assert_eq!(audio.data, "QUJD");
    }

    #[test]
    fn test_generation_config_camel_case_wire_format() {
        let json = serde_json::to_string(&GenerationConfig::default()).unwrap();
        assert!(json.contains("\"maxOutputTokens\""));
        assert!(json.contains("\"topP\""));
        assert!(json.contains("\"topK\""));
    }
}
