//! Provider adapters
//!
//! An adapter translates one canonical generation request into a provider's
//! wire format and back. It does no I/O; bytes travel through a
//! [`ProviderClient`]. Adapters are chosen by identifier with [`adapter_for`].
//!
//! | identifier                  | wire format                             |
//! |-----------------------------|-----------------------------------------|
//! | `openai`                    | OpenAI chat completions (SSE streaming) |
//! | `ai21`, `amazon`, `anthropic`, `cohere`, `cohere-r`, `meta`, `mistral` | Bedrock model families |
//! | `cohere-api`                | Cohere generate API                     |
//! | `sagemaker`                 | SageMaker endpoint, via a [`ContentHandler`] |

mod bedrock;
mod client;
mod cohere;
mod openai;
mod retry;
mod sagemaker;
mod stream;

pub use bedrock::{BedrockAdapter, BedrockFamily};
pub use client::{ChunkStream, HttpClient, ProviderClient};
pub use cohere::CohereAdapter;
pub use openai::OpenAiAdapter;
pub use retry::{RetryConfig, RetryingClient, with_retry};
pub use sagemaker::{ContentHandler, JsonContentHandler, SagemakerAdapter};
pub use stream::{StreamAccumulator, accumulate_stream};

use serde::{Deserialize, Serialize};

use crate::error::{CatenaError, Result};
use crate::schema::{ChatMessage, StringifyOptions, TokenUsage, stringify_messages};

/// Prompt handed to an adapter
#[derive(Debug, Clone, Copy)]
pub enum AdapterInput<'a> {
    Text(&'a str),
    Messages(&'a [ChatMessage]),
}

impl AdapterInput<'_> {
    /// The prompt as one string, for providers that only take text.
    pub fn to_text(&self) -> String {
        match self {
            AdapterInput::Text(text) => text.to_string(),
            AdapterInput::Messages(messages) => {
                stringify_messages(messages, &StringifyOptions::default())
            }
        }
    }
}

/// Provider-neutral inference parameters.
///
/// Each adapter maps the fields it supports onto its own parameter names
/// and drops the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    /// Request a streamed response
    #[serde(default)]
    pub stream: bool,
    /// Provider-specific parameters copied into the request body as-is
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ModelParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Decoded blocking response
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdapterOutput {
    pub text: String,
    pub usage: TokenUsage,
    pub finish_reason: Option<String>,
}

/// Decoded streaming chunk
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamChunk {
    pub token: String,
    pub usage: TokenUsage,
    pub finish_reason: Option<String>,
}

/// Translation between canonical requests and one provider's wire format
pub trait ProviderAdapter: Send + Sync {
    /// Identifier this adapter was selected by
    fn name(&self) -> &str;

    fn prepare_request(&self, input: AdapterInput<'_>, params: &ModelParams) -> Result<Vec<u8>>;

    fn prepare_response(&self, body: &[u8]) -> Result<AdapterOutput>;

    fn prepare_stream_chunk(&self, chunk: &[u8]) -> Result<StreamChunk>;
}

/// Select an adapter by provider identifier.
pub fn adapter_for(identifier: &str) -> Result<Box<dyn ProviderAdapter>> {
    match identifier {
        "openai" => Ok(Box::new(OpenAiAdapter::new())),
        "cohere-api" => Ok(Box::new(CohereAdapter::new())),
        "sagemaker" => Ok(Box::new(SagemakerAdapter::default())),
        other => match BedrockFamily::parse(other) {
            Some(family) => Ok(Box::new(BedrockAdapter::new(family))),
            None => Err(CatenaError::Configuration(format!(
                "unknown provider identifier '{}'",
                identifier
            ))),
        },
    }
}

pub(crate) fn decode_error(provider: &str, err: impl std::fmt::Display) -> CatenaError {
    CatenaError::Decode(format!("{} payload: {}", provider, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_for_known_identifiers() {
        for id in [
            "openai",
            "ai21",
            "amazon",
            "anthropic",
            "cohere",
            "cohere-r",
            "meta",
            "mistral",
            "cohere-api",
            "sagemaker",
        ] {
            let adapter = adapter_for(id).unwrap();
            assert_eq!(adapter.name(), id);
        }
    }

    #[test]
    fn test_adapter_for_unknown_identifier_is_configuration_error() {
        let err = adapter_for("huggingface").err().unwrap();
        assert!(matches!(err, CatenaError::Configuration(_)));
    }

    #[test]
    fn test_params_builder() {
        let params = ModelParams::new()
            .with_model("gpt-4o")
            .with_temperature(5.0)
            .with_stop(vec!["\n".into()]);
        assert_eq!(params.temperature, Some(2.0));
        assert_eq!(params.model.as_deref(), Some("gpt-4o"));
        assert_eq!(params.stop.len(), 1);
    }
}
