//! OpenAI chat-completions adapter

use serde::{Deserialize, Serialize};

use super::{AdapterInput, AdapterOutput, ModelParams, ProviderAdapter, StreamChunk, decode_error};
use crate::error::{CatenaError, Result};
use crate::schema::{ChatMessage, TokenUsage};

/// Adapter for the OpenAI chat completions API and compatible servers
#[derive(Debug, Clone, Default)]
pub struct OpenAiAdapter;

impl OpenAiAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize, PartialEq)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiContent>,
    delta: Option<OpenAiContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiContent {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
    #[serde(default)]
    total_tokens: usize,
}

impl From<OpenAiUsage> for TokenUsage {
    fn from(u: OpenAiUsage) -> Self {
        TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

fn convert_messages(messages: &[ChatMessage]) -> Vec<OpenAiMessage> {
    messages
        .iter()
        .map(|m| OpenAiMessage {
            role: match m {
                ChatMessage::System { .. } => "system".to_string(),
                ChatMessage::Ai { .. } => "assistant".to_string(),
                ChatMessage::Human { .. } => "user".to_string(),
                ChatMessage::Generic { role, .. } => role.clone(),
            },
            content: m.text().to_string(),
        })
        .collect()
}

impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    fn prepare_request(&self, input: AdapterInput<'_>, params: &ModelParams) -> Result<Vec<u8>> {
        let model = params.model.as_deref().ok_or_else(|| {
            CatenaError::Configuration("openai requests need a model name".to_string())
        })?;

        let messages = match input {
            AdapterInput::Text(text) => convert_messages(&[ChatMessage::human(text)]),
            AdapterInput::Messages(messages) => convert_messages(messages),
        };

        let request = OpenAiRequest {
            model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_p: params.top_p,
            stop: &params.stop,
            stream: params.stream,
            stream_options: params.stream.then_some(StreamOptions {
                include_usage: true,
            }),
        };

        let mut body = serde_json::to_value(&request)?;
        if let Some(obj) = body.as_object_mut() {
            for (key, value) in &params.extra {
                obj.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        Ok(serde_json::to_vec(&body)?)
    }

    fn prepare_response(&self, body: &[u8]) -> Result<AdapterOutput> {
        let response: OpenAiResponse =
            serde_json::from_slice(body).map_err(|e| decode_error("openai", e))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| decode_error("openai", "response has no choices"))?;

        let text = choice
            .message
            .and_then(|m| m.content)
            .ok_or_else(|| decode_error("openai", "choice has no message content"))?;

        Ok(AdapterOutput {
            text,
            usage: response.usage.map(Into::into).unwrap_or_default(),
            finish_reason: choice.finish_reason,
        })
    }

    fn prepare_stream_chunk(&self, chunk: &[u8]) -> Result<StreamChunk> {
        let response: OpenAiResponse =
            serde_json::from_slice(chunk).map_err(|e| decode_error("openai", e))?;

        let mut out = StreamChunk {
            usage: response.usage.map(Into::into).unwrap_or_default(),
            ..Default::default()
        };

        // The trailing usage chunk carries no choices.
        if let Some(choice) = response.choices.into_iter().next() {
            out.token = choice.delta.and_then(|d| d.content).unwrap_or_default();
            out.finish_reason = choice.finish_reason;
        }

        Ok(out)
    }
}
