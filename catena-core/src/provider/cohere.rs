//! Cohere generate API adapter

use serde::{Deserialize, Serialize};

use super::{AdapterInput, AdapterOutput, ModelParams, ProviderAdapter, StreamChunk, decode_error};
use crate::error::{CatenaError, Result};
use crate::schema::TokenUsage;

/// Adapter for Cohere's direct `generate` endpoint.
///
/// Selected as `cohere-api`; `cohere` names the Bedrock-hosted family.
#[derive(Debug, Clone, Default)]
pub struct CohereAdapter;

impl CohereAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Serialize)]
struct CohereRequest<'a> {
    model: &'a str,
    prompt: String,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop_sequences: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    k: Option<usize>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct CohereResponse {
    #[serde(default)]
    generations: Vec<CohereGeneration>,
    meta: Option<CohereMeta>,
}

#[derive(Deserialize)]
struct CohereGeneration {
    text: String,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CohereMeta {
    billed_units: Option<BilledUnits>,
}

#[derive(Deserialize)]
struct BilledUnits {
    #[serde(default)]
    input_tokens: usize,
    #[serde(default)]
    output_tokens: usize,
}

/// One line of a streamed generation
#[derive(Deserialize)]
struct CohereStreamEvent {
    #[serde(default)]
    text: String,
    #[serde(default)]
    is_finished: bool,
    finish_reason: Option<String>,
    response: Option<CohereResponse>,
}

fn usage(meta: Option<CohereMeta>) -> TokenUsage {
    meta.and_then(|m| m.billed_units)
        .map(|b| TokenUsage::new(b.input_tokens, b.output_tokens))
        .unwrap_or_default()
}

impl ProviderAdapter for CohereAdapter {
    fn name(&self) -> &str {
        "cohere-api"
    }

    fn prepare_request(&self, input: AdapterInput<'_>, params: &ModelParams) -> Result<Vec<u8>> {
        let model = params.model.as_deref().ok_or_else(|| {
            CatenaError::Configuration("cohere requests need a model name".to_string())
        })?;

        let request = CohereRequest {
            model,
            prompt: input.to_text(),
            stop_sequences: &params.stop,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            p: params.top_p,
            k: params.top_k,
            stream: params.stream,
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
        let response: CohereResponse =
            serde_json::from_slice(body).map_err(|e| decode_error("cohere-api", e))?;

        let generation = response
            .generations
            .into_iter()
            .next()
            .ok_or_else(|| decode_error("cohere-api", "response has no generations"))?;

        Ok(AdapterOutput {
            text: generation.text,
            usage: usage(response.meta),
            finish_reason: generation.finish_reason,
        })
    }

    fn prepare_stream_chunk(&self, chunk: &[u8]) -> Result<StreamChunk> {
        let event: CohereStreamEvent =
            serde_json::from_slice(chunk).map_err(|e| decode_error("cohere-api", e))?;

        if !event.is_finished {
            return Ok(StreamChunk {
                token: event.text,
                ..Default::default()
            });
        }

        // The closing event repeats the full generation; only its metadata is new.
        Ok(StreamChunk {
            token: String::new(),
            usage: usage(event.response.and_then(|r| r.meta)),
            finish_reason: event.finish_reason,
        })
    }
}
