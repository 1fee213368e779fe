//! Bedrock model-family adapters
//!
//! Bedrock hosts several vendors behind one invoke API; each family keeps
//! its own body layout, parameter names and output shape.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use super::{AdapterInput, AdapterOutput, ModelParams, ProviderAdapter, StreamChunk, decode_error};
use crate::error::{CatenaError, Result};
use crate::schema::{ChatMessage, TokenUsage};

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
const ANTHROPIC_DEFAULT_MAX_TOKENS: usize = 1024;

/// Vendor family of a Bedrock model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BedrockFamily {
    Ai21,
    Amazon,
    Anthropic,
    Cohere,
    CohereR,
    Meta,
    Mistral,
}

/// Family-specific parameter names. `None` means unsupported (dropped).
struct ParamNames {
    temperature: &'static str,
    top_p: Option<&'static str>,
    top_k: Option<&'static str>,
    max_tokens: &'static str,
    stop: Option<&'static str>,
}

impl BedrockFamily {
    /// Parse an adapter identifier (`anthropic`, `cohere-r`, ...)
    pub fn parse(identifier: &str) -> Option<Self> {
        match identifier {
            "ai21" => Some(Self::Ai21),
            "amazon" => Some(Self::Amazon),
            "anthropic" => Some(Self::Anthropic),
            "cohere" => Some(Self::Cohere),
            "cohere-r" => Some(Self::CohereR),
            "meta" => Some(Self::Meta),
            "mistral" => Some(Self::Mistral),
            _ => None,
        }
    }

    /// Derive the family from a Bedrock model id such as
    /// `anthropic.claude-3-haiku-20240307-v1:0`.
    pub fn from_model_id(model_id: &str) -> Result<Self> {
        // Cross-region inference profiles prefix the id with a region code.
        let id = match model_id.split_once('.') {
            Some((region, rest)) if matches!(region, "us" | "eu" | "apac") => rest,
            _ => model_id,
        };
        let vendor = id.split('.').next().unwrap_or_default();

        if vendor == "cohere" && id.contains("command-r") {
            return Ok(Self::CohereR);
        }

        Self::parse(vendor).ok_or_else(|| {
            CatenaError::Configuration(format!("unsupported bedrock model id '{}'", model_id))
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ai21 => "ai21",
            Self::Amazon => "amazon",
            Self::Anthropic => "anthropic",
            Self::Cohere => "cohere",
            Self::CohereR => "cohere-r",
            Self::Meta => "meta",
            Self::Mistral => "mistral",
        }
    }

    fn param_names(&self) -> ParamNames {
        match self {
            Self::Ai21 => ParamNames {
                temperature: "temperature",
                top_p: Some("topP"),
                top_k: None,
                max_tokens: "maxTokens",
                stop: Some("stop_sequences"),
            },
            Self::Amazon => ParamNames {
                temperature: "temperature",
                top_p: Some("topP"),
                top_k: None,
                max_tokens: "maxTokenCount",
                stop: Some("stopSequences"),
            },
            Self::Anthropic => ParamNames {
                temperature: "temperature",
                top_p: Some("top_p"),
                top_k: Some("top_k"),
                max_tokens: "max_tokens",
                stop: Some("stop_sequences"),
            },
            Self::Cohere => ParamNames {
                temperature: "temperature",
                top_p: Some("p"),
                top_k: Some("k"),
                max_tokens: "max_tokens",
                stop: Some("stop_sequences"),
            },
            Self::CohereR => ParamNames {
                temperature: "temperature",
                top_p: Some("p"),
                top_k: Some("k"),
                max_tokens: "max_tokens",
                stop: None,
            },
            Self::Meta => ParamNames {
                temperature: "temperature",
                top_p: Some("top_p"),
                top_k: None,
                max_tokens: "max_gen_len",
                stop: None,
            },
            Self::Mistral => ParamNames {
                temperature: "temperature",
                top_p: Some("top_p"),
                top_k: Some("top_k"),
                max_tokens: "max_tokens",
                stop: Some("stop"),
            },
        }
    }
}

/// Adapter for one Bedrock model family
#[derive(Debug, Clone)]
pub struct BedrockAdapter {
    family: BedrockFamily,
}

impl BedrockAdapter {
    pub fn new(family: BedrockFamily) -> Self {
        Self { family }
    }

    pub fn from_model_id(model_id: &str) -> Result<Self> {
        Ok(Self::new(BedrockFamily::from_model_id(model_id)?))
    }

    pub fn family(&self) -> BedrockFamily {
        self.family
    }

    fn model_params(&self, params: &ModelParams) -> Map<String, Value> {
        let names = self.family.param_names();
        let mut body = params.extra.clone();

        if let Some(t) = params.temperature {
            body.insert(names.temperature.into(), json!(t));
        }
        if let (Some(name), Some(p)) = (names.top_p, params.top_p) {
            body.insert(name.into(), json!(p));
        }
        if let (Some(name), Some(k)) = (names.top_k, params.top_k) {
            body.insert(name.into(), json!(k));
        }
        match params.max_tokens {
            Some(n) => {
                body.insert(names.max_tokens.into(), json!(n));
            }
            None if self.family == BedrockFamily::Anthropic => {
                body.insert(names.max_tokens.into(), json!(ANTHROPIC_DEFAULT_MAX_TOKENS));
            }
            None => {}
        }
        if let (Some(name), false) = (names.stop, params.stop.is_empty()) {
            body.insert(name.into(), json!(params.stop));
        }
        body
    }
}


fn anthropic_messages(input: AdapterInput<'_>) -> (Option<String>, Vec<Value>) {
    match input {
        AdapterInput::Text(text) => (None, vec![json!({"role": "user", "content": text})]),
        AdapterInput::Messages(messages) => {
            let mut system: Vec<&str> = Vec::new();
            let mut turns = Vec::new();
            for message in messages {
                match message {
                    ChatMessage::System { text } => system.push(text),
                    ChatMessage::Ai { text } => {
                        turns.push(json!({"role": "assistant", "content": text}))
                    }
                    ChatMessage::Human { text } | ChatMessage::Generic { text, .. } => {
                        turns.push(json!({"role": "user", "content": text}))
                    }
                }
            }
            let system = (!system.is_empty()).then(|| system.join("\n"));
            (system, turns)
        }
    }
}

fn parse<T: DeserializeOwned>(family: BedrockFamily, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| decode_error(family.as_str(), e))
}

fn first<T>(family: BedrockFamily, items: Vec<T>, what: &str) -> Result<T> {
    items
        .into_iter()
        .next()
        .ok_or_else(|| decode_error(family.as_str(), format!("missing {}", what)))
}

#[derive(Deserialize)]
struct Ai21Output {
    completions: Vec<Ai21Completion>,
}

#[derive(Deserialize)]
struct Ai21Completion {
    data: Ai21Data,
    #[serde(rename = "finishReason")]
    finish_reason: Option<Ai21FinishReason>,
}

#[derive(Deserialize)]
struct Ai21Data {
    text: String,
}

#[derive(Deserialize)]
struct Ai21FinishReason {
    reason: Option<String>,
}

#[derive(Deserialize)]
struct AmazonOutput {
    #[serde(rename = "inputTextTokenCount", default)]
    input_text_token_count: usize,
    results: Vec<AmazonResult>,
}

#[derive(Deserialize)]
struct AmazonResult {
    #[serde(rename = "outputText")]
    output_text: String,
    #[serde(rename = "tokenCount", default)]
    token_count: usize,
    #[serde(rename = "completionReason")]
    completion_reason: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicOutput {
    content: Vec<AnthropicContent>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
}

#[derive(Deserialize, Default)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: usize,
    #[serde(default)]
    output_tokens: usize,
}

#[derive(Deserialize)]
struct CohereOutput {
    generations: Vec<CohereGeneration>,
}

#[derive(Deserialize)]
struct CohereGeneration {
    text: String,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CohereROutput {
    text: String,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct MetaOutput {
    generation: String,
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    generation_token_count: usize,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct MistralOutput {
    outputs: Vec<MistralGeneration>,
}

#[derive(Deserialize)]
struct MistralGeneration {
    text: String,
    stop_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct InvocationMetrics {
    #[serde(rename = "inputTokenCount", default)]
    input_token_count: usize,
    #[serde(rename = "outputTokenCount", default)]
    output_token_count: usize,
}

impl InvocationMetrics {
    fn usage(&self) -> TokenUsage {
        TokenUsage::new(self.input_token_count, self.output_token_count)
    }
}

/// Stream payloads share the metrics envelope; the token field differs per
/// family, so the body is kept as loose JSON.
#[derive(Deserialize)]
struct StreamEnvelope {
    #[serde(rename = "amazon-bedrock-invocationMetrics", default)]
    metrics: InvocationMetrics,
    #[serde(flatten)]
    body: Map<String, Value>,
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

impl ProviderAdapter for BedrockAdapter {
    fn name(&self) -> &str {
        self.family.as_str()
    }

    fn prepare_request(&self, input: AdapterInput<'_>, params: &ModelParams) -> Result<Vec<u8>> {
        let params_body = self.model_params(params);

        let body = match self.family {
            BedrockFamily::Ai21 | BedrockFamily::Cohere | BedrockFamily::Meta => {
                let mut body = params_body;
                body.insert("prompt".into(), json!(input.to_text()));
                body
            }
            BedrockFamily::Amazon => {
                let mut body = Map::new();
                body.insert("inputText".into(), json!(input.to_text()));
                body.insert("textGenerationConfig".into(), Value::Object(params_body));
                body
            }
            BedrockFamily::Anthropic => {
                let mut body = params_body;
                let (system, messages) = anthropic_messages(input);
                body.insert("anthropic_version".into(), json!(ANTHROPIC_VERSION));
                if let Some(system) = system {
                    body.insert("system".into(), json!(system));
                }
                body.insert("messages".into(), Value::Array(messages));
                body
            }
            BedrockFamily::CohereR => {
                let mut body = params_body;
                body.insert("message".into(), json!(input.to_text()));
                body
            }
            BedrockFamily::Mistral => {
                let mut body = params_body;
                body.insert(
                    "prompt".into(),
                    json!(format!("<s>[INST] {} [/INST]", input.to_text())),
                );
                body
            }
        };

        Ok(serde_json::to_vec(&body)?)
    }

    fn prepare_response(&self, body: &[u8]) -> Result<AdapterOutput> {
        let family = self.family;

        let output = match family {
            BedrockFamily::Ai21 => {
                let out: Ai21Output = parse(family, body)?;
                let completion = first(family, out.completions, "completions[0]")?;
                AdapterOutput {
                    text: completion.data.text,
                    usage: TokenUsage::default(),
                    finish_reason: completion.finish_reason.and_then(|r| r.reason),
                }
            }
            BedrockFamily::Amazon => {
                let out: AmazonOutput = parse(family, body)?;
                let input_tokens = out.input_text_token_count;
                let result = first(family, out.results, "results[0]")?;
                AdapterOutput {
                    text: result.output_text,
                    usage: TokenUsage::new(input_tokens, result.token_count),
                    finish_reason: result.completion_reason,
                }
            }
            BedrockFamily::Anthropic => {
                let out: AnthropicOutput = parse(family, body)?;
                let usage = TokenUsage::new(out.usage.input_tokens, out.usage.output_tokens);
                let content = first(family, out.content, "content[0]")?;
                AdapterOutput {
                    text: content.text,
                    usage,
                    finish_reason: out.stop_reason,
                }
            }
            BedrockFamily::Cohere => {
                let out: CohereOutput = parse(family, body)?;
                let generation = first(family, out.generations, "generations[0]")?;
                AdapterOutput {
                    text: generation.text,
                    usage: TokenUsage::default(),
                    finish_reason: generation.finish_reason,
                }
            }
            BedrockFamily::CohereR => {
                let out: CohereROutput = parse(family, body)?;
                AdapterOutput {
                    text: out.text,
                    usage: TokenUsage::default(),
                    finish_reason: out.finish_reason,
                }
            }
            BedrockFamily::Meta => {
                let out: MetaOutput = parse(family, body)?;
                AdapterOutput {
                    text: out.generation,
                    usage: TokenUsage::new(out.prompt_token_count, out.generation_token_count),
                    finish_reason: out.stop_reason,
                }
            }
            BedrockFamily::Mistral => {
                let out: MistralOutput = parse(family, body)?;
                let generation = first(family, out.outputs, "outputs[0]")?;
                AdapterOutput {
                    text: generation.text,
                    usage: TokenUsage::default(),
                    finish_reason: generation.stop_reason,
                }
            }
        };

        Ok(output)
    }

    fn prepare_stream_chunk(&self, chunk: &[u8]) -> Result<StreamChunk> {
        let family = self.family;
        let envelope: StreamEnvelope = parse(family, chunk)?;
        let body = Value::Object(envelope.body);
        let missing = |field: &str| decode_error(family.as_str(), format!("missing {}", field));

        let (token, finish_reason) = match family {
            BedrockFamily::Ai21 => {
                return Err(CatenaError::Configuration(
                    "ai21 models do not support streaming".to_string(),
                ));
            }
            BedrockFamily::Amazon => (
                str_at(&body, "/outputText").ok_or_else(|| missing("outputText"))?,
                str_at(&body, "/completionReason"),
            ),
            // Anthropic streams typed events; only deltas carry text.
            BedrockFamily::Anthropic => (
                str_at(&body, "/delta/text").unwrap_or_default(),
                str_at(&body, "/delta/stop_reason"),
            ),
            BedrockFamily::Cohere => (
                str_at(&body, "/generations/0/text").ok_or_else(|| missing("generations[0]"))?,
                str_at(&body, "/generations/0/finish_reason"),
            ),
            BedrockFamily::CohereR => {
                let finished = body
                    .get("is_finished")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                (
                    str_at(&body, "/text").unwrap_or_default(),
                    if finished {
                        str_at(&body, "/finish_reason")
                    } else {
                        None
                    },
                )
            }
            BedrockFamily::Meta => (
                str_at(&body, "/generation").ok_or_else(|| missing("generation"))?,
                str_at(&body, "/stop_reason"),
            ),
            BedrockFamily::Mistral => (
                str_at(&body, "/outputs/0/text").ok_or_else(|| missing("outputs[0]"))?,
                str_at(&body, "/outputs/0/stop_reason"),
            ),
        };

        Ok(StreamChunk {
            token: token.to_string(),
            usage: envelope.metrics.usage(),
            finish_reason: finish_reason.map(str::to_string),
        })
    }
}
