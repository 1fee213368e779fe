//! SageMaker endpoint adapter
//!
//! SageMaker endpoints accept whatever the deployed container expects, so the
//! wire format is delegated to a [`ContentHandler`].

use std::sync::Arc;

use serde_json::{Map, Value, json};

use super::{AdapterInput, AdapterOutput, ModelParams, ProviderAdapter, StreamChunk, decode_error};
use crate::error::{CatenaError, Result};

/// Converts prompts to an endpoint's request body and its response body
/// back to text.
pub trait ContentHandler: Send + Sync {
    /// MIME type of the request body
    fn content_type(&self) -> &str;

    /// MIME type requested for the response body
    fn accept(&self) -> &str;

    fn transform_input(&self, prompt: &str, params: &ModelParams) -> Result<Vec<u8>>;

    fn transform_output(&self, body: &[u8]) -> Result<String>;
}

/// JSON handler for text-generation containers.
///
/// Sends `{"inputs": prompt, "parameters": {...}}` and reads the generated
/// text at a JSON pointer (`/0/generated_text` by default, the shape
/// Hugging Face containers return).
#[derive(Debug, Clone)]
pub struct JsonContentHandler {
    output_pointer: String,
}

impl Default for JsonContentHandler {
    fn default() -> Self {
        Self {
            output_pointer: "/0/generated_text".to_string(),
        }
    }
}

impl JsonContentHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.output_pointer = pointer.into();
        self
    }
}

impl ContentHandler for JsonContentHandler {
    fn content_type(&self) -> &str {
        "application/json"
    }

    fn accept(&self) -> &str {
        "application/json"
    }

    fn transform_input(&self, prompt: &str, params: &ModelParams) -> Result<Vec<u8>> {
        let mut parameters = Map::new();
        if let Some(max_tokens) = params.max_tokens {
            parameters.insert("max_new_tokens".into(), json!(max_tokens));
        }
        if let Some(temperature) = params.temperature {
            parameters.insert("temperature".into(), json!(temperature));
        }
        if let Some(top_p) = params.top_p {
            parameters.insert("top_p".into(), json!(top_p));
        }
        if let Some(top_k) = params.top_k {
            parameters.insert("top_k".into(), json!(top_k));
        }
        if !params.stop.is_empty() {
            parameters.insert("stop".into(), json!(params.stop));
        }
        for (key, value) in &params.extra {
            parameters.entry(key.clone()).or_insert_with(|| value.clone());
        }

        let mut body = Map::new();
        body.insert("inputs".into(), json!(prompt));
        if !parameters.is_empty() {
            body.insert("parameters".into(), Value::Object(parameters));
        }
        Ok(serde_json::to_vec(&body)?)
    }

    fn transform_output(&self, body: &[u8]) -> Result<String> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| decode_error("sagemaker", e))?;
        value
            .pointer(&self.output_pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| decode_error("sagemaker", format!("missing {}", self.output_pointer)))
    }
}

/// Adapter for SageMaker inference endpoints
#[derive(Clone)]
pub struct SagemakerAdapter {
    handler: Arc<dyn ContentHandler>,
}

impl SagemakerAdapter {
    pub fn new(handler: Arc<dyn ContentHandler>) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &Arc<dyn ContentHandler> {
        &self.handler
    }
}

impl Default for SagemakerAdapter {
    fn default() -> Self {
        Self::new(Arc::new(JsonContentHandler::default()))
    }
}

impl std::fmt::Debug for SagemakerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagemakerAdapter")
            .field("content_type", &self.handler.content_type())
            .field("accept", &self.handler.accept())
            .finish()
    }
}

impl ProviderAdapter for SagemakerAdapter {
    fn name(&self) -> &str {
        "sagemaker"
    }

    fn prepare_request(&self, input: AdapterInput<'_>, params: &ModelParams) -> Result<Vec<u8>> {
        self.handler.transform_input(&input.to_text(), params)
    }

    fn prepare_response(&self, body: &[u8]) -> Result<AdapterOutput> {
        Ok(AdapterOutput {
            text: self.handler.transform_output(body)?,
            ..Default::default()
        })
    }

    fn prepare_stream_chunk(&self, _chunk: &[u8]) -> Result<StreamChunk> {
        Err(CatenaError::Configuration(
            "sagemaker endpoints do not support streaming".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ChatMessage;

    /// Plain-text container: the prompt is the body, the reply is the body.
    struct PlainText;

    impl ContentHandler for PlainText {
        fn content_type(&self) -> &str {
            "text/plain"
        }

        fn accept(&self) -> &str {
            "text/plain"
        }

        fn transform_input(&self, prompt: &str, _params: &ModelParams) -> Result<Vec<u8>> {
            Ok(prompt.as_bytes().to_vec())
        }

        fn transform_output(&self, body: &[u8]) -> Result<String> {
            String::from_utf8(body.to_vec()).map_err(|e| decode_error("sagemaker", e))
        }
    }

    #[test]
    fn test_json_handler_request_shape() {
        let params = ModelParams::new()
            .with_max_tokens(64)
            .with_stop(vec!["\n".into()])
            .with_extra("do_sample", json!(true));
        let bytes = SagemakerAdapter::default()
            .prepare_request(AdapterInput::Text("Hello"), &params)
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(
            body,
            json!({
                "inputs": "Hello",
                "parameters": {"max_new_tokens": 64, "stop": ["\n"], "do_sample": true}
            })
        );
    }

    #[test]
    fn test_json_handler_omits_empty_parameters() {
        let bytes = SagemakerAdapter::default()
            .prepare_request(AdapterInput::Text("Hello"), &ModelParams::new())
            .unwrap();
        assert_eq!(bytes, br#"{"inputs":"Hello"}"#);
    }

    #[test]
    fn test_json_handler_reads_generated_text() {
        let output = SagemakerAdapter::default()
            .prepare_response(br#"[{"generated_text": "Paris"}]"#)
            .unwrap();
        assert_eq!(output.text, "Paris");
    }

    #[test]
    fn test_json_handler_custom_pointer() {
        let adapter = SagemakerAdapter::new(Arc::new(
            JsonContentHandler::new().with_output_pointer("/outputs/0"),
        ));
        let output = adapter
            .prepare_response(br#"{"outputs": ["Lyon"]}"#)
            .unwrap();
        assert_eq!(output.text, "Lyon");
    }

    #[test]
    fn test_malformed_response_is_decode_error() {
        let adapter = SagemakerAdapter::default();
        assert!(matches!(
            adapter.prepare_response(b"not json"),
            Err(CatenaError::Decode(_))
        ));
        assert!(matches!(
            adapter.prepare_response(br#"[{"text": "Paris"}]"#),
            Err(CatenaError::Decode(_))
        ));
    }

    #[test]
    fn test_caller_supplied_handler() {
        let adapter = SagemakerAdapter::new(Arc::new(PlainText));
        assert_eq!(adapter.handler().content_type(), "text/plain");

        let messages = [ChatMessage::human("Hi")];
        let body = adapter
            .prepare_request(AdapterInput::Messages(&messages), &ModelParams::new())
            .unwrap();
        assert_eq!(body, b"Human: Hi");

        let output = adapter.prepare_response(b"Hello there").unwrap();
        assert_eq!(output.text, "Hello there");
    }

    #[test]
    fn test_streaming_is_configuration_error() {
        let err = SagemakerAdapter::default()
            .prepare_stream_chunk(b"{}")
            .unwrap_err();
        assert!(matches!(err, CatenaError::Configuration(_)));
    }
}
