//! Provider transport
//!
//! [`ProviderClient`] moves request/response bytes; it knows nothing about
//! payload shapes. [`HttpClient`] is the reqwest implementation used for
//! OpenAI-compatible endpoints and any JSON-over-HTTP gateway.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;

use crate::error::{CatenaError, Result};

/// Lazily consumed sequence of raw stream payloads
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Transport for one provider endpoint
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn invoke(&self, request: Vec<u8>) -> Result<Vec<u8>>;

    async fn invoke_streaming(&self, request: Vec<u8>) -> Result<ChunkStream>;
}

/// JSON-over-HTTP client
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    endpoint: String,
    stream_endpoint: Option<String>,
    api_key: Option<String>,
    headers: Vec<(String, String)>,
}

impl HttpClient {
    /// Create a client posting to `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            stream_endpoint: None,
            api_key: None,
            headers: Vec::new(),
        }
    }

    /// Build with a request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatenaError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(self)
    }

    /// Send the key as a bearer token.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Separate endpoint for streamed invocations (defaults to the main one)
    pub fn with_stream_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.stream_endpoint = Some(endpoint.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, url: &str, body: Vec<u8>) -> Result<reqwest::Response> {
        let mut request = self.client.post(url).body(body);
        if !self
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        {
            request = request.header("Content-Type", "application/json");
        }

        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| CatenaError::Provider(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CatenaError::ProviderStatus { status, body });
        }

        Ok(response)
    }
}

/// Extract the payload of one streamed line.
///
/// SSE `data:` lines yield their payload, `[DONE]` and SSE control lines
/// yield nothing, and bare JSON lines (newline-delimited streams) pass
/// through unchanged.
pub(crate) fn stream_payload(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    if let Some(data) = line.strip_prefix("data:") {
        let data = data.trim_start();
        if data == "[DONE]" || data.is_empty() {
            return None;
        }
        return Some(data);
    }
    if line.starts_with("event:") || line.starts_with("id:") || line.starts_with("retry:") {
        return None;
    }
    Some(line)
}

#[async_trait]
impl ProviderClient for HttpClient {
    async fn invoke(&self, request: Vec<u8>) -> Result<Vec<u8>> {
        let response = self.post(&self.endpoint, request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CatenaError::Provider(format!("Failed to read response: {}", e)))?;
        Ok(bytes.to_vec())
    }

    async fn invoke_streaming(&self, request: Vec<u8>) -> Result<ChunkStream> {
        let url = self.stream_endpoint.as_deref().unwrap_or(&self.endpoint);
        let response = self.post(url, request).await?;

        let bytes_stream = response.bytes_stream();
        let reader = tokio_util::io::StreamReader::new(
            bytes_stream.map(|r| r.map_err(std::io::Error::other)),
        );
        let lines = LinesStream::new(tokio::io::BufReader::new(reader).lines());

        let stream = lines.filter_map(|line_result| match line_result {
            Ok(line) => stream_payload(&line).map(|data| Ok(data.as_bytes().to_vec())),
            Err(e) => Some(Err(CatenaError::Provider(format!(
                "Stream read error: {}",
                e
            )))),
        });

        Ok(Box::pin(stream))
    }
}
