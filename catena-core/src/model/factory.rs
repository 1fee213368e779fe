//! Factory for creating models from configuration

use std::sync::Arc;

use super::provider_model::ModelOptions;
use super::{ChatModel, FakeModel, LanguageModel, Llm};
use crate::config::{HttpConfig, ModelConfig, ModelKind, ProviderKind};
use crate::error::{CatenaError, Result};
use crate::provider::{
    BedrockAdapter, CohereAdapter, ContentHandler, HttpClient, JsonContentHandler, ModelParams,
    OpenAiAdapter, ProviderAdapter, ProviderClient, RetryingClient, SagemakerAdapter,
};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const COHERE_BASE_URL: &str = "https://api.cohere.ai/v1";
const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Factory for creating language models
pub struct ModelFactory;

impl ModelFactory {
    /// Create a model with default HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete (e.g., missing API key)
    pub fn create(config: &ModelConfig) -> Result<Arc<dyn LanguageModel>> {
        Self::create_with_http(config, &HttpConfig::default(), false)
    }

    /// Create a model using explicit transport settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete or names an
    /// unsupported combination.
    pub fn create_with_http(
        config: &ModelConfig,
        http: &HttpConfig,
        verbose: bool,
    ) -> Result<Arc<dyn LanguageModel>> {
        match config.provider {
            ProviderKind::Fake => {
                if config.fake_responses.is_empty() {
                    return Err(CatenaError::Configuration(
                        "fake provider requires at least one response".to_string(),
                    ));
                }
                Ok(Arc::new(
                    FakeModel::new(config.fake_responses.clone())
                        .with_stream(config.stream)
                        .with_verbose(verbose),
                ))
            }

            ProviderKind::OpenAI => {
                let api_key = config
                    .api_key
                    .clone()
                    .or_else(|| std::env::var("OPENAI_API_KEY").ok());
                let base_url = config.base_url.as_deref().unwrap_or(OPENAI_BASE_URL);

                // Self-hosted compatible servers often run without a key.
                if api_key.is_none() && config.base_url.is_none() {
                    return Err(CatenaError::Configuration(
                        "OpenAI provider requires model.api_key or OPENAI_API_KEY".to_string(),
                    ));
                }

                let mut client = HttpClient::new(format!(
                    "{}/chat/completions",
                    base_url.trim_end_matches('/')
                ))
                .with_timeout(http.timeout)?;
                if let Some(key) = api_key {
                    client = client.with_api_key(key);
                }

                Ok(Self::build(
                    config,
                    Box::new(OpenAiAdapter::new()),
                    Self::with_retry(client, http),
                    config.params(),
                    verbose,
                ))
            }

            ProviderKind::Bedrock => {
                if config.stream {
                    return Err(CatenaError::Configuration(
                        "Bedrock streaming uses AWS event-stream framing, which the HTTP client does not decode; set model.stream = false".to_string(),
                    ));
                }

                let adapter = BedrockAdapter::from_model_id(&config.model)?;
                let base_url = match &config.base_url {
                    Some(url) => url.trim_end_matches('/').to_string(),
                    None => format!("https://bedrock-runtime.{}.amazonaws.com", aws_region(config)),
                };

                let mut client =
                    HttpClient::new(format!("{}/model/{}/invoke", base_url, config.model))
                        .with_timeout(http.timeout)?
                        .with_header("Accept", "application/json");
                if let Some(key) = config
                    .api_key
                    .clone()
                    .or_else(|| std::env::var("AWS_BEARER_TOKEN_BEDROCK").ok())
                {
                    client = client.with_api_key(key);
                }

                // The model id travels in the URL, not the body.
                let mut params = config.params();
                params.model = None;

                Ok(Self::build(
                    config,
                    Box::new(adapter),
                    Self::with_retry(client, http),
                    params,
                    verbose,
                ))
            }

            ProviderKind::Cohere => {
                let api_key = config
                    .api_key
                    .clone()
                    .or_else(|| std::env::var("COHERE_API_KEY").ok())
                    .ok_or_else(|| {
                        CatenaError::Configuration(
                            "Cohere provider requires model.api_key or COHERE_API_KEY".to_string(),
                        )
                    })?;
                let base_url = config.base_url.as_deref().unwrap_or(COHERE_BASE_URL);

                let client =
                    HttpClient::new(format!("{}/generate", base_url.trim_end_matches('/')))
                        .with_timeout(http.timeout)?
                        .with_header("Accept", "application/json")
                        .with_api_key(api_key);

                Ok(Self::build(
                    config,
                    Box::new(CohereAdapter::new()),
                    Self::with_retry(client, http),
                    config.params(),
                    verbose,
                ))
            }

            ProviderKind::Sagemaker => Self::create_sagemaker(
                config,
                http,
                Arc::new(JsonContentHandler::default()),
                verbose,
            ),
        }
    }

    /// Create a model backed by a SageMaker endpoint whose body format is
    /// defined by `handler`.
    ///
    /// The endpoint is named by `config.model`. Requests are not SigV4-signed,
    /// so `config.base_url` usually points at a signing gateway; a configured
    /// key is sent as a bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if streaming is requested or the HTTP client cannot
    /// be built.
    pub fn create_sagemaker(
        config: &ModelConfig,
        http: &HttpConfig,
        handler: Arc<dyn ContentHandler>,
        verbose: bool,
    ) -> Result<Arc<dyn LanguageModel>> {
        if config.stream {
            return Err(CatenaError::Configuration(
                "SageMaker endpoints are invoked without streaming; set model.stream = false"
                    .to_string(),
            ));
        }

        let base_url = match &config.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://runtime.sagemaker.{}.amazonaws.com", aws_region(config)),
        };

        let mut client = HttpClient::new(format!(
            "{}/endpoints/{}/invocations",
            base_url, config.model
        ))
        .with_timeout(http.timeout)?
        .with_header("Content-Type", handler.content_type())
        .with_header("Accept", handler.accept());
        if let Some(key) = &config.api_key {
            client = client.with_api_key(key.clone());
        }

        // The endpoint is addressed by URL; handlers see only inference parameters.
        let mut params = config.params();
        params.model = None;

        Ok(Self::build(
            config,
            Box::new(SagemakerAdapter::new(handler)),
            Self::with_retry(client, http),
            params,
            verbose,
        ))
    }

    fn with_retry(client: HttpClient, http: &HttpConfig) -> Arc<dyn ProviderClient> {
        if http.retry.max_attempts > 1 {
            Arc::new(RetryingClient::new(Arc::new(client), http.retry.clone()))
        } else {
            Arc::new(client)
        }
    }

    fn build(
        config: &ModelConfig,
        adapter: Box<dyn ProviderAdapter>,
        client: Arc<dyn ProviderClient>,
        params: ModelParams,
        verbose: bool,
    ) -> Arc<dyn LanguageModel> {
        tracing::debug!(
            provider = ?config.provider,
            kind = ?config.kind,
            model = %config.model,
            "Creating model"
        );

        let options = ModelOptions::new(params)
            .with_stream(config.stream)
            .with_verbose(verbose);

        match config.kind {
            ModelKind::Chat => Arc::new(ChatModel::new(adapter, client, options)),
            ModelKind::Completion => Arc::new(Llm::new(adapter, client, options)),
        }
    }
}

fn aws_region(config: &ModelConfig) -> String {
    config
        .region
        .clone()
        .or_else(|| std::env::var("AWS_REGION").ok())
        .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string())
}
