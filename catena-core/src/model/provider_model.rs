use std::sync::Arc;

use super::GenerateOptions;
use crate::context::RunContext;
use crate::error::Result;
use crate::provider::{
    AdapterInput, AdapterOutput, ModelParams, ProviderAdapter, ProviderClient, accumulate_stream,
};
use crate::schema::{Generation, ModelResult};
use crate::tokenizer::{SimpleTokenizer, Tokenizer};

/// Configuration shared by provider-backed models
#[derive(Debug, Clone, Default)]
pub struct ModelOptions {
    /// Parameters sent with every request unless overridden per call
    pub params: ModelParams,

    /// Stream the response token by token
    pub stream: bool,

    /// Attach the logging observer to every generation
    pub verbose: bool,
}

impl ModelOptions {
    pub fn new(params: ModelParams) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Adapter, transport and tokenizer behind [`Llm`](super::Llm) and
/// [`ChatModel`](super::ChatModel)
pub(crate) struct ProviderModel {
    adapter: Box<dyn ProviderAdapter>,
    client: Arc<dyn ProviderClient>,
    tokenizer: Arc<dyn Tokenizer>,
    options: ModelOptions,
}

impl ProviderModel {
    pub(crate) fn new(
        adapter: Box<dyn ProviderAdapter>,
        client: Arc<dyn ProviderClient>,
        options: ModelOptions,
    ) -> Self {
        Self {
            adapter,
            client,
            tokenizer: Arc::new(SimpleTokenizer::new()),
            options,
        }
    }

    pub(crate) fn set_tokenizer(&mut self, tokenizer: Arc<dyn Tokenizer>) {
        self.tokenizer = tokenizer;
    }

    pub(crate) fn adapter_name(&self) -> &str {
        self.adapter.name()
    }

    pub(crate) fn options(&self) -> &ModelOptions {
        &self.options
    }

    pub(crate) fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    /// One round trip through adapter and client.
    ///
    /// `chat` selects whether the generation carries an AI message.
    pub(crate) async fn invoke(
        &self,
        input: AdapterInput<'_>,
        options: &GenerateOptions,
        ctx: &RunContext,
        chat: bool,
    ) -> Result<ModelResult> {
        let mut params = options.apply(&self.options.params);
        params.stream = params.stream || self.options.stream;

        let body = self.adapter.prepare_request(input, &params)?;

        let output = if params.stream {
            let stream = ctx.guard(self.client.invoke_streaming(body)).await?;
            let acc = accumulate_stream(self.adapter.as_ref(), stream, ctx).await?;
            AdapterOutput {
                text: acc.text,
                usage: acc.usage,
                finish_reason: acc.finish_reason,
            }
        } else {
            let bytes = ctx.guard(self.client.invoke(body)).await?;
            self.adapter.prepare_response(&bytes)?
        };

        tracing::debug!(
            adapter = self.adapter.name(),
            stream = params.stream,
            completion_tokens = output.usage.completion_tokens,
            "Provider call finished"
        );

        let generation = if chat {
            Generation::chat(output.text)
        } else {
            Generation::new(output.text)
        };

        let mut result = ModelResult {
            generations: vec![generation],
            usage: output.usage,
            metadata: Default::default(),
        };
        if let Some(reason) = output.finish_reason {
            result
                .metadata
                .insert("finish_reason".to_string(), serde_json::Value::String(reason));
        }
        if let Some(model) = &params.model {
            result
                .metadata
                .insert("model".to_string(), serde_json::Value::String(model.clone()));
        }
        Ok(result)
    }
}
