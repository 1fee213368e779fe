//! Chat model

use async_trait::async_trait;
use std::sync::Arc;

use super::provider_model::{ModelOptions, ProviderModel};
use super::{GenerateOptions, LanguageModel, observe};
use crate::context::RunContext;
use crate::error::Result;
use crate::prompt::PromptValue;
use crate::provider::{AdapterInput, ProviderAdapter, ProviderClient};
use crate::schema::ModelResult;
use crate::tokenizer::Tokenizer;

/// Chat model: prompts are sent as ordered messages and every generation
/// carries the AI reply as a message
pub struct ChatModel {
    inner: ProviderModel,
    model_type: String,
}

impl ChatModel {
    pub fn new(
        adapter: Box<dyn ProviderAdapter>,
        client: Arc<dyn ProviderClient>,
        options: ModelOptions,
    ) -> Self {
        let model_type = format!("chat:{}", adapter.name());
        Self {
            inner: ProviderModel::new(adapter, client, options),
            model_type,
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.inner.set_tokenizer(tokenizer);
        self
    }

    pub fn options(&self) -> &ModelOptions {
        self.inner.options()
    }
}

#[async_trait]
impl LanguageModel for ChatModel {
    fn model_type(&self) -> &str {
        &self.model_type
    }

    fn verbose(&self) -> bool {
        self.inner.options().verbose
    }

    async fn generate(
        &self,
        prompt: &PromptValue,
        options: &GenerateOptions,
        ctx: &RunContext,
    ) -> Result<ModelResult> {
        let ctx = ctx.for_component(self.verbose());
        let messages = prompt.to_messages();

        observe(
            &self.model_type,
            prompt,
            &ctx,
            self.inner
                .invoke(AdapterInput::Messages(&messages), options, &ctx, true),
        )
        .await
    }

    fn count_tokens(&self, text: &str) -> Result<usize> {
        self.inner.tokenizer().count_tokens(text)
    }
}

impl std::fmt::Debug for ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModel")
            .field("adapter", &self.inner.adapter_name())
            .field("options", self.inner.options())
            .finish()
    }
}
