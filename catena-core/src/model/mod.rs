//! Model facade
//!
//! [`LanguageModel`] is the single capability every chain and agent talks to.
//! Provider-backed models ([`Llm`], [`ChatModel`]) pair a
//! [`ProviderAdapter`](crate::provider::ProviderAdapter) with a
//! [`ProviderClient`](crate::provider::ProviderClient); [`FakeModel`] replays
//! scripted responses.

mod chat;
mod factory;
mod fake;
mod llm;
mod provider_model;

pub use chat::ChatModel;
pub use factory::ModelFactory;
pub use fake::FakeModel;
pub use llm::Llm;
pub use provider_model::ModelOptions;

use async_trait::async_trait;
use std::future::Future;

use crate::context::RunContext;
use crate::error::Result;
use crate::prompt::PromptValue;
use crate::provider::ModelParams;
use crate::schema::ModelResult;

/// Per-call overrides of a model's configured parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    pub stop: Option<Vec<String>>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    pub top_p: Option<f32>,
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
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

    /// `base` with every set override applied.
    pub fn apply(&self, base: &ModelParams) -> ModelParams {
        let mut params = base.clone();
        if let Some(stop) = &self.stop {
            params.stop = stop.clone();
        }
        if let Some(t) = self.temperature {
            params.temperature = Some(t);
        }
        if let Some(max) = self.max_tokens {
            params.max_tokens = Some(max);
        }
        if let Some(p) = self.top_p {
            params.top_p = Some(p);
        }
        params
    }
}

/// Uniform generation capability shared by completion and chat models
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier used in logs and observer events
    fn model_type(&self) -> &str;

    fn verbose(&self) -> bool {
        false
    }

    async fn generate(
        &self,
        prompt: &PromptValue,
        options: &GenerateOptions,
        ctx: &RunContext,
    ) -> Result<ModelResult>;

    fn count_tokens(&self, text: &str) -> Result<usize>;
}

/// Generate a completion for a plain text prompt and return its text.
pub async fn predict(
    model: &dyn LanguageModel,
    prompt: &str,
    ctx: &RunContext,
) -> Result<String> {
    let result = model
        .generate(&PromptValue::from(prompt), &GenerateOptions::default(), ctx)
        .await?;
    Ok(result.first_text().unwrap_or_default().to_string())
}

/// Fire model observers around one generation.
///
/// `on_model_start` runs before `fut` is polled; the outcome is reported
/// through `on_model_end` or `on_model_error` and then returned unchanged.
pub(crate) async fn observe<F>(
    model_type: &str,
    prompt: &PromptValue,
    ctx: &RunContext,
    fut: F,
) -> Result<ModelResult>
where
    F: Future<Output = Result<ModelResult>>,
{
    ctx.callbacks()
        .model_start(model_type, &prompt.to_text())
        .await?;

    match fut.await {
        Ok(result) => {
            ctx.callbacks().model_end(model_type, &result).await?;
            Ok(result)
        }
        Err(e) => {
            ctx.callbacks().model_error(model_type, &e).await?;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_options_override_configured_params() {
        let base = ModelParams::new()
            .with_model("gpt-4o")
            .with_temperature(0.7)
            .with_stop(vec!["\n".into()]);

        let params = GenerateOptions::new()
            .with_stop(vec!["Observation:".into()])
            .with_max_tokens(64)
            .apply(&base);

        assert_eq!(params.model.as_deref(), Some("gpt-4o"));
        assert_eq!(params.temperature, Some(0.7));
        assert_eq!(params.stop, vec!["Observation:".to_string()]);
        assert_eq!(params.max_tokens, Some(64));
    }

    #[test]
    fn test_empty_options_leave_params_untouched() {
        let base = ModelParams::new().with_top_p(0.9);
        assert_eq!(GenerateOptions::default().apply(&base), base);
    }
}
