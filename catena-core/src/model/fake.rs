//! Scripted model for tests and offline runs

use async_trait::async_trait;
use std::sync::Mutex;

use super::{GenerateOptions, LanguageModel, observe};
use crate::context::RunContext;
use crate::error::{CatenaError, Result};
use crate::prompt::PromptValue;
use crate::schema::{Generation, ModelResult, TokenUsage};
use crate::tokenizer::{SimpleTokenizer, Tokenizer};

/// Model that answers from a script.
///
/// Responses are returned in order; once the script runs out the last one
/// repeats. Every prompt is recorded so tests can assert on what a chain
/// actually sent.
pub struct FakeModel {
    responses: Vec<String>,
    calls: Mutex<usize>,
    prompts: Mutex<Vec<PromptValue>>,
    stream: bool,
    fail_after: Option<usize>,
    verbose: bool,
    tokenizer: SimpleTokenizer,
}

impl FakeModel {
    pub fn new<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Self {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            calls: Mutex::new(0),
            prompts: Mutex::new(Vec::new()),
            stream: false,
            fail_after: None,
            verbose: false,
            tokenizer: SimpleTokenizer::new(),
        }
    }

    /// Emit each response one character at a time through `on_model_new_token`
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Fail every call after the first `calls` with a provider error
    pub fn with_fail_after(mut self, calls: usize) -> Self {
        self.fail_after = Some(calls);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Prompts received so far, in call order
    pub fn prompts(&self) -> Vec<PromptValue> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Number of `generate` calls so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| *c).unwrap_or_default()
    }

    fn next_response(&self, prompt: &PromptValue) -> Result<String> {
        let mut calls = self
            .calls
            .lock()
            .map_err(|e| CatenaError::Other(format!("fake model lock poisoned: {}", e)))?;
        let index = *calls;
        *calls += 1;

        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }

        if self.fail_after.is_some_and(|limit| index >= limit) {
            return Err(CatenaError::Provider(format!(
                "fake model scripted failure on call {}",
                index + 1
            )));
        }

        self.responses
            .get(index)
            .or_else(|| self.responses.last())
            .cloned()
            .ok_or_else(|| CatenaError::Configuration("fake model has no responses".to_string()))
    }

    async fn respond(&self, prompt: &PromptValue, ctx: &RunContext) -> Result<ModelResult> {
        ctx.check_cancelled()?;
        let text = self.next_response(prompt)?;

        if self.stream {
            let mut buf = [0u8; 4];
            for ch in text.chars() {
                ctx.check_cancelled()?;
                ctx.callbacks()
                    .model_new_token(ch.encode_utf8(&mut buf))
                    .await?;
            }
        }

        let usage = TokenUsage::new(
            self.tokenizer.count_tokens(&prompt.to_text())?,
            self.tokenizer.count_tokens(&text)?,
        );

        Ok(ModelResult {
            generations: vec![Generation::new(text)],
            usage,
            metadata: Default::default(),
        })
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    fn model_type(&self) -> &str {
        "fake"
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    async fn generate(
        &self,
        prompt: &PromptValue,
        _options: &GenerateOptions,
        ctx: &RunContext,
    ) -> Result<ModelResult> {
        let ctx = ctx.for_component(self.verbose);
        observe("fake", prompt, &ctx, self.respond(prompt, &ctx)).await
    }

    fn count_tokens(&self, text: &str) -> Result<usize> {
        self.tokenizer.count_tokens(text)
    }
}

impl std::fmt::Debug for FakeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeModel")
            .field("responses", &self.responses.len())
            .field("calls", &self.call_count())
            .finish()
    }
}
