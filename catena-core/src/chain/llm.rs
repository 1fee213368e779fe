//! Prompt → model chain

use async_trait::async_trait;
use std::sync::Arc;

use super::Chain;
use crate::context::RunContext;
use crate::error::Result;
use crate::memory::Memory;
use crate::model::{GenerateOptions, LanguageModel};
use crate::parsing::OutputParser;
use crate::prompt::BasePromptTemplate;
use crate::schema::{ChainValues, Value};

/// Formats a prompt, calls the model and returns the trimmed first
/// generation under `output_key` (default `text`).
pub struct LlmChain {
    model: Arc<dyn LanguageModel>,
    prompt: Arc<dyn BasePromptTemplate>,
    output_key: String,
    output_parser: Option<Arc<dyn OutputParser<Output = Value>>>,
    memory: Option<Arc<dyn Memory>>,
    options: GenerateOptions,
    verbose: bool,
}

impl LlmChain {
    pub fn new(model: Arc<dyn LanguageModel>, prompt: impl BasePromptTemplate + 'static) -> Self {
        Self::with_shared_prompt(model, Arc::new(prompt))
    }

    pub fn with_shared_prompt(
        model: Arc<dyn LanguageModel>,
        prompt: Arc<dyn BasePromptTemplate>,
    ) -> Self {
        Self {
            model,
            prompt,
            output_key: "text".to_string(),
            output_parser: None,
            memory: None,
            options: GenerateOptions::default(),
            verbose: false,
        }
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    /// Post-process the generated text into a typed value
    pub fn with_output_parser(mut self, parser: Arc<dyn OutputParser<Output = Value>>) -> Self {
        self.output_parser = Some(parser);
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Per-call model overrides (stop sequences, sampling)
    pub fn with_generate_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn prompt(&self) -> &dyn BasePromptTemplate {
        self.prompt.as_ref()
    }

    pub fn model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    pub fn output_key(&self) -> &str {
        &self.output_key
    }
}

#[async_trait]
impl Chain for LlmChain {
    fn chain_type(&self) -> &str {
        "llm"
    }

    fn input_keys(&self) -> Vec<String> {
        self.prompt.input_variables()
    }

    fn output_keys(&self) -> Vec<String> {
        vec![self.output_key.clone()]
    }

    fn memory(&self) -> Option<Arc<dyn Memory>> {
        self.memory.clone()
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    async fn call_inner(&self, inputs: ChainValues, ctx: &RunContext) -> Result<ChainValues> {
        let prompt = self.prompt.format_prompt(&inputs)?;
        let result = self.model.generate(&prompt, &self.options, ctx).await?;

        let text = result.first_text().unwrap_or_default().trim();
        let value = match &self.output_parser {
            Some(parser) => parser.parse(text)?,
            None => Value::from(text),
        };

        Ok(ChainValues::new().with(self.output_key.clone(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{call, predict};
    use crate::error::CatenaError;
    use crate::memory::{ConversationBufferMemory, SimpleMemory};
    use crate::model::FakeModel;
    use crate::parsing::GradeOutputParser;
    use crate::prompt::{ChatPromptTemplate, PromptTemplate, PromptValue};

    #[tokio::test]
    async fn test_llm_chain_renders_and_trims() {
        let model = Arc::new(FakeModel::new(["  Paris \n"]));
        let chain = LlmChain::new(
            model.clone(),
            PromptTemplate::new("Capital of {{country}}?").unwrap(),
        );

        assert_eq!(chain.input_keys(), vec!["country"]);
        assert_eq!(chain.output_keys(), vec!["text"]);

        let outputs = call(
            &chain,
            ChainValues::from([("country", "France"), ("unused", "x")]),
            &RunContext::new(),
        )
        .await
        .unwrap();

        assert_eq!(outputs.get_string("text").unwrap(), "Paris");
        assert_eq!(
            model.prompts(),
            vec![PromptValue::Text("Capital of France?".into())]
        );
    }

    #[tokio::test]
    async fn test_missing_variable_never_reaches_model() {
        let model = Arc::new(FakeModel::new(["x"]));
        let chain = LlmChain::new(model.clone(), PromptTemplate::new("{{query}}").unwrap());

        let err = call(&chain, ChainValues::new(), &RunContext::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CatenaError::InvalidInputValues(_)));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_memory_precedence_in_rendered_prompt() {
        let model = Arc::new(FakeModel::new(["ok"]));
        let chain = LlmChain::new(model.clone(), PromptTemplate::new("Hi {{name}}").unwrap())
            .with_memory(Arc::new(SimpleMemory::new().with_memory("name", "stored")));

        call(
            &chain,
            ChainValues::from([("name", "caller")]),
            &RunContext::new(),
        )
        .await
        .unwrap();

        assert_eq!(model.prompts()[0].to_text(), "Hi stored");
    }

    #[tokio::test]
    async fn test_conversation_memory_across_calls() {
        let model = Arc::new(FakeModel::new(["Hello Ada!", "You are Ada."]));
        let memory = Arc::new(ConversationBufferMemory::new());
        let chain = LlmChain::new(
            model.clone(),
            PromptTemplate::new("{{history}}\nHuman: {{input}}\nAI:").unwrap(),
        )
        .with_memory(memory.clone());
        let ctx = RunContext::new();

        predict(&chain, ChainValues::from([("input", "I am Ada")]), &ctx)
            .await
            .unwrap();
        let answer = predict(&chain, ChainValues::from([("input", "Who am I?")]), &ctx)
            .await
            .unwrap();

        assert_eq!(answer, "You are Ada.");
        assert_eq!(
            model.prompts()[1].to_text(),
            "Human: I am Ada\nAI: Hello Ada!\nHuman: Who am I?\nAI:"
        );
        assert_eq!(memory.messages().await.len(), 4);
    }

    #[tokio::test]
    async fn test_output_parser_applied() {
        let model = Arc::new(FakeModel::new(["GRADE: incorrect"]));
        let chain = LlmChain::new(model, PromptTemplate::new("{{q}}").unwrap())
            .with_output_parser(Arc::new(GradeOutputParser::new()));

        let outputs = call(&chain, ChainValues::from([("q", "x")]), &RunContext::new())
            .await
            .unwrap();

        assert_eq!(outputs.get_string("text").unwrap(), "INCORRECT");
    }

    #[tokio::test]
    async fn test_chat_prompt_reaches_model_as_messages() {
        let model = Arc::new(FakeModel::new(["fine"]));
        let prompt = ChatPromptTemplate::new()
            .system("You are {{persona}}.")
            .unwrap()
            .human("{{question}}")
            .unwrap();
        let chain = LlmChain::new(model.clone(), prompt).with_output_key("reply");

        let reply = predict(
            &chain,
            ChainValues::from([("persona", "terse"), ("question", "How are you?")]),
            &RunContext::new(),
        )
        .await
        .unwrap();

        assert_eq!(reply, "fine");
        assert_eq!(
            model.prompts()[0].to_messages().len(),
            2
        );
    }
}
