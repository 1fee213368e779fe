//! Ask the model for bash commands, then run them

use async_trait::async_trait;
use std::sync::Arc;

use super::{Chain, LlmChain, predict};
use crate::context::RunContext;
use crate::error::Result;
use crate::model::LanguageModel;
use crate::parsing::{BashOutputParser, OutputParser};
use crate::prompt::PromptTemplate;
use crate::schema::ChainValues;
use crate::tools::BashProcess;

const DEFAULT_BASH_TEMPLATE: &str = r##"If someone asks you to perform a task, your job is to come up with a series of bash commands that will perform the task. There is no need to put "#!/bin/bash" in your answer. Make sure to reason step by step, using this format:

Question: "copy the files in the directory named 'target' into a new directory at the same level as target called 'myNewDirectory'"

I need to take the following actions:
- List all files in the directory
- Create a new directory
- Copy the files from the first directory into the second directory
```bash
ls
mkdir myNewDirectory
cp -r target/* myNewDirectory
```

That is the format. Begin!

Question: {{question}}"##;

/// Turns a task description into bash commands with a model and executes
/// them. The answer is the combined shell output.
pub struct LlmBashChain {
    llm_chain: LlmChain,
    parser: BashOutputParser,
    process: BashProcess,
    output_key: String,
    verbose: bool,
}

impl LlmBashChain {
    pub fn new(llm_chain: LlmChain) -> Self {
        Self {
            llm_chain,
            parser: BashOutputParser::new(),
            process: BashProcess::new(),
            output_key: "answer".to_string(),
            verbose: false,
        }
    }

    /// Build with the default step-by-step prompt (input key `question`).
    pub fn from_model(model: Arc<dyn LanguageModel>) -> Result<Self> {
        let prompt = PromptTemplate::new(DEFAULT_BASH_TEMPLATE)?;
        Ok(Self::new(LlmChain::new(model, prompt)))
    }

    pub fn with_process(mut self, process: BashProcess) -> Self {
        self.process = process;
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[async_trait]
impl Chain for LlmBashChain {
    fn chain_type(&self) -> &str {
        "llm_bash"
    }

    fn input_keys(&self) -> Vec<String> {
        self.llm_chain.input_keys()
    }

    fn output_keys(&self) -> Vec<String> {
        vec![self.output_key.clone()]
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    async fn call_inner(&self, inputs: ChainValues, ctx: &RunContext) -> Result<ChainValues> {
        let text = predict(&self.llm_chain, inputs, ctx).await?;
        let commands = self.parser.parse(&text)?;
        tracing::debug!(commands = ?commands, "Executing generated commands");

        let output = self.process.run(&commands, ctx).await?;
        Ok(ChainValues::new().with(self.output_key.clone(), output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::run;
    use crate::error::CatenaError;
    use crate::model::FakeModel;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_generated_commands_are_executed() {
        let model = Arc::new(FakeModel::new([
            "I need to print a greeting.\n```bash\necho 'Hello World'\necho again\n```",
        ]));
        let chain = LlmBashChain::from_model(model.clone()).unwrap();

        let answer = run(
            &chain,
            "Please write a bash script that prints 'Hello World' to the console.",
            &RunContext::new(),
        )
        .await
        .unwrap();

        assert_eq!(answer, "Hello World\nagain\n");
        assert!(model.prompts()[0].to_text().ends_with(
            "Question: Please write a bash script that prints 'Hello World' to the console."
        ));
    }

    #[test]
    fn test_default_prompt_keeps_shebang_hint_and_question() {
        let chain = LlmBashChain::from_model(Arc::new(FakeModel::new(["x"]))).unwrap();
        assert_eq!(chain.input_keys(), vec!["question"]);

        assert!(DEFAULT_BASH_TEMPLATE.contains(r##"There is no need to put "#!/bin/bash" in your answer."##));
        assert!(DEFAULT_BASH_TEMPLATE.contains("```bash\nls\nmkdir myNewDirectory\n"));
        assert!(DEFAULT_BASH_TEMPLATE.ends_with("Begin!\n\nQuestion: {{question}}"));
    }

    #[tokio::test]
    async fn test_reply_without_commands_is_parse_error() {
        let chain =
            LlmBashChain::from_model(Arc::new(FakeModel::new(["I would rather not."]))).unwrap();

        let err = run(&chain, "rm everything", &RunContext::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CatenaError::UnableToParseOutput(_)));
    }
}
