//! Zero-shot ReAct (MRKL) agent

use async_trait::async_trait;
use std::sync::Arc;

use super::{Agent, AgentDecision, AgentStep};
use crate::chain::{Chain, LlmChain, predict};
use crate::context::RunContext;
use crate::error::Result;
use crate::model::{GenerateOptions, LanguageModel};
use crate::parsing::{MrklOutputParser, OutputParser};
use crate::prompt::PromptTemplate;
use crate::schema::ChainValues;
use crate::tools::ToolRegistry;

const SCRATCHPAD_KEY: &str = "agentScratchpad";

const DEFAULT_PREFIX: &str = "Answer the following questions as best you can. You have access to the following tools:
{{toolDescriptions}}";

const DEFAULT_INSTRUCTIONS: &str = "Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{{toolNames}}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question";

const DEFAULT_SUFFIX: &str = "Begin!

Question: {{input}}
Thought: {{agentScratchpad}}";

/// Prompt pieces and output naming for [`ZeroShotReactAgent`]
#[derive(Debug, Clone)]
pub struct MrklPromptOptions {
    pub prefix: String,
    pub instructions: String,
    pub suffix: String,
    pub output_key: String,
    /// Stop sequences sent with every planning call
    pub stop: Vec<String>,
}

impl Default for MrklPromptOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            suffix: DEFAULT_SUFFIX.to_string(),
            output_key: "output".to_string(),
            stop: vec!["\nObservation:".to_string()],
        }
    }
}

impl MrklPromptOptions {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }
}

/// Agent that picks tools from their descriptions alone.
///
/// Each planning step renders the prompt with the scratchpad of prior steps,
/// asks the model once, and parses the reply with [`MrklOutputParser`].
pub struct ZeroShotReactAgent {
    llm_chain: LlmChain,
    parser: MrklOutputParser,
}

impl ZeroShotReactAgent {
    pub fn new(model: Arc<dyn LanguageModel>, tools: &ToolRegistry) -> Result<Self> {
        Self::with_options(model, tools, MrklPromptOptions::default())
    }

    pub fn with_options(
        model: Arc<dyn LanguageModel>,
        tools: &ToolRegistry,
        options: MrklPromptOptions,
    ) -> Result<Self> {
        let prompt = Self::create_prompt(tools, &options)?;
        let llm_chain = LlmChain::new(model, prompt)
            .with_generate_options(GenerateOptions::new().with_stop(options.stop));

        Ok(Self {
            llm_chain,
            parser: MrklOutputParser::new(options.output_key),
        })
    }

    /// Prefix, instructions and suffix joined by blank lines, with the tool
    /// list bound as partials.
    pub fn create_prompt(
        tools: &ToolRegistry,
        options: &MrklPromptOptions,
    ) -> Result<PromptTemplate> {
        let template = [
            options.prefix.as_str(),
            options.instructions.as_str(),
            options.suffix.as_str(),
        ]
        .join("\n\n");

        Ok(PromptTemplate::new(template)?
            .with_partial("toolNames", tools.names())
            .with_partial("toolDescriptions", tools.descriptions()))
    }

    /// Replays prior steps so the model can continue its reasoning.
    pub fn construct_scratchpad(steps: &[AgentStep]) -> String {
        steps
            .iter()
            .map(|step| {
                format!(
                    "{}\nObservation: {}\nThought:",
                    step.action.log, step.observation
                )
            })
            .collect()
    }
}

#[async_trait]
impl Agent for ZeroShotReactAgent {
    async fn plan(
        &self,
        steps: &[AgentStep],
        inputs: &ChainValues,
        ctx: &RunContext,
    ) -> Result<AgentDecision> {
        let mut full = inputs.clone();
        full.insert(SCRATCHPAD_KEY, Self::construct_scratchpad(steps));

        let text = predict(&self.llm_chain, full, ctx).await?;
        tracing::debug!(steps = steps.len(), "Agent planned next step");
        self.parser.parse(&text)
    }

    fn input_keys(&self) -> Vec<String> {
        self.llm_chain
            .input_keys()
            .into_iter()
            .filter(|k| k != SCRATCHPAD_KEY)
            .collect()
    }

    fn output_keys(&self) -> Vec<String> {
        vec![self.parser.output_key().to_string()]
    }
}
