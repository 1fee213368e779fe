//! Agents: a model decides which tool to call next
//!
//! An [`Agent`] looks at the steps taken so far and returns either more
//! actions or a final answer. The [`AgentExecutor`] drives that loop,
//! invokes tools, and records each observation as an [`AgentStep`].
//!
//! # Example
//!
//! ```rust,ignore
//! use catena_core::agent::{AgentExecutor, ZeroShotReactAgent};
//! use catena_core::tools::{BashTool, ToolRegistry};
//!
//! let tools = ToolRegistry::from_tools([Arc::new(BashTool::new()) as Arc<dyn Tool>])?;
//! let agent = ZeroShotReactAgent::new(model, &tools)?;
//! let executor = AgentExecutor::new(Arc::new(agent), tools);
//! let answer = chain::run(&executor, "How many files are in /tmp?", &ctx).await?;
//! ```

mod executor;
mod mrkl;

pub use executor::{AgentExecutor, AgentExecutorConfig, AgentRun, AgentRunFailure};
pub use mrkl::{MrklPromptOptions, ZeroShotReactAgent};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::RunContext;
use crate::error::Result;
use crate::schema::ChainValues;

/// A tool call chosen by the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    pub tool: String,
    pub tool_input: String,
    /// Raw model text the action was parsed from
    pub log: String,
}

/// The agent's final answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFinish {
    pub return_values: ChainValues,
    pub log: String,
}

/// One completed action and what the tool returned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStep {
    pub action: AgentAction,
    pub observation: String,
}

/// Outcome of one planning step
#[derive(Debug, Clone, PartialEq)]
pub enum AgentDecision {
    Actions(Vec<AgentAction>),
    Finish(AgentFinish),
}

/// Decides the next move given the history so far
#[async_trait]
pub trait Agent: Send + Sync {
    async fn plan(
        &self,
        steps: &[AgentStep],
        inputs: &ChainValues,
        ctx: &RunContext,
    ) -> Result<AgentDecision>;

    fn input_keys(&self) -> Vec<String>;

    fn output_keys(&self) -> Vec<String>;
}
