//! Agent loop
//!
//! Plan, act, observe, repeat until the agent finishes, an error occurs, or
//! the iteration cap is hit. Every step that completed before a failure is
//! handed back with the error.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Agent, AgentAction, AgentDecision, AgentStep};
use crate::chain::Chain;
use crate::config::AgentConfig;
use crate::context::RunContext;
use crate::error::{CatenaError, Result};
use crate::memory::Memory;
use crate::schema::{ChainValues, Value};
use crate::tools::ToolRegistry;

const INTERMEDIATE_STEPS_KEY: &str = "intermediateSteps";

/// Configuration for [`AgentExecutor`]
#[derive(Debug, Clone)]
pub struct AgentExecutorConfig {
    /// Maximum planning steps before giving up; `None` means no cap
    pub max_iterations: Option<usize>,
    /// Include the step history in the chain outputs
    pub return_intermediate_steps: bool,
    pub verbose: bool,
}

impl Default for AgentExecutorConfig {
    fn default() -> Self {
        Self {
            max_iterations: Some(15),
            return_intermediate_steps: false,
            verbose: false,
        }
    }
}

impl AgentExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: Option<usize>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_return_intermediate_steps(mut self, enabled: bool) -> Self {
        self.return_intermediate_steps = enabled;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl From<&AgentConfig> for AgentExecutorConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            max_iterations: (config.max_iterations > 0).then_some(config.max_iterations),
            return_intermediate_steps: config.return_intermediate_steps,
            verbose: false,
        }
    }
}

/// A finished agent run
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRun {
    pub return_values: ChainValues,
    pub steps: Vec<AgentStep>,
}

/// A failed agent run with the steps completed before the failure
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct AgentRunFailure {
    #[source]
    pub error: CatenaError,
    pub steps: Vec<AgentStep>,
}

/// Drives an [`Agent`] against a set of tools. Usable as a [`Chain`].
pub struct AgentExecutor {
    agent: Arc<dyn Agent>,
    tools: ToolRegistry,
    memory: Option<Arc<dyn Memory>>,
    config: AgentExecutorConfig,
}

impl AgentExecutor {
    pub fn new(agent: Arc<dyn Agent>, tools: ToolRegistry) -> Self {
        Self {
            agent,
            tools,
            memory: None,
            config: AgentExecutorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AgentExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn config(&self) -> &AgentExecutorConfig {
        &self.config
    }

    /// Run the loop directly, keeping the step history on both outcomes.
    pub async fn run_with_history(
        &self,
        inputs: &ChainValues,
        ctx: &RunContext,
    ) -> std::result::Result<AgentRun, AgentRunFailure> {
        let ctx = ctx.for_component(self.config.verbose);
        self.drive(inputs, &ctx).await
    }

    async fn drive(
        &self,
        inputs: &ChainValues,
        ctx: &RunContext,
    ) -> std::result::Result<AgentRun, AgentRunFailure> {
        let mut steps: Vec<AgentStep> = Vec::new();
        let mut iterations = 0usize;

        loop {
            if let Some(max) = self.config.max_iterations
                && iterations >= max
            {
                tracing::warn!(max_iterations = max, "Agent hit iteration cap");
                return Err(AgentRunFailure {
                    error: CatenaError::MaxIterations(max),
                    steps,
                });
            }
            iterations += 1;

            let decision = match self.plan(&steps, inputs, ctx).await {
                Ok(decision) => decision,
                Err(error) => return Err(AgentRunFailure { error, steps }),
            };

            match decision {
                AgentDecision::Finish(finish) => {
                    if let Err(error) = ctx.callbacks().agent_finish(&finish).await {
                        return Err(AgentRunFailure { error, steps });
                    }
                    tracing::debug!(iterations, steps = steps.len(), "Agent finished");
                    return Ok(AgentRun {
                        return_values: finish.return_values,
                        steps,
                    });
                }
                AgentDecision::Actions(actions) => {
                    for action in actions {
                        match self.take_action(&action, ctx).await {
                            Ok(observation) => steps.push(AgentStep {
                                action,
                                observation,
                            }),
                            Err(error) => return Err(AgentRunFailure { error, steps }),
                        }
                    }
                }
            }
        }
    }

    async fn plan(
        &self,
        steps: &[AgentStep],
        inputs: &ChainValues,
        ctx: &RunContext,
    ) -> Result<AgentDecision> {
        ctx.check_cancelled()?;
        self.agent.plan(steps, inputs, ctx).await
    }

    async fn take_action(&self, action: &AgentAction, ctx: &RunContext) -> Result<String> {
        ctx.callbacks().agent_action(action).await?;

        let Some(tool) = self.tools.get(&action.tool) else {
            tracing::debug!(tool = %action.tool, "Agent chose an unknown tool");
            return Ok(format!(
                "{} is not a valid tool, try another one.",
                action.tool
            ));
        };

        ctx.callbacks()
            .tool_start(tool.name(), &action.tool_input)
            .await?;
        let observation = ctx.guard(tool.invoke(&action.tool_input, ctx)).await?;
        ctx.callbacks().tool_end(tool.name(), &observation).await?;

        Ok(observation)
    }
}

fn step_value(step: &AgentStep) -> Value {
    let fields = BTreeMap::from([
        ("tool".to_string(), Value::from(step.action.tool.as_str())),
        (
            "toolInput".to_string(),
            Value::from(step.action.tool_input.as_str()),
        ),
        ("log".to_string(), Value::from(step.action.log.as_str())),
        (
            "observation".to_string(),
            Value::from(step.observation.as_str()),
        ),
    ]);
    Value::Map(fields)
}

#[async_trait]
impl Chain for AgentExecutor {
    fn chain_type(&self) -> &str {
        "agent_executor"
    }

    fn input_keys(&self) -> Vec<String> {
        self.agent.input_keys()
    }

    fn output_keys(&self) -> Vec<String> {
        let mut keys = self.agent.output_keys();
        if self.config.return_intermediate_steps {
            keys.push(INTERMEDIATE_STEPS_KEY.to_string());
        }
        keys
    }

    fn memory(&self) -> Option<Arc<dyn Memory>> {
        self.memory.clone()
    }

    fn verbose(&self) -> bool {
        self.config.verbose
    }

    async fn call_inner(&self, inputs: ChainValues, ctx: &RunContext) -> Result<ChainValues> {
        let run = self.drive(&inputs, ctx).await.map_err(|failure| {
            tracing::debug!(steps = failure.steps.len(), "Agent run failed");
            failure.error
        })?;

        let mut outputs = run.return_values;
        if self.config.return_intermediate_steps {
            outputs.insert(
                INTERMEDIATE_STEPS_KEY,
                Value::List(run.steps.iter().map(step_value).collect()),
            );
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentFinish, ZeroShotReactAgent};
    use crate::callbacks::{Callback, CallbackManager, CallbackResult};
    use crate::chain::{call, run};
    use crate::model::FakeModel;
    use crate::tools::{FnTool, Tool};
    use std::sync::Mutex;

    fn tools() -> ToolRegistry {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(FnTool::new("search", "Looks things up", |q| {
                Ok(format!("result for {}", q))
            })),
            Arc::new(FnTool::new("broken", "Always fails", |_| {
                Err(CatenaError::Tool {
                    tool: "broken".into(),
                    message: "boom".into(),
                })
            })),
        ];
        ToolRegistry::from_tools(tools).unwrap()
    }

    fn executor(responses: &[&str]) -> (AgentExecutor, Arc<FakeModel>) {
        let model = Arc::new(FakeModel::new(responses.iter().copied()));
        let tools = tools();
        let agent = ZeroShotReactAgent::new(model.clone(), &tools).unwrap();
        (AgentExecutor::new(Arc::new(agent), tools), model)
    }

    fn inputs() -> ChainValues {
        ChainValues::from([("input", "What is the capital of France?")])
    }

    #[tokio::test]
    async fn test_action_then_finish() {
        let (executor, model) = executor(&[
            "I should search.\nAction: search\nAction Input: capital of France",
            "I now know the final answer\nFinal Answer: Paris",
        ]);

        let run = executor
            .run_with_history(&inputs(), &RunContext::new())
            .await
            .unwrap();

        assert_eq!(run.return_values.get_string("output").unwrap(), "Paris");
        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].action.tool, "search");
        assert_eq!(run.steps[0].observation, "result for capital of France");
        assert!(model.prompts()[1].to_text().ends_with(
            "Action Input: capital of France\nObservation: result for capital of France\nThought:"
        ));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_observation() {
        let (executor, _) = executor(&[
            "Action: teleport\nAction Input: Paris",
            "Final Answer: stayed home",
        ]);

        let run = executor
            .run_with_history(&inputs(), &RunContext::new())
            .await
            .unwrap();

        assert_eq!(
            run.steps[0].observation,
            "teleport is not a valid tool, try another one."
        );
        assert_eq!(run.return_values.get_string("output").unwrap(), "stayed home");
    }

    #[tokio::test]
    async fn test_iteration_cap_keeps_history() {
        let (executor, model) = executor(&["Action: search\nAction Input: again"]);
        let executor =
            executor.with_config(AgentExecutorConfig::new().with_max_iterations(Some(3)));

        let failure = executor
            .run_with_history(&inputs(), &RunContext::new())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, CatenaError::MaxIterations(3)));
        assert_eq!(failure.steps.len(), 3);
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_parse_error_ends_run_with_prior_steps() {
        let (executor, model) = executor(&[
            "Action: search\nAction Input: first",
            "I am confused.",
            "Final Answer: never reached",
        ]);

        let failure = executor
            .run_with_history(&inputs(), &RunContext::new())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, CatenaError::UnableToParseOutput(_)));
        assert_eq!(failure.steps.len(), 1);
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_tool_error_propagates() {
        let (executor, _) = executor(&["Action: broken\nAction Input: x"]);

        let failure = executor
            .run_with_history(&inputs(), &RunContext::new())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, CatenaError::Tool { .. }));
        assert!(failure.steps.is_empty());
    }

    #[tokio::test]
    async fn test_as_chain_with_intermediate_steps() {
        let (executor, _) = executor(&[
            "Action: search\nAction Input: France",
            "Final Answer: Paris",
        ]);
        let executor = executor.with_config(
            AgentExecutorConfig::new().with_return_intermediate_steps(true),
        );

        assert_eq!(executor.output_keys(), vec!["output", "intermediateSteps"]);

        let outputs = call(&executor, inputs(), &RunContext::new()).await.unwrap();
        assert_eq!(outputs.get_string("output").unwrap(), "Paris");
        match outputs.get("intermediateSteps") {
            Some(Value::List(steps)) => {
                assert_eq!(steps.len(), 1);
                match &steps[0] {
                    Value::Map(fields) => {
                        assert_eq!(fields["observation"], Value::from("result for France"))
                    }
                    other => panic!("expected map, got {other:?}"),
                }
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_as_single_string_chain() {
        let (executor, _) = executor(&["Final Answer: 42"]);
        let answer = run(&executor, "meaning of life?", &RunContext::new())
            .await
            .unwrap();
        assert_eq!(answer, "42");
    }

    #[derive(Default)]
    struct AgentEvents(Mutex<Vec<String>>);

    #[async_trait]
    impl Callback for AgentEvents {
        async fn on_agent_action(&self, action: &AgentAction) -> CallbackResult {
            self.0.lock().unwrap().push(format!("action:{}", action.tool));
            Ok(())
        }

        async fn on_tool_start(&self, tool: &str, input: &str) -> CallbackResult {
            self.0.lock().unwrap().push(format!("tool_start:{}:{}", tool, input));
            Ok(())
        }

        async fn on_tool_end(&self, tool: &str, _output: &str) -> CallbackResult {
            self.0.lock().unwrap().push(format!("tool_end:{}", tool));
            Ok(())
        }

        async fn on_agent_finish(&self, finish: &AgentFinish) -> CallbackResult {
            let answer = finish.return_values.get_string("output")?;
            self.0.lock().unwrap().push(format!("finish:{}", answer));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_agent_observers_in_order() {
        let (executor, _) = executor(&[
            "Action: search\nAction Input: q",
            "Final Answer: done",
        ]);
        let events = Arc::new(AgentEvents::default());
        let ctx = RunContext::new().with_callbacks(CallbackManager::new().with(events.clone()));

        executor.run_with_history(&inputs(), &ctx).await.unwrap();

        assert_eq!(
            *events.0.lock().unwrap(),
            vec!["action:search", "tool_start:search:q", "tool_end:search", "finish:done"]
        );
    }

    #[test]
    fn test_config_from_settings() {
        let capped = AgentExecutorConfig::from(&AgentConfig {
            max_iterations: 4,
            return_intermediate_steps: true,
        });
        assert_eq!(capped.max_iterations, Some(4));
        assert!(capped.return_intermediate_steps);

        let uncapped = AgentExecutorConfig::from(&AgentConfig {
            max_iterations: 0,
            return_intermediate_steps: false,
        });
        assert_eq!(uncapped.max_iterations, None);
    }
}
