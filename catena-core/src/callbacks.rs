//! Observer callbacks for model, chain, agent and tool events
//!
//! Observers are invoked in registration order. An error returned by an
//! observer propagates out of the call that fired it; nothing is swallowed.
//!
//! # Example
//!
//! ```rust,ignore
//! use catena_core::callbacks::{CallbackManager, LoggingCallback};
//!
//! let mut callbacks = CallbackManager::new();
//! callbacks.register(Arc::new(LoggingCallback));
//! let ctx = RunContext::new().with_callbacks(callbacks);
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::agent::{AgentAction, AgentFinish};
use crate::error::{CatenaError, Result};
use crate::schema::{ChainValues, ModelResult};

/// Result type for callbacks
pub type CallbackResult = Result<()>;

/// Observer of run events. Every hook defaults to a no-op.
#[async_trait]
pub trait Callback: Send + Sync {
    async fn on_model_start(&self, _model_type: &str, _prompt: &str) -> CallbackResult {
        Ok(())
    }

    /// Called once per streamed token, before it is accumulated
    async fn on_model_new_token(&self, _token: &str) -> CallbackResult {
        Ok(())
    }

    async fn on_model_end(&self, _model_type: &str, _result: &ModelResult) -> CallbackResult {
        Ok(())
    }

    async fn on_model_error(&self, _model_type: &str, _error: &CatenaError) -> CallbackResult {
        Ok(())
    }

    async fn on_chain_start(&self, _chain_type: &str, _inputs: &ChainValues) -> CallbackResult {
        Ok(())
    }

    async fn on_chain_end(&self, _chain_type: &str, _outputs: &ChainValues) -> CallbackResult {
        Ok(())
    }

    async fn on_chain_error(&self, _chain_type: &str, _error: &CatenaError) -> CallbackResult {
        Ok(())
    }

    async fn on_agent_action(&self, _action: &AgentAction) -> CallbackResult {
        Ok(())
    }

    async fn on_agent_finish(&self, _finish: &AgentFinish) -> CallbackResult {
        Ok(())
    }

    async fn on_tool_start(&self, _tool: &str, _input: &str) -> CallbackResult {
        Ok(())
    }

    async fn on_tool_end(&self, _tool: &str, _output: &str) -> CallbackResult {
        Ok(())
    }
}

/// Ordered set of observers for one run
#[derive(Clone, Default)]
pub struct CallbackManager {
    callbacks: Vec<Arc<dyn Callback>>,
}

impl std::fmt::Debug for CallbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackManager")
            .field("callback_count", &self.callbacks.len())
            .finish()
    }
}

impl CallbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, callback: Arc<dyn Callback>) {
        self.callbacks.push(callback);
    }

    pub fn with(mut self, callback: Arc<dyn Callback>) -> Self {
        self.register(callback);
        self
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub async fn model_start(&self, model_type: &str, prompt: &str) -> CallbackResult {
        for cb in &self.callbacks {
            cb.on_model_start(model_type, prompt).await?;
        }
        Ok(())
    }

    pub async fn model_new_token(&self, token: &str) -> CallbackResult {
        for cb in &self.callbacks {
            cb.on_model_new_token(token).await?;
        }
        Ok(())
    }

    pub async fn model_end(&self, model_type: &str, result: &ModelResult) -> CallbackResult {
        for cb in &self.callbacks {
            cb.on_model_end(model_type, result).await?;
        }
        Ok(())
    }

    pub async fn model_error(&self, model_type: &str, error: &CatenaError) -> CallbackResult {
        for cb in &self.callbacks {
            cb.on_model_error(model_type, error).await?;
        }
        Ok(())
    }

    pub async fn chain_start(&self, chain_type: &str, inputs: &ChainValues) -> CallbackResult {
        for cb in &self.callbacks {
            cb.on_chain_start(chain_type, inputs).await?;
        }
        Ok(())
    }

    pub async fn chain_end(&self, chain_type: &str, outputs: &ChainValues) -> CallbackResult {
        for cb in &self.callbacks {
            cb.on_chain_end(chain_type, outputs).await?;
        }
        Ok(())
    }

    pub async fn chain_error(&self, chain_type: &str, error: &CatenaError) -> CallbackResult {
        for cb in &self.callbacks {
            cb.on_chain_error(chain_type, error).await?;
        }
        Ok(())
    }

    pub async fn agent_action(&self, action: &AgentAction) -> CallbackResult {
        for cb in &self.callbacks {
            cb.on_agent_action(action).await?;
        }
        Ok(())
    }

    pub async fn agent_finish(&self, finish: &AgentFinish) -> CallbackResult {
        for cb in &self.callbacks {
            cb.on_agent_finish(finish).await?;
        }
        Ok(())
    }

    pub async fn tool_start(&self, tool: &str, input: &str) -> CallbackResult {
        for cb in &self.callbacks {
            cb.on_tool_start(tool, input).await?;
        }
        Ok(())
    }

    pub async fn tool_end(&self, tool: &str, output: &str) -> CallbackResult {
        for cb in &self.callbacks {
            cb.on_tool_end(tool, output).await?;
        }
        Ok(())
    }
}

/// Emits one `tracing` event per hook
pub struct LoggingCallback;

#[async_trait]
impl Callback for LoggingCallback {
    async fn on_model_start(&self, model_type: &str, prompt: &str) -> CallbackResult {
        tracing::info!(model = model_type, prompt_len = prompt.len(), "Model started");
        tracing::debug!(model = model_type, prompt, "Model prompt");
        Ok(())
    }

    async fn on_model_new_token(&self, token: &str) -> CallbackResult {
        tracing::trace!(token, "Model token");
        Ok(())
    }

    async fn on_model_end(&self, model_type: &str, result: &ModelResult) -> CallbackResult {
        tracing::info!(
            model = model_type,
            generations = result.generations.len(),
            total_tokens = result.usage.total_tokens,
            "Model finished"
        );
        Ok(())
    }

    async fn on_model_error(&self, model_type: &str, error: &CatenaError) -> CallbackResult {
        tracing::warn!(model = model_type, error = %error, "Model failed");
        Ok(())
    }

    async fn on_chain_start(&self, chain_type: &str, inputs: &ChainValues) -> CallbackResult {
        let keys: Vec<&String> = inputs.keys().collect();
        tracing::info!(chain = chain_type, inputs = ?keys, "Entering chain");
        Ok(())
    }

    async fn on_chain_end(&self, chain_type: &str, outputs: &ChainValues) -> CallbackResult {
        let keys: Vec<&String> = outputs.keys().collect();
        tracing::info!(chain = chain_type, outputs = ?keys, "Finished chain");
        Ok(())
    }

    async fn on_chain_error(&self, chain_type: &str, error: &CatenaError) -> CallbackResult {
        tracing::warn!(chain = chain_type, error = %error, "Chain failed");
        Ok(())
    }

    async fn on_agent_action(&self, action: &AgentAction) -> CallbackResult {
        tracing::info!(tool = %action.tool, input = %action.tool_input, "Agent action");
        Ok(())
    }

    async fn on_agent_finish(&self, finish: &AgentFinish) -> CallbackResult {
        tracing::info!(log_len = finish.log.len(), "Agent finished");
        Ok(())
    }

    async fn on_tool_start(&self, tool: &str, input: &str) -> CallbackResult {
        tracing::debug!(tool, input, "Tool started");
        Ok(())
    }

    async fn on_tool_end(&self, tool: &str, output: &str) -> CallbackResult {
        tracing::debug!(tool, output_len = output.len(), "Tool finished");
        Ok(())
    }
}
