//! Tool trait and the closure-backed tool

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::context::RunContext;
use crate::error::Result;

/// An external capability invoked by an agent
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses in `Action: <name>`
    fn name(&self) -> &str;

    /// One line shown to the model in the tool list
    fn description(&self) -> &str;

    async fn invoke(&self, input: &str, ctx: &RunContext) -> Result<String>;
}

type ToolFn = dyn Fn(&str) -> Result<String> + Send + Sync;

/// Tool backed by a synchronous closure
#[derive(Clone)]
pub struct FnTool {
    name: String,
    description: String,
    handler: Arc<ToolFn>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            handler: Arc::new(handler),
        }
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, input: &str, ctx: &RunContext) -> Result<String> {
        ctx.check_cancelled()?;
        (self.handler)(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatenaError;

    #[tokio::test]
    async fn test_fn_tool_invokes_closure() {
        let tool = FnTool::new("upper", "Uppercases text", |input| Ok(input.to_uppercase()));

        assert_eq!(tool.name(), "upper");
        assert_eq!(tool.description(), "Uppercases text");
        assert_eq!(tool.invoke("abc", &RunContext::new()).await.unwrap(), "ABC");
    }

    #[tokio::test]
    async fn test_fn_tool_respects_cancellation() {
        let tool = FnTool::new("noop", "", |_| Ok(String::new()));
        let ctx = RunContext::new();
        ctx.cancel();

        let err = tool.invoke("x", &ctx).await.unwrap_err();
        assert!(matches!(err, CatenaError::Cancelled));
    }
}
