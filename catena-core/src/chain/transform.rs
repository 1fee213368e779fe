use async_trait::async_trait;
use std::sync::Arc;

use super::Chain;
use crate::context::RunContext;
use crate::error::Result;
use crate::schema::ChainValues;

type TransformFn = dyn Fn(ChainValues) -> Result<ChainValues> + Send + Sync;

/// Chain backed by a plain function over chain values
pub struct TransformChain {
    input_keys: Vec<String>,
    output_keys: Vec<String>,
    transform: Arc<TransformFn>,
    verbose: bool,
}

impl TransformChain {
    pub fn new<F>(input_keys: Vec<String>, output_keys: Vec<String>, transform: F) -> Self
    where
        F: Fn(ChainValues) -> Result<ChainValues> + Send + Sync + 'static,
    {
        Self {
            input_keys,
            output_keys,
            transform: Arc::new(transform),
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[async_trait]
impl Chain for TransformChain {
    fn chain_type(&self) -> &str {
        "transform"
    }

    fn input_keys(&self) -> Vec<String> {
        self.input_keys.clone()
    }

    fn output_keys(&self) -> Vec<String> {
        self.output_keys.clone()
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    async fn call_inner(&self, inputs: ChainValues, _ctx: &RunContext) -> Result<ChainValues> {
        (self.transform)(inputs)
    }
}
