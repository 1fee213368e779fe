//! Chains: composable units of computation over [`ChainValues`]
//!
//! Every chain declares the keys it reads and writes. Chains are always run
//! through [`call`], which enforces the call protocol:
//!
//! 1. validate that every declared input key is present
//! 2. load attached memory; loaded keys override caller-supplied ones
//! 3. run the chain
//! 4. check the declared output keys were produced
//! 5. save the turn to memory
//!
//! Any failure aborts the call with no partial outputs.

mod documents;
mod llm;
mod llm_bash;
mod retrieval_qa;
mod sequential;
mod transform;

pub use documents::{
    DocumentFormatter, MapReduceDocumentsChain, RefineDocumentsChain, StuffDocumentsChain,
};
pub use llm::LlmChain;
pub use llm_bash::LlmBashChain;
pub use retrieval_qa::RetrievalQaChain;
pub use sequential::{SequentialChain, SimpleSequentialChain};
pub use transform::TransformChain;

use async_trait::async_trait;
use std::sync::Arc;

use crate::context::RunContext;
use crate::error::{CatenaError, Result};
use crate::memory::Memory;
use crate::schema::ChainValues;

/// A named unit of computation with declared inputs and outputs
#[async_trait]
pub trait Chain: Send + Sync {
    /// Short identifier used in logs and observer events
    fn chain_type(&self) -> &str;

    fn input_keys(&self) -> Vec<String>;

    fn output_keys(&self) -> Vec<String>;

    fn memory(&self) -> Option<Arc<dyn Memory>> {
        None
    }

    fn verbose(&self) -> bool {
        false
    }

    /// Chain-specific transformation. Callers go through [`call`].
    async fn call_inner(&self, inputs: ChainValues, ctx: &RunContext) -> Result<ChainValues>;
}

/// Run `chain` on `inputs` following the call protocol.
pub async fn call(chain: &dyn Chain, inputs: ChainValues, ctx: &RunContext) -> Result<ChainValues> {
    let ctx = ctx.for_component(chain.verbose());
    ctx.check_cancelled()?;

    let memory = chain.memory();
    let memory_keys = memory
        .as_ref()
        .map(|m| m.memory_variables())
        .unwrap_or_default();

    // Keys the memory will supply are not required from the caller.
    let required: Vec<String> = chain
        .input_keys()
        .into_iter()
        .filter(|k| !memory_keys.contains(k))
        .collect();
    if let Some(key) = inputs.missing_key(&required) {
        return Err(CatenaError::InvalidInputValues(format!(
            "chain '{}' requires input key '{}'",
            chain.chain_type(),
            key
        )));
    }

    let mut working = inputs;
    if let Some(memory) = &memory {
        let loaded = memory.load(&working).await?;
        working.merge(loaded);
        if let Some(key) = working.missing_key(&chain.input_keys()) {
            return Err(CatenaError::InvalidInputValues(format!(
                "memory did not provide input key '{}' for chain '{}'",
                key,
                chain.chain_type()
            )));
        }
    }

    let chain_type = chain.chain_type();
    ctx.callbacks().chain_start(chain_type, &working).await?;

    let outputs = match run_inner(chain, working.clone(), &ctx).await {
        Ok(outputs) => outputs,
        Err(e) => {
            tracing::debug!(chain = chain_type, error = %e, "Chain call failed");
            ctx.callbacks().chain_error(chain_type, &e).await?;
            return Err(e);
        }
    };

    if let Some(memory) = &memory {
        memory.save(&working, &outputs).await?;
    }

    ctx.callbacks().chain_end(chain_type, &outputs).await?;
    Ok(outputs)
}

async fn run_inner(
    chain: &dyn Chain,
    inputs: ChainValues,
    ctx: &RunContext,
) -> Result<ChainValues> {
    let outputs = chain.call_inner(inputs, ctx).await?;
    let output_keys = chain.output_keys();

    if let Some(key) = outputs.missing_key(&output_keys) {
        return Err(CatenaError::Other(format!(
            "chain '{}' did not produce output key '{}'",
            chain.chain_type(),
            key
        )));
    }

    Ok(outputs.select(&output_keys))
}

/// Run a chain with one input key and one output key on a single string.
pub async fn run(chain: &dyn Chain, input: &str, ctx: &RunContext) -> Result<String> {
    let memory_keys = chain
        .memory()
        .map(|m| m.memory_variables())
        .unwrap_or_default();
    let input_keys: Vec<String> = chain
        .input_keys()
        .into_iter()
        .filter(|k| !memory_keys.contains(k))
        .collect();

    let [input_key] = input_keys.as_slice() else {
        return Err(CatenaError::InvalidInputValues(format!(
            "run needs a chain with exactly one input key, '{}' has {:?}",
            chain.chain_type(),
            input_keys
        )));
    };

    let inputs = ChainValues::new().with(input_key.clone(), input);
    predict(chain, inputs, ctx).await
}

/// Call a chain with a single output key and return that output as text.
pub async fn predict(chain: &dyn Chain, inputs: ChainValues, ctx: &RunContext) -> Result<String> {
    let output_keys = chain.output_keys();
    let [output_key] = output_keys.as_slice() else {
        return Err(CatenaError::InvalidInputValues(format!(
            "predict needs a chain with exactly one output key, '{}' has {:?}",
            chain.chain_type(),
            output_keys
        )));
    };

    let outputs = call(chain, inputs, ctx).await?;
    Ok(outputs.require(output_key)?.render())
}

/// Call a chain on each input in order, stopping at the first error.
pub async fn apply(
    chain: &dyn Chain,
    inputs: Vec<ChainValues>,
    ctx: &RunContext,
) -> Result<Vec<ChainValues>> {
    let mut results = Vec::with_capacity(inputs.len());
    for input in inputs {
        results.push(call(chain, input, ctx).await?);
    }
    Ok(results)
}
