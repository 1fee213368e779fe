//! Sequential composition
//!
//! Both chains validate their wiring at construction: a sub-chain that reads
//! a key nothing upstream produces is a configuration error, not a runtime
//! surprise.

use async_trait::async_trait;
use std::sync::Arc;

use super::{Chain, call, predict};
use crate::context::RunContext;
use crate::error::{CatenaError, Result};
use crate::memory::Memory;
use crate::schema::ChainValues;

fn own_inputs(chain: &dyn Chain) -> Vec<String> {
    let memory_keys = chain
        .memory()
        .map(|m| m.memory_variables())
        .unwrap_or_default();
    chain
        .input_keys()
        .into_iter()
        .filter(|k| !memory_keys.contains(k))
        .collect()
}

/// Runs chains in order; each chain sees the caller's inputs plus every
/// output produced before it.
pub struct SequentialChain {
    chains: Vec<Arc<dyn Chain>>,
    input_keys: Vec<String>,
    output_keys: Vec<String>,
    memory: Option<Arc<dyn Memory>>,
    verbose: bool,
}

impl SequentialChain {
    /// Compose `chains`, exposing the last chain's outputs.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a chain needs a key that is neither
    /// a declared input nor produced upstream, or when a chain would
    /// overwrite an existing key.
    pub fn new(chains: Vec<Arc<dyn Chain>>, input_keys: Vec<String>) -> Result<Self> {
        let Some(last) = chains.last() else {
            return Err(CatenaError::Configuration(
                "sequential chain needs at least one chain".to_string(),
            ));
        };
        let output_keys = last.output_keys();

        let chain = Self {
            chains,
            input_keys,
            output_keys,
            memory: None,
            verbose: false,
        };
        chain.validate(&[])?;
        Ok(chain)
    }

    /// Expose every key produced by any sub-chain, not just the last one.
    pub fn with_return_all(mut self) -> Self {
        self.output_keys = self.chains.iter().flat_map(|c| c.output_keys()).collect();
        self
    }

    /// Expose a specific set of produced keys.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a key is never produced.
    pub fn with_output_keys(mut self, keys: Vec<String>) -> Result<Self> {
        let produced: Vec<String> = self.chains.iter().flat_map(|c| c.output_keys()).collect();
        if let Some(key) = keys.iter().find(|k| !produced.contains(k)) {
            return Err(CatenaError::Configuration(format!(
                "output key '{}' is not produced by any chain",
                key
            )));
        }
        self.output_keys = keys;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns a configuration error if the wiring breaks once the memory's
    /// keys are available.
    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Result<Self> {
        let memory_keys = memory.memory_variables();
        if let Some(key) = memory_keys.iter().find(|k| self.input_keys.contains(k)) {
            return Err(CatenaError::Configuration(format!(
                "memory key '{}' collides with an input key",
                key
            )));
        }
        self.validate(&memory_keys)?;
        self.memory = Some(memory);
        Ok(self)
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn validate(&self, memory_keys: &[String]) -> Result<()> {
        let mut known: Vec<String> = self.input_keys.clone();
        known.extend(memory_keys.iter().cloned());

        for (index, chain) in self.chains.iter().enumerate() {
            if let Some(missing) = own_inputs(chain.as_ref())
                .into_iter()
                .find(|k| !known.contains(k))
            {
                return Err(CatenaError::Configuration(format!(
                    "chain {} ('{}') needs key '{}', which is not an input or an earlier output",
                    index,
                    chain.chain_type(),
                    missing
                )));
            }
            for key in chain.output_keys() {
                if known.contains(&key) {
                    return Err(CatenaError::Configuration(format!(
                        "chain {} ('{}') would overwrite existing key '{}'",
                        index,
                        chain.chain_type(),
                        key
                    )));
                }
                known.push(key);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Chain for SequentialChain {
    fn chain_type(&self) -> &str {
        "sequential"
    }

    fn input_keys(&self) -> Vec<String> {
        self.input_keys.clone()
    }

    fn output_keys(&self) -> Vec<String> {
        self.output_keys.clone()
    }

    fn memory(&self) -> Option<Arc<dyn Memory>> {
        self.memory.clone()
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    async fn call_inner(&self, inputs: ChainValues, ctx: &RunContext) -> Result<ChainValues> {
        let mut known = inputs;
        for chain in &self.chains {
            let outputs = call(chain.as_ref(), known.clone(), ctx).await?;
            known.merge(outputs);
        }
        Ok(known.select(&self.output_keys))
    }
}

/// Threads one string through a series of single-input, single-output chains
pub struct SimpleSequentialChain {
    chains: Vec<Arc<dyn Chain>>,
    input_key: String,
    output_key: String,
    trim_outputs: bool,
    verbose: bool,
}

impl SimpleSequentialChain {
    /// # Errors
    ///
    /// Returns a configuration error if `chains` is empty or any chain does
    /// not have exactly one input and one output key.
    pub fn new(chains: Vec<Arc<dyn Chain>>) -> Result<Self> {
        if chains.is_empty() {
            return Err(CatenaError::Configuration(
                "simple sequential chain needs at least one chain".to_string(),
            ));
        }
        for (index, chain) in chains.iter().enumerate() {
            let inputs = own_inputs(chain.as_ref());
            let outputs = chain.output_keys();
            if inputs.len() != 1 || outputs.len() != 1 {
                return Err(CatenaError::Configuration(format!(
                    "chain {} ('{}') must have exactly one input and one output key, has {:?} -> {:?}",
                    index,
                    chain.chain_type(),
                    inputs,
                    outputs
                )));
            }
        }

        Ok(Self {
            chains,
            input_key: "input".to_string(),
            output_key: "output".to_string(),
            trim_outputs: false,
            verbose: false,
        })
    }

    pub fn with_input_key(mut self, key: impl Into<String>) -> Self {
        self.input_key = key.into();
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = key.into();
        self
    }

    /// Trim whitespace from each intermediate output
    pub fn with_trim_outputs(mut self, trim: bool) -> Self {
        self.trim_outputs = trim;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[async_trait]
impl Chain for SimpleSequentialChain {
    fn chain_type(&self) -> &str {
        "simple_sequential"
    }

    fn input_keys(&self) -> Vec<String> {
        vec![self.input_key.clone()]
    }

    fn output_keys(&self) -> Vec<String> {
        vec![self.output_key.clone()]
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    async fn call_inner(&self, inputs: ChainValues, ctx: &RunContext) -> Result<ChainValues> {
        let mut current = inputs.require(&self.input_key)?.render();

        for chain in &self.chains {
            let key = own_inputs(chain.as_ref()).remove(0);
            let output = predict(
                chain.as_ref(),
                ChainValues::new().with(key, current),
                ctx,
            )
            .await?;
            current = if self.trim_outputs {
                output.trim().to_string()
            } else {
                output
            };
        }

        Ok(ChainValues::new().with(self.output_key.clone(), current))
    }
}
