//! Conversational memory attached to chains
//!
//! A chain with memory calls [`Memory::load`] before running and
//! [`Memory::save`] after. Loaded keys take precedence over caller-supplied
//! inputs of the same name.

mod buffer;
mod simple;

pub use buffer::ConversationBufferMemory;
pub use simple::SimpleMemory;

use async_trait::async_trait;

use crate::error::{CatenaError, Result};
use crate::schema::ChainValues;

/// Stateful collaborator that augments chain inputs with stored context
#[async_trait]
pub trait Memory: Send + Sync {
    /// Keys this memory injects into chain inputs
    fn memory_variables(&self) -> Vec<String>;

    async fn load(&self, inputs: &ChainValues) -> Result<ChainValues>;

    /// Absorb one completed call. Does not change the call's outputs.
    async fn save(&self, inputs: &ChainValues, outputs: &ChainValues) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// The single key of `values` that is not a memory variable.
///
/// Used when a memory was not told which input or output key to record.
pub(crate) fn single_key(
    values: &ChainValues,
    memory_variables: &[String],
    what: &str,
) -> Result<String> {
    let mut candidates = values
        .keys()
        .filter(|k| !memory_variables.contains(k) && k.as_str() != "stop");

    match (candidates.next(), candidates.next()) {
        (Some(key), None) => Ok(key.clone()),
        (None, _) => Err(CatenaError::Memory(format!("no {} key to record", what))),
        (Some(_), Some(_)) => Err(CatenaError::Memory(format!(
            "more than one {} key; configure the {} key explicitly",
            what, what
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_key_ignores_memory_variables() {
        let values = ChainValues::from([("history", "..."), ("input", "hi")]);
        assert_eq!(
            single_key(&values, &["history".to_string()], "input").unwrap(),
            "input"
        );
    }

    #[test]
    fn test_single_key_ambiguous() {
        let values = ChainValues::from([("a", "1"), ("b", "2")]);
        let err = single_key(&values, &[], "input").unwrap_err();
        assert!(matches!(err, CatenaError::Memory(_)));
    }
}
