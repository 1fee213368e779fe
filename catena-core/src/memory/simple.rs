use async_trait::async_trait;

use super::Memory;
use crate::error::Result;
use crate::schema::{ChainValues, Value};

/// Fixed set of values injected into every call.
///
/// Saving and clearing do nothing; the memories never change after
/// construction.
#[derive(Debug, Clone, Default)]
pub struct SimpleMemory {
    memories: ChainValues,
}

impl SimpleMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.memories.insert(key, value);
        self
    }

    pub fn with_memories(memories: ChainValues) -> Self {
        Self { memories }
    }
}

#[async_trait]
impl Memory for SimpleMemory {
    fn memory_variables(&self) -> Vec<String> {
        self.memories.keys().cloned().collect()
    }

    async fn load(&self, _inputs: &ChainValues) -> Result<ChainValues> {
        Ok(self.memories.clone())
    }

    async fn save(&self, _inputs: &ChainValues, _outputs: &ChainValues) -> Result<()> {
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_variables() {
        assert!(SimpleMemory::new().memory_variables().is_empty());

        let memory = SimpleMemory::new()
            .with_memory("name", "John")
            .with_memory("age", 30.0);
        let mut vars = memory.memory_variables();
        vars.sort();
        assert_eq!(vars, vec!["age", "name"]);
    }

    #[tokio::test]
    async fn test_load_ignores_inputs_and_save_is_noop() {
        let memory = SimpleMemory::new().with_memory("name", "John");
        let inputs = ChainValues::from([("var1", "value1")]);

        memory
            .save(&inputs, &ChainValues::from([("out", "x")]))
            .await
            .unwrap();
        memory.clear().await.unwrap();

        let loaded = memory.load(&inputs).await.unwrap();
        assert_eq!(loaded, ChainValues::from([("name", "John")]));
    }
}
