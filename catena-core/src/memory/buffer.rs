//! Conversation buffer memory

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Memory, single_key};
use crate::error::Result;
use crate::schema::{ChainValues, ChatMessage, StringifyOptions, Value, stringify_messages};

/// Records every (input, output) turn as a human/AI message pair and
/// exposes the whole conversation under one key.
#[derive(Debug)]
pub struct ConversationBufferMemory {
    messages: RwLock<Vec<ChatMessage>>,
    memory_key: String,
    input_key: Option<String>,
    output_key: Option<String>,
    return_messages: bool,
    stringify: StringifyOptions,
}

impl Default for ConversationBufferMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationBufferMemory {
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(Vec::new()),
            memory_key: "history".to_string(),
            input_key: None,
            output_key: None,
            return_messages: false,
            stringify: StringifyOptions::default(),
        }
    }

    pub fn with_memory_key(mut self, key: impl Into<String>) -> Self {
        self.memory_key = key.into();
        self
    }

    pub fn with_input_key(mut self, key: impl Into<String>) -> Self {
        self.input_key = Some(key.into());
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// Expose the history as `Value::Messages` instead of a transcript
    pub fn with_return_messages(mut self, return_messages: bool) -> Self {
        self.return_messages = return_messages;
        self
    }

    pub fn with_stringify_options(mut self, options: StringifyOptions) -> Self {
        self.stringify = options;
        self
    }

    /// Seed the buffer with prior messages
    pub fn with_messages(self, messages: Vec<ChatMessage>) -> Self {
        Self {
            messages: RwLock::new(messages),
            ..self
        }
    }

    /// Snapshot of the recorded conversation
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.messages.read().await.clone()
    }
}

#[async_trait]
impl Memory for ConversationBufferMemory {
    fn memory_variables(&self) -> Vec<String> {
        vec![self.memory_key.clone()]
    }

    async fn load(&self, _inputs: &ChainValues) -> Result<ChainValues> {
        let messages = self.messages.read().await;
        let value = if self.return_messages {
            Value::Messages(messages.clone())
        } else {
            Value::String(stringify_messages(&messages, &self.stringify))
        };
        Ok(ChainValues::new().with(self.memory_key.clone(), value))
    }

    async fn save(&self, inputs: &ChainValues, outputs: &ChainValues) -> Result<()> {
        let vars = self.memory_variables();
        let input_key = match &self.input_key {
            Some(key) => key.clone(),
            None => single_key(inputs, &vars, "input")?,
        };
        let output_key = match &self.output_key {
            Some(key) => key.clone(),
            None => single_key(outputs, &[], "output")?,
        };

        let input = inputs.require(&input_key)?.render();
        let output = outputs.require(&output_key)?.render();

        let mut messages = self.messages.write().await;
        messages.push(ChatMessage::human(input));
        messages.push(ChatMessage::ai(output));

        tracing::trace!(
            memory_key = %self.memory_key,
            messages = messages.len(),
            "Saved conversation turn"
        );
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.messages.write().await.clear();
        Ok(())
    }
}
